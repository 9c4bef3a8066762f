//! Failure classes shared by every service wrapper.
//!
//! Expired or rejected credentials and unreachable endpoints look the same on
//! every AWS API, so the per-service error taxonomies delegate their
//! detection to this module instead of re-implementing it.

use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use thiserror::Error;

/// Error codes reported by AWS when the credentials are expired or invalid.
const AUTH_ERROR_CODES: [&str; 4] = [
    "ExpiredToken",
    "ExpiredTokenException",
    "InvalidClientTokenId",
    "UnrecognizedClientException",
];

/// A failure that can occur on any AWS API call, regardless of service.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CommonError {
    /// The credentials were rejected, e.g. an expired or invalid session token.
    #[error("AWS authentication failed ({code})")]
    AuthFailed {
        /// The error code reported by the service.
        code: String,
    },
    /// The endpoint could not be reached, e.g. a network issue or a region
    /// that does not exist.
    #[error("AWS endpoint not reachable: {message}")]
    Connection {
        /// The transport-level failure description.
        message: String,
    },
}

/// Classify an SDK failure into a [`CommonError`], or `None` when the failure
/// is specific to the service and must be mapped by the caller.
pub(crate) fn classify<E, R>(err: &SdkError<E, R>) -> Option<CommonError>
where
    E: ProvideErrorMetadata,
{
    match err {
        SdkError::DispatchFailure(failure) => Some(CommonError::Connection {
            message: failure
                .as_connector_error()
                .map(|connector| connector.to_string())
                .unwrap_or_else(|| "dispatch failure".to_string()),
        }),
        SdkError::TimeoutError(_) => Some(CommonError::Connection {
            message: "request timed out".to_string(),
        }),
        _ => match err.code() {
            Some(code) if AUTH_ERROR_CODES.contains(&code) => Some(CommonError::AuthFailed {
                code: code.to_string(),
            }),
            _ => None,
        },
    }
}

/// Render the full error chain of an SDK error into one line.
pub(crate) fn render_sdk_error<E>(err: &E) -> String
where
    E: std::error::Error,
{
    DisplayErrorContext(err).to_string()
}
