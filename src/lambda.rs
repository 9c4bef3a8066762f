//! Wrapper client for one Lambda function.

use crate::common::error::{CommonError, classify, render_sdk_error};

use aws_sdk_lambda::operation::invoke::InvokeOutput;
use aws_sdk_lambda::{Client, primitives::Blob};
use serde::Serialize;
use thiserror::Error;

/// Errors raised by the function wrapper.
#[derive(Debug, Error)]
pub enum LambdaError {
    /// The function does not exist.
    #[error("lambda function `{0}` not found")]
    FunctionNotFound(String),
    /// The payload could not be encoded as JSON.
    #[error("payload is not JSON serializable")]
    NotJsonSerializable(#[from] serde_json::Error),
    /// Authentication or connection failure.
    #[error(transparent)]
    Common(#[from] CommonError),
    /// Any other SDK failure, rendered with its full error chain.
    #[error("unexpected SDK error: {0}")]
    Sdk(String),
}

/// Wrapper client for one Lambda function.
///
/// The function can be named by plain name, full ARN, or
/// `account-id:function:name`.
///
/// ```rust,no_run
/// use aws_clients::lambda;
/// use aws_sdk_lambda::Client;
/// use serde_json::json;
///
/// # async fn example() -> Result<(), lambda::LambdaError> {
/// # let client = Client::from_conf(aws_sdk_lambda::config::Config::builder().build());
/// let function = lambda::Function::new(client, "botte-be-prod-message");
/// let output = function
///     .invoke(&json!({"text": "hello", "sender_app": "AWS_CLIENTS"}))
///     .await?;
/// assert_eq!(output.status_code(), 200);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Function {
    client: Client,
    name: String,
}

impl Function {
    /// Wrap `client` for invocations of the function called `name`.
    pub fn new(client: Client, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
        }
    }

    /// The function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the function with `payload` encoded as JSON.
    ///
    /// The raw output is returned so callers can inspect the status code,
    /// the response payload and any function error.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "aws_clients.lambda.invoke", skip_all, err)
    )]
    pub async fn invoke<T: Serialize>(&self, payload: &T) -> Result<InvokeOutput, LambdaError> {
        let payload = serde_json::to_vec(payload)?;
        self.client
            .invoke()
            .function_name(&self.name)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(|err| {
                if let Some(common) = classify(&err) {
                    return common.into();
                }
                let service_error = err.into_service_error();
                if service_error.is_resource_not_found_exception() {
                    LambdaError::FunctionNotFound(self.name.clone())
                } else {
                    LambdaError::Sdk(render_sdk_error(&service_error))
                }
            })
    }
}
