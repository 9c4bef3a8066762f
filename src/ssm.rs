//! Wrapper client for the SSM Parameter Store.
//!
//! Parameters double as process configuration, so plain reads go through a
//! process-local timed cache. Decrypted secrets bypass the cache: plaintext
//! must not sit in process memory longer than the call that needed it.

use crate::common::cache::TimedCache;
use crate::common::error::{CommonError, classify, render_sdk_error};

use aws_sdk_ssm::{Client, types};
use std::time::Duration;
use thiserror::Error;

/// How long cached parameter values stay fresh by default.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Errors raised by the Parameter Store wrapper.
#[derive(Debug, Error)]
pub enum SsmError {
    /// The parameter does not exist.
    #[error("parameter `{0}` not found")]
    ParameterNotFound(String),
    /// The parameter already exists and overwriting was not requested.
    #[error("parameter `{0}` already exists")]
    ParameterAlreadyExists(String),
    /// Authentication or connection failure.
    #[error(transparent)]
    Common(#[from] CommonError),
    /// Any other SDK failure, rendered with its full error chain.
    #[error("unexpected SDK error: {0}")]
    Sdk(String),
}

/// Wrapper client for the SSM Parameter Store.
///
/// ```rust,no_run
/// use aws_clients::ssm;
/// use aws_sdk_ssm::Client;
///
/// # async fn example() -> Result<(), ssm::SsmError> {
/// # let client = Client::from_conf(aws_sdk_ssm::config::Config::builder().build());
/// let store = ssm::ParameterStore::new(client);
/// let value = store.get_parameter("/my/parameter").await?;
/// assert_eq!(value, "thisismyvalue");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ParameterStore {
    client: Client,
    cache: TimedCache<String, String>,
}

impl ParameterStore {
    /// Wrap `client` with the default cache time-to-live.
    pub fn new(client: Client) -> Self {
        Self::with_cache_ttl(client, DEFAULT_CACHE_TTL)
    }

    /// Wrap `client`, keeping cached parameter values fresh for
    /// `time_to_live`.
    pub fn with_cache_ttl(client: Client, time_to_live: Duration) -> Self {
        Self {
            client,
            cache: TimedCache::new(time_to_live),
        }
    }

    /// Read the parameter at `path`, served from the cache while fresh.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "aws_clients.ssm.get_parameter", skip_all, err)
    )]
    pub async fn get_parameter(&self, path: &str) -> Result<String, SsmError> {
        if let Some(value) = self.cache.get(path) {
            return Ok(value);
        }
        let value = self.fetch(path, false).await?;
        self.cache.insert(path.to_string(), value.clone());
        Ok(value)
    }

    /// Read and decrypt the secret at `path`. Never cached.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "aws_clients.ssm.get_secret", skip_all, err)
    )]
    pub async fn get_secret(&self, path: &str) -> Result<String, SsmError> {
        self.fetch(path, true).await
    }

    /// Write the plain parameter at `path`.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "aws_clients.ssm.put_parameter", skip_all, err)
    )]
    pub async fn put_parameter(
        &self,
        path: &str,
        value: &str,
        overwrite: bool,
    ) -> Result<(), SsmError> {
        self.put(path, value, types::ParameterType::String, overwrite)
            .await
    }

    /// Write the encrypted secret at `path`.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "aws_clients.ssm.put_secret", skip_all, err)
    )]
    pub async fn put_secret(
        &self,
        path: &str,
        value: &str,
        overwrite: bool,
    ) -> Result<(), SsmError> {
        self.put(path, value, types::ParameterType::SecureString, overwrite)
            .await
    }

    async fn fetch(&self, path: &str, with_decryption: bool) -> Result<String, SsmError> {
        let output = self
            .client
            .get_parameter()
            .name(path)
            .with_decryption(with_decryption)
            .send()
            .await
            .map_err(|err| {
                if let Some(common) = classify(&err) {
                    return common.into();
                }
                let service_error = err.into_service_error();
                if service_error.is_parameter_not_found() {
                    SsmError::ParameterNotFound(path.to_string())
                } else {
                    SsmError::Sdk(render_sdk_error(&service_error))
                }
            })?;
        output
            .parameter
            .and_then(|parameter| parameter.value)
            .ok_or_else(|| SsmError::Sdk("response contained no parameter value".to_string()))
    }

    async fn put(
        &self,
        path: &str,
        value: &str,
        parameter_type: types::ParameterType,
        overwrite: bool,
    ) -> Result<(), SsmError> {
        self.client
            .put_parameter()
            .name(path)
            .value(value)
            .r#type(parameter_type)
            .overwrite(overwrite)
            .send()
            .await
            .map_err(|err| {
                if let Some(common) = classify(&err) {
                    return common.into();
                }
                let service_error = err.into_service_error();
                if service_error.is_parameter_already_exists() {
                    SsmError::ParameterAlreadyExists(path.to_string())
                } else {
                    SsmError::Sdk(render_sdk_error(&service_error))
                }
            })?;
        self.cache.invalidate(path);
        Ok(())
    }
}
