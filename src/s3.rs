//! Wrapper client for one S3 bucket.

use crate::common::error::{CommonError, classify, render_sdk_error};

use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::operation::put_object::PutObjectOutput;
use aws_sdk_s3::{Client, primitives::ByteStream};
use thiserror::Error;

/// Errors raised by the bucket wrapper.
#[derive(Debug, Error)]
pub enum S3Error {
    /// The bucket does not exist.
    #[error("bucket `{0}` does not exist")]
    BucketDoesNotExist(String),
    /// The object does not exist.
    #[error("object `{0}` does not exist")]
    ObjectDoesNotExist(String),
    /// The object body could not be read.
    #[error("failed to read object body: {0}")]
    Body(String),
    /// Authentication or connection failure.
    #[error(transparent)]
    Common(#[from] CommonError),
    /// Any other SDK failure, rendered with its full error chain.
    #[error("unexpected SDK error: {0}")]
    Sdk(String),
}

/// Wrapper client for one S3 bucket.
///
/// ```rust,no_run
/// use aws_clients::s3;
/// use aws_sdk_s3::Client;
///
/// # async fn example() -> Result<(), s3::S3Error> {
/// # let client = Client::from_conf(aws_sdk_s3::config::Config::builder().build());
/// let bucket = s3::Bucket::new(client, "my-bucket");
/// if bucket.has_object("path/to/object").await? {
///     let bytes = bucket.get_object("path/to/object").await?;
/// #   let _ = bytes;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Bucket {
    client: Client,
    name: String,
}

impl Bucket {
    /// Wrap `client` for operations against the bucket called `name`.
    pub fn new(client: Client, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
        }
    }

    /// The bucket name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether an object exists under `key`. A not-found response is
    /// `Ok(false)`, not an error.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "aws_clients.s3.has_object", skip_all, err)
    )]
    pub async fn has_object(&self, key: &str) -> Result<bool, S3Error> {
        match self
            .client
            .head_object()
            .bucket(&self.name)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                if let Some(common) = classify(&err) {
                    return Err(common.into());
                }
                let service_error = err.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(S3Error::Sdk(render_sdk_error(&service_error)))
                }
            }
        }
    }

    /// Read the full body of the object under `key`.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "aws_clients.s3.get_object", skip_all, err)
    )]
    pub async fn get_object(&self, key: &str) -> Result<Vec<u8>, S3Error> {
        let output = self
            .client
            .get_object()
            .bucket(&self.name)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if let Some(common) = classify(&err) {
                    return common.into();
                }
                let service_error = err.into_service_error();
                if service_error.is_no_such_key() {
                    S3Error::ObjectDoesNotExist(key.to_string())
                } else if service_error.code() == Some("NoSuchBucket") {
                    S3Error::BucketDoesNotExist(self.name.clone())
                } else {
                    S3Error::Sdk(render_sdk_error(&service_error))
                }
            })?;
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|err| S3Error::Body(err.to_string()))?;
        Ok(bytes.into_bytes().to_vec())
    }

    /// Write `body` to the object under `key`, replacing any existing object.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "aws_clients.s3.put_object", skip_all, err)
    )]
    pub async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<PutObjectOutput, S3Error> {
        self.client
            .put_object()
            .bucket(&self.name)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| {
                if let Some(common) = classify(&err) {
                    return common.into();
                }
                let service_error = err.into_service_error();
                if service_error.code() == Some("NoSuchBucket") {
                    S3Error::BucketDoesNotExist(self.name.clone())
                } else {
                    S3Error::Sdk(render_sdk_error(&service_error))
                }
            })
    }
}
