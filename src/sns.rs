//! Wrapper client for one SNS topic.

use crate::common::error::{CommonError, classify, render_sdk_error};

use aws_sdk_sns::operation::publish::PublishOutput;
use aws_sdk_sns::{Client, error, types};
use serde::Serialize;
use thiserror::Error;

/// Errors raised by the topic wrapper.
#[derive(Debug, Error)]
pub enum SnsError {
    /// The topic does not exist, or the ARN is malformed. The service
    /// reports a malformed ARN as an invalid parameter, so both responses
    /// map here.
    #[error("topic `{0}` not found")]
    TopicNotFound(String),
    /// The message body could not be encoded as JSON.
    #[error("message body is not JSON serializable")]
    NotJsonSerializable(#[from] serde_json::Error),
    /// A request component could not be built.
    #[error(transparent)]
    Build(#[from] error::BuildError),
    /// Authentication or connection failure.
    #[error(transparent)]
    Common(#[from] CommonError),
    /// Any other SDK failure, rendered with its full error chain.
    #[error("unexpected SDK error: {0}")]
    Sdk(String),
}

/// Wrapper client for one SNS topic.
///
/// ```rust,no_run
/// use aws_clients::sns;
/// use aws_sdk_sns::Client;
/// use serde_json::json;
///
/// # async fn example() -> Result<(), sns::SnsError> {
/// # let client = Client::from_conf(aws_sdk_sns::config::Config::builder().build());
/// let topic = sns::Topic::new(
///     client,
///     "arn:aws:sns:eu-south-1:477353422995:aws-watchdog-errors-prod",
/// );
/// topic.publish_json(&json!({"text": "hello"})).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Topic {
    client: Client,
    arn: String,
}

impl Topic {
    /// Wrap `client` for operations against the topic at `arn`.
    pub fn new(client: Client, arn: impl Into<String>) -> Self {
        Self {
            client,
            arn: arn.into(),
        }
    }

    /// The topic ARN.
    pub fn arn(&self) -> &str {
        &self.arn
    }

    /// Publish `body` encoded as JSON, with a `content_type` message
    /// attribute announcing `application/json` to subscribers.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "aws_clients.sns.publish_json", skip_all, err)
    )]
    pub async fn publish_json<T: Serialize>(&self, body: &T) -> Result<PublishOutput, SnsError> {
        let body = serde_json::to_string(body)?;
        let content_type = types::MessageAttributeValue::builder()
            .data_type("String")
            .string_value("application/json")
            .build()?;
        self.publish(body, Some(("content_type".to_string(), content_type)))
            .await
    }

    /// Publish `body` verbatim, without message attributes.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "aws_clients.sns.publish_raw", skip_all, err)
    )]
    pub async fn publish_raw(&self, body: impl Into<String>) -> Result<PublishOutput, SnsError> {
        self.publish(body.into(), None).await
    }

    async fn publish(
        &self,
        body: String,
        attribute: Option<(String, types::MessageAttributeValue)>,
    ) -> Result<PublishOutput, SnsError> {
        let mut builder = self.client.publish().topic_arn(&self.arn).message(body);
        if let Some((name, value)) = attribute {
            builder = builder.message_attributes(name, value);
        }
        builder.send().await.map_err(|err| {
            if let Some(common) = classify(&err) {
                return common.into();
            }
            let service_error = err.into_service_error();
            if service_error.is_not_found_exception()
                || service_error.is_invalid_parameter_exception()
            {
                SnsError::TopicNotFound(self.arn.clone())
            } else {
                SnsError::Sdk(render_sdk_error(&service_error))
            }
        })
    }
}
