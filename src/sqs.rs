//! Wrapper client for one SQS queue.

use crate::common::error::{CommonError, classify, render_sdk_error};

use aws_sdk_sqs::error::ProvideErrorMetadata;
use aws_sdk_sqs::operation::send_message::SendMessageOutput;
use aws_sdk_sqs::{Client, types};
use thiserror::Error;

/// Error codes reported when the queue does not exist. The JSON and query
/// protocols spell them differently.
const QUEUE_MISSING_CODES: [&str; 2] = [
    "QueueDoesNotExist",
    "AWS.SimpleQueueService.NonExistentQueue",
];

/// Errors raised by the queue wrapper.
#[derive(Debug, Error)]
pub enum SqsError {
    /// The queue does not exist.
    #[error("queue `{0}` does not exist")]
    QueueDoesNotExist(String),
    /// Authentication or connection failure.
    #[error(transparent)]
    Common(#[from] CommonError),
    /// Any other SDK failure, rendered with its full error chain.
    #[error("unexpected SDK error: {0}")]
    Sdk(String),
}

/// Wrapper client for one SQS queue.
///
/// ```rust,no_run
/// use aws_clients::sqs;
/// use aws_sdk_sqs::Client;
///
/// # async fn example() -> Result<(), sqs::SqsError> {
/// # let client = Client::from_conf(aws_sdk_sqs::config::Config::builder().build());
/// let queue = sqs::Queue::by_name(client, "scanner-events").await?;
/// queue.send_message("{\"bucket\": \"my-bucket\"}").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Queue {
    client: Client,
    url: String,
}

impl Queue {
    /// Resolve the queue called `name` to its URL and wrap `client` for
    /// operations against it.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "aws_clients.sqs.by_name", skip_all, err)
    )]
    pub async fn by_name(client: Client, name: &str) -> Result<Self, SqsError> {
        let output = client
            .get_queue_url()
            .queue_name(name)
            .send()
            .await
            .map_err(|err| queue_error(name, err))?;
        let url = output
            .queue_url
            .ok_or_else(|| SqsError::Sdk("response contained no queue url".to_string()))?;
        Ok(Self { client, url })
    }

    /// Wrap `client` for operations against the queue at `url`, skipping the
    /// name lookup.
    pub fn from_url(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// The queue URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one message with the given body.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "aws_clients.sqs.send_message", skip_all, err)
    )]
    pub async fn send_message(&self, body: &str) -> Result<SendMessageOutput, SqsError> {
        self.client
            .send_message()
            .queue_url(&self.url)
            .message_body(body)
            .send()
            .await
            .map_err(|err| queue_error(&self.url, err))
    }

    /// Receive up to `max_messages` messages.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "aws_clients.sqs.receive_messages", skip_all, err)
    )]
    pub async fn receive_messages(&self, max_messages: i32) -> Result<Vec<types::Message>, SqsError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.url)
            .max_number_of_messages(max_messages)
            .send()
            .await
            .map_err(|err| queue_error(&self.url, err))?;
        Ok(output.messages.unwrap_or_default())
    }

    /// Delete the message identified by `receipt_handle`.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "aws_clients.sqs.delete_message", skip_all, err)
    )]
    pub async fn delete_message(&self, receipt_handle: &str) -> Result<(), SqsError> {
        self.client
            .delete_message()
            .queue_url(&self.url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| queue_error(&self.url, err))
    }
}

/// Map an SQS operation failure to the wrapper taxonomy; `queue` names the
/// queue in the non-existent case.
fn queue_error<E, R>(
    queue: &str,
    err: aws_smithy_runtime_api::client::result::SdkError<E, R>,
) -> SqsError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug + 'static,
{
    if let Some(common) = classify(&err) {
        return common.into();
    }
    match err.code() {
        Some(code) if QUEUE_MISSING_CODES.contains(&code) => {
            SqsError::QueueDoesNotExist(queue.to_string())
        }
        _ => SqsError::Sdk(render_sdk_error(&err)),
    }
}
