use crate::error::{QueueError, Result};
use crate::{Queue, QueueMessage};
use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use tracing::{debug, info};

/// [`Queue`] over an SQS queue resolved by name.
pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsQueue {
    /// Resolve the queue URL. Fails if the queue does not exist or is not
    /// accessible.
    pub async fn connect(client: aws_sdk_sqs::Client, queue_name: &str) -> Result<Self> {
        info!("Connect to SQS: {queue_name}");
        let output = client
            .get_queue_url()
            .queue_name(queue_name)
            .send()
            .await
            .map_err(|e| QueueError::ResolveUrl {
                queue: queue_name.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        let queue_url = output
            .queue_url()
            .ok_or(QueueError::MissingField("QueueUrl"))?
            .to_string();
        debug!("Queue URL: {queue_url}");
        Ok(Self { client, queue_url })
    }

    pub async fn from_sdk_config(sdk_config: &aws_config::SdkConfig, queue_name: &str) -> Result<Self> {
        Self::connect(aws_sdk_sqs::Client::new(sdk_config), queue_name).await
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl Queue for SqsQueue {
    async fn receive(&self) -> Result<Option<QueueMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .send()
            .await
            .map_err(|e| QueueError::Receive(DisplayErrorContext(&e).to_string()))?;

        let Some(message) = output.messages().first() else {
            return Ok(None);
        };
        Ok(Some(QueueMessage {
            message_id: message
                .message_id()
                .ok_or(QueueError::MissingField("MessageId"))?
                .to_string(),
            receipt_handle: message
                .receipt_handle()
                .ok_or(QueueError::MissingField("ReceiptHandle"))?
                .to_string(),
            body: message.body().unwrap_or_default().to_string(),
        }))
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| QueueError::Delete(DisplayErrorContext(&e).to_string()))
    }
}
