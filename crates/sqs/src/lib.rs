//! Notification queue for rin
//!
//! The consumer loop only sees the [`Queue`] trait: receive at most one
//! message, and delete it by receipt handle once it has been handled.
//! [`SqsQueue`] implements it over Amazon SQS.

pub mod error;
mod sqs;

use async_trait::async_trait;

pub use error::{QueueError, Result};
pub use sqs::SqsQueue;

/// A received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
}

#[async_trait]
pub trait Queue: Send + Sync {
    /// Receive at most one message. `Ok(None)` means the queue was empty.
    async fn receive(&self) -> Result<Option<QueueMessage>>;

    /// Acknowledge a message so it is not delivered again.
    async fn delete(&self, receipt_handle: &str) -> Result<()>;
}
