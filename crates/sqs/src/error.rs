use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Failed to resolve queue URL for {queue}: {message}")]
    ResolveUrl { queue: String, message: String },

    #[error("Failed to receive message: {0}")]
    Receive(String),

    #[error("Failed to delete message: {0}")]
    Delete(String),

    #[error("Message without {0}")]
    MissingField(&'static str),
}

pub type Result<T> = std::result::Result<T, QueueError>;
