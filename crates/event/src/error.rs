use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Invalid message body: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("Invalid S3 notification: {0}")]
    Notification(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DecodeError>;
