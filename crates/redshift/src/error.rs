use thiserror::Error;

/// Failure while loading into Redshift.
///
/// The variant records which step failed so it can be logged; callers only
/// need to know that the load did not happen.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Failed to get cluster credentials: {0}")]
    Credentials(String),

    #[error("Failed to connect to Redshift: {0}")]
    Connect(String),

    #[error("Failed to begin transaction: {0}")]
    Begin(String),

    #[error("Statement failed: {0}")]
    Statement(String),

    #[error("Failed to commit transaction: {0}")]
    Commit(String),

    #[error("Failed to roll back transaction: {0}")]
    Rollback(String),

    #[error("{0} is not supported by this driver")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, LoadError>;
