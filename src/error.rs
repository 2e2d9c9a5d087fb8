use rin_event::DecodeError;
use rin_redshift::LoadError;
use thiserror::Error;

/// Invalid configuration. Detected at load time; rin does not start.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config template error: {}", .0.join("; "))]
    Template(Vec<String>),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{0}")]
    InvalidDriver(String),

    #[error("queue_name required")]
    MissingQueueName,

    #[error("no targets defined")]
    NoTargets,

    #[error("targets[{index}]: key_prefix or key_regexp is not defined")]
    NoKeyMatcher { index: usize },

    #[error("targets[{index}]: invalid key_regexp {pattern:?}: {source}")]
    InvalidRegexp {
        index: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("targets[{index}]: {message}")]
    InvalidEndpoint { index: usize, message: String },

    #[error("targets[{index}]: redshift.table is not defined")]
    MissingTable { index: usize },
}

/// Failure while importing the records of one message.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("target {target} has no load destination")]
    NoDestination { target: String },

    #[error("Import into {endpoint} failed: {source}")]
    Load {
        endpoint: String,
        #[source]
        source: LoadError,
    },
}

/// Failure while processing one message. The message is left on the queue.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Can't parse event from body: {0}")]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Import(#[from] ImportError),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LambdaError {
    #[error("sqs message id is empty")]
    EmptyMessageId,
}
