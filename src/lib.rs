//! Rin
//!
//! Redshift data importer driven by S3 event notifications.
//!
//! S3 publishes `ObjectCreated` notifications to SQS (directly or through
//! SNS). Rin receives them one at a time, matches every object against the
//! configured targets in order, and loads matching objects with a Redshift
//! `COPY`. A message is deleted only after every record in it was handled,
//! so delivery is at least once.
//!
//! # Modes
//!
//! - Worker: poll forever until SIGINT/SIGTERM/SIGHUP/SIGQUIT
//! - Batch (`--batch`): stop when the queue is empty, or after
//!   `--max-execution-count` messages / `--max-execution-time`
//! - Lambda: [`lambda::handle_sqs_event`] processes an SQS event batch and
//!   reports failed messages
//!
//! # CLI Usage
//!
//! ```bash
//! rin --config config.yaml
//! rin --config s3://my-bucket/rin/config.yaml --batch --max-execution-time 5m
//! rin --config config.yaml --dry-run
//! ```

pub mod aws;
pub mod config;
pub mod error;
pub mod import;
pub mod lambda;
pub mod policy;
pub mod signal;
pub mod sql;
pub mod target;
pub mod testing;
pub mod worker;

use config::Config;
use rin_redshift::{ClusterCredentials, ConnectionPool, Connector, CredentialSource, RedshiftConnector};
use std::sync::Arc;

/// Everything needed to process messages: the configuration and the
/// Redshift connection pool. Built once at startup and shared by reference.
pub struct Rin {
    config: Config,
    pool: ConnectionPool,
}

impl Rin {
    pub fn new(
        config: Config,
        connector: Arc<dyn Connector>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            config,
            pool: ConnectionPool::new(connector, credentials),
        }
    }

    /// Connect to Redshift through the AWS APIs described by `sdk_config`.
    pub fn from_sdk_config(config: Config, sdk_config: &aws_config::SdkConfig) -> Self {
        Self::new(
            config,
            Arc::new(RedshiftConnector::from_sdk_config(sdk_config)),
            Arc::new(ClusterCredentials::from_sdk_config(sdk_config)),
        )
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Close every pooled connection.
    pub async fn shutdown(&self) {
        self.pool.close_all().await;
    }
}

/// Log the resolved targets. This is all `--dry-run` does after loading.
pub fn describe_targets(config: &Config) {
    for target in &config.targets {
        tracing::info!("Define target {target}");
    }
}
