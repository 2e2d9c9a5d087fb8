//! Command-line interface for rin
//!
//! ```bash
//! # Worker: poll until SIGINT/SIGTERM
//! rin --config config.yaml
//!
//! # Batch: exit when the queue is empty, or after 100 messages / 5 minutes
//! rin --config s3://my-bucket/rin.yaml --batch \
//!   --max-execution-count 100 --max-execution-time 5m
//!
//! # Validate the config and print the targets
//! rin --config config.yaml --dry-run
//! ```

use anyhow::Context;
use clap::Parser;
use rin::config::{duration::parse_duration, Config};
use rin::worker::{self, Exit, RunOptions};
use rin::Rin;
use rin_sqs::SqsQueue;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "rin")]
#[command(version)]
#[command(about = "Redshift data importer driven by S3 event notifications through SQS")]
struct Cli {
    /// Config file path or URI (file://, s3://, http(s)://)
    #[arg(short, long, env = "RIN_CONFIG", default_value = "config.yaml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long, env = "RIN_DEBUG")]
    debug: bool,

    /// Exit when the queue is empty
    #[arg(short, long, env = "RIN_BATCH")]
    batch: bool,

    /// Load and validate the config, then exit
    #[arg(long, env = "RIN_DRY_RUN")]
    dry_run: bool,

    /// Batch mode: stop after this many messages (0: no limit)
    #[arg(long, env = "RIN_MAX_EXECUTION_COUNT", default_value_t = 0)]
    max_execution_count: u32,

    /// Batch mode: stop after this long (e.g. 300, 30s, 5m, 1h)
    #[arg(long, env = "RIN_MAX_EXECUTION_TIME", value_parser = parse_duration)]
    max_execution_time: Option<Duration>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("rin version {}", env!("CARGO_PKG_VERSION"));
    info!("Loading config: {}", cli.config);
    let config = Config::load(&cli.config)
        .await
        .with_context(|| format!("Failed to load config from {}", cli.config))?;
    rin::describe_targets(&config);

    if cli.dry_run {
        info!("Dry run. Exit.");
        return Ok(());
    }

    let sdk_config = rin::aws::sdk_config(&config.credentials).await;
    let queue_name = config
        .queue_name
        .clone()
        .context("queue_name is not defined")?;
    let queue = SqsQueue::from_sdk_config(&sdk_config, &queue_name)
        .await
        .with_context(|| format!("Failed to resolve queue {queue_name}"))?;
    info!("Queue URL: {}", queue.queue_url());

    let rin = Rin::from_sdk_config(config, &sdk_config);

    let cancel = CancellationToken::new();
    let listener = rin::signal::spawn_shutdown_listener(cancel.clone());

    let options = RunOptions {
        batch: cli.batch,
        max_execution_count: cli.max_execution_count,
        max_execution_time: cli.max_execution_time,
    };
    match worker::run(&rin, &queue, &options, cancel).await {
        Exit::Cancelled => info!("Worker cancelled"),
        Exit::QueueDrained => info!("Queue drained"),
        Exit::Breaker(reason) => info!("Batch stopped: {reason}"),
    }

    listener.abort();
    rin.shutdown().await;
    info!("Shutdown.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_from_environment() {
        std::env::set_var("RIN_CONFIG", "s3://bucket/rin.yaml");
        std::env::set_var("RIN_DEBUG", "true");
        std::env::set_var("RIN_BATCH", "true");
        std::env::set_var("RIN_DRY_RUN", "false");
        std::env::set_var("RIN_MAX_EXECUTION_COUNT", "100");
        std::env::set_var("RIN_MAX_EXECUTION_TIME", "5m");

        let cli = Cli::try_parse_from(["rin"]).unwrap();
        assert_eq!(cli.config, "s3://bucket/rin.yaml");
        assert!(cli.debug);
        assert!(cli.batch);
        assert!(!cli.dry_run);
        assert_eq!(cli.max_execution_count, 100);
        assert_eq!(cli.max_execution_time, Some(Duration::from_secs(300)));

        // command line wins over the environment
        let cli = Cli::try_parse_from(["rin", "-c", "local.yaml", "--max-execution-count", "1"])
            .unwrap();
        assert_eq!(cli.config, "local.yaml");
        assert_eq!(cli.max_execution_count, 1);
    }
}
