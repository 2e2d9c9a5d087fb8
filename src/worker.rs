//! Consumer loop
//!
//! Receives one message at a time, imports it, and deletes it once every
//! record was handled. A message whose import fails is left on the queue and
//! comes back after its visibility timeout.

use crate::import::{self, Processed};
use crate::policy::{Backoff, BoundedPolicy, Step, StopReason};
use crate::Rin;
use rin_sqs::{Queue, QueueMessage};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Pause before polling again after an empty receive in worker mode.
pub const IDLE_DELAY: Duration = Duration::from_secs(1);

/// Pause after a failed receive.
pub const RECEIVE_ERROR_DELAY: Duration = Duration::from_secs(10);

/// Bound on a single delete call.
pub const DELETE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Stop when the queue is empty instead of waiting for more messages
    pub batch: bool,
    /// Batch mode only. Zero means no limit.
    pub max_execution_count: u32,
    /// Batch mode only
    pub max_execution_time: Option<Duration>,
}

impl RunOptions {
    pub fn worker() -> Self {
        Self::default()
    }

    pub fn batch() -> Self {
        Self {
            batch: true,
            ..Self::default()
        }
    }

    fn breaker(&self) -> BoundedPolicy {
        if self.batch {
            BoundedPolicy::new(
                Some(self.max_execution_count),
                self.max_execution_time,
                Backoff::None,
            )
        } else {
            BoundedPolicy::unbounded()
        }
    }
}

/// Why [`run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Cancelled,
    /// Batch mode found no message
    QueueDrained,
    /// Batch mode hit its count or time limit
    Breaker(StopReason),
}

/// Run the consumer loop until cancelled, or in batch mode until the queue
/// is drained or the breaker trips.
///
/// Cancellation is honoured between messages. A pending receive is dropped;
/// a message already received is always processed to the end.
pub async fn run(
    rin: &Rin,
    queue: &dyn Queue,
    options: &RunOptions,
    cancel: CancellationToken,
) -> Exit {
    let mut breaker = options.breaker();
    info!(batch = options.batch, "Start polling");

    loop {
        if cancel.is_cancelled() {
            return Exit::Cancelled;
        }
        if let Step::Stop(reason) = breaker.next() {
            info!("Batch breaker: {reason}");
            return Exit::Breaker(reason);
        }

        let received = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("Shutdown requested during receive");
                return Exit::Cancelled;
            }

            result = queue.receive() => result,
        };

        let message = match received {
            Ok(Some(message)) => message,
            Ok(None) => {
                if options.batch {
                    info!("No messages. Exit.");
                    return Exit::QueueDrained;
                }
                debug!("No messages");
                if pause(&cancel, IDLE_DELAY).await.is_none() {
                    return Exit::Cancelled;
                }
                continue;
            }
            Err(e) => {
                warn!("Receive failed: {e}");
                if pause(&cancel, RECEIVE_ERROR_DELAY).await.is_none() {
                    return Exit::Cancelled;
                }
                continue;
            }
        };

        handle_message(rin, queue, &message).await;
    }
}

async fn pause(cancel: &CancellationToken, delay: Duration) -> Option<()> {
    cancel.run_until_cancelled(tokio::time::sleep(delay)).await
}

/// Process one message and delete it when it was fully handled.
/// Returns whether the message was deleted.
pub async fn handle_message(rin: &Rin, queue: &dyn Queue, message: &QueueMessage) -> bool {
    let message_id = message.message_id.as_str();
    info!(message_id, "Starting process message");
    debug!(message_id, body = %message.body, "Message body");

    match import::process(rin, &message.body).await {
        Ok(Processed::TestEvent(event)) => {
            info!(message_id, "Skipping {event}");
        }
        Ok(Processed::Imported(0)) => {
            warn!(message_id, "All events were not matched for any targets. Ignored.");
        }
        Ok(Processed::Imported(handled)) => {
            info!(message_id, handled, "Import completed");
        }
        Err(e) => {
            error!(message_id, "Aborted message: {e}");
            return false;
        }
    }

    delete_with_retry(queue, message).await
}

/// Delete with up to [`MAX_DELETE_RETRY`](crate::policy::MAX_DELETE_RETRY)
/// retries, sleeping `i²` seconds before retry `i`.
pub async fn delete_with_retry(queue: &dyn Queue, message: &QueueMessage) -> bool {
    let message_id = message.message_id.as_str();
    let mut retry = BoundedPolicy::delete_retry();

    loop {
        match tokio::time::timeout(DELETE_TIMEOUT, queue.delete(&message.receipt_handle)).await {
            Ok(Ok(())) => {
                info!(message_id, "Completed message");
                return true;
            }
            Ok(Err(e)) => warn!(message_id, "Can't delete message: {e}"),
            Err(_) => warn!(message_id, "Delete timed out after {DELETE_TIMEOUT:?}"),
        }

        match retry.next() {
            Step::Continue(delay) => {
                info!(message_id, "Retry to delete after {}s", delay.as_secs());
                tokio::time::sleep(delay).await;
            }
            Step::Stop(_) => {
                error!(message_id, "Max retry count reached. Giving up.");
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::testing::{MemoryQueue, RecordingConnector, StaticCredentials};
    use std::sync::Arc;

    const CONFIG: &str = r#"
queue_name: rin_test
credentials:
  aws_access_key_id: AAA
  aws_secret_access_key: SSS
redshift:
  host: localhost
  dbname: test
  user: test_user
  password: test_pass
s3:
  bucket: test.bucket.test
  region: ap-northeast-1
sql_option: "JSON 'auto' GZIP"
targets:
  - redshift:
      table: foo
    s3:
      key_prefix: test/foo
"#;

    const TEST_EVENT_BODY: &str =
        r#"{"Service":"Amazon S3","Event":"s3:TestEvent","Bucket":"test.bucket.test"}"#;

    fn rin() -> (Rin, Arc<RecordingConnector>) {
        let config = Config::from_yaml(CONFIG, false).unwrap();
        let connector = Arc::new(RecordingConnector::new());
        let rin = Rin::new(config, connector.clone(), Arc::new(StaticCredentials::new()));
        (rin, connector)
    }

    fn body(key: &str) -> String {
        serde_json::json!({
            "Records": [{
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": {"name": "test.bucket.test"},
                    "object": {"key": key, "size": 1}
                }
            }]
        })
        .to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_drains_queue() {
        let (rin, connector) = rin();
        let queue = MemoryQueue::new();
        queue.push(body("test/foo/a.json"));
        queue.push(body("test/foo/b.json"));

        let exit = run(&rin, &queue, &RunOptions::batch(), CancellationToken::new()).await;

        assert_eq!(exit, Exit::QueueDrained);
        assert_eq!(queue.deleted(), vec!["handle-1", "handle-2"]);
        assert_eq!(connector.statements().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_breaker_count() {
        let (rin, connector) = rin();
        let queue = MemoryQueue::new();
        for key in ["a", "b", "c"] {
            queue.push(body(&format!("test/foo/{key}.json")));
        }
        let options = RunOptions {
            max_execution_count: 2,
            ..RunOptions::batch()
        };

        let exit = run(&rin, &queue, &options, CancellationToken::new()).await;

        assert_eq!(exit, Exit::Breaker(StopReason::MaxAttempts(2)));
        assert_eq!(connector.statements().len(), 2);
        assert_eq!(queue.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_execution_count_ignored_in_worker_mode() {
        let (rin, _) = rin();
        let queue = MemoryQueue::new();
        queue.push(body("test/foo/a.json"));
        let options = RunOptions {
            max_execution_count: 1,
            ..RunOptions::worker()
        };
        let cancel = CancellationToken::new();

        let handle = {
            let cancel = cancel.clone();
            async move { run(&rin, &queue, &options, cancel).await }
        };
        let (exit, _) = tokio::join!(handle, async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            cancel.cancel();
        });

        assert_eq!(exit, Exit::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_test_event_is_deleted() {
        let (rin, connector) = rin();
        let queue = MemoryQueue::new();
        let message = queue.push(TEST_EVENT_BODY);

        assert!(handle_message(&rin, &queue, &message).await);
        assert_eq!(queue.deleted(), vec!["handle-1"]);
        assert_eq!(connector.connects(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmatched_message_is_deleted() {
        let (rin, connector) = rin();
        let queue = MemoryQueue::new();
        let message = queue.push(body("other/a.json"));

        assert!(handle_message(&rin, &queue, &message).await);
        assert_eq!(queue.pending(), 0);
        assert!(connector.statements().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_import_keeps_message() {
        let (rin, connector) = rin();
        let queue = MemoryQueue::new();
        let message = queue.push(body("test/foo/a.json"));
        connector.fail_next_statements(1);

        assert!(!handle_message(&rin, &queue, &message).await);
        assert!(queue.deleted().is_empty());
        assert_eq!(queue.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_body_keeps_message() {
        let (rin, _) = rin();
        let queue = MemoryQueue::new();
        let message = queue.push("{not json");

        assert!(!handle_message(&rin, &queue, &message).await);
        assert_eq!(queue.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_retry_schedule() {
        let queue = MemoryQueue::new();
        let message = queue.push("body");
        queue.fail_next_deletes(3);

        let start = tokio::time::Instant::now();
        assert!(delete_with_retry(&queue, &message).await);

        // 1 + 4 + 9
        assert_eq!(start.elapsed(), Duration::from_secs(14));
        assert_eq!(queue.deleted(), vec!["handle-1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_gives_up() {
        let queue = MemoryQueue::new();
        let message = queue.push("body");
        queue.fail_next_deletes(100);

        let start = tokio::time::Instant::now();
        assert!(!delete_with_retry(&queue, &message).await);

        // sum of i² for i in 1..=8
        assert_eq!(start.elapsed(), Duration::from_secs(204));
        assert_eq!(queue.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_error_backs_off() {
        let (rin, _) = rin();
        let queue = MemoryQueue::new();
        queue.push(body("test/foo/a.json"));
        queue.fail_next_receives(1);

        let start = tokio::time::Instant::now();
        let exit = run(&rin, &queue, &RunOptions::batch(), CancellationToken::new()).await;

        assert_eq!(exit, Exit::QueueDrained);
        assert_eq!(start.elapsed(), RECEIVE_ERROR_DELAY);
        assert_eq!(queue.deleted(), vec!["handle-1"]);
        assert_eq!(queue.receives(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start() {
        let (rin, _) = rin();
        let queue = MemoryQueue::new();
        queue.push(body("test/foo/a.json"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let exit = run(&rin, &queue, &RunOptions::worker(), cancel).await;

        assert_eq!(exit, Exit::Cancelled);
        assert_eq!(queue.receives(), 0);
    }
}
