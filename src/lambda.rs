//! SQS-triggered Lambda handler
//!
//! Lambda delivers a batch of SQS messages in one event and deletes them
//! itself on success. Messages that failed are reported back in
//! `batchItemFailures` so only those become visible again.

use crate::error::LambdaError;
use crate::import::{self, Processed};
use crate::Rin;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SqsEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<SqsMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SqsMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
    pub event_source: String,
    pub event_source_arn: String,
    pub aws_region: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SqsBatchResponse {
    pub batch_item_failures: Vec<BatchItemFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub item_identifier: String,
}

/// Process every message of the event and report the ones that failed.
pub async fn handle_sqs_event(
    rin: &Rin,
    event: SqsEvent,
) -> Result<SqsBatchResponse, LambdaError> {
    let mut response = SqsBatchResponse::default();

    for message in &event.records {
        if message.message_id.is_empty() {
            return Err(LambdaError::EmptyMessageId);
        }
        let message_id = message.message_id.as_str();
        info!(message_id, "Starting process message");

        match import::process(rin, &message.body).await {
            Ok(Processed::TestEvent(event)) => info!(message_id, "Skipping {event}"),
            Ok(Processed::Imported(0)) => {
                warn!(message_id, "All events were not matched for any targets. Ignored.")
            }
            Ok(Processed::Imported(_)) => info!(message_id, "Completed message"),
            Err(e) => {
                error!(message_id, "Aborted message: {e}");
                response.batch_item_failures.push(BatchItemFailure {
                    item_identifier: message.message_id.clone(),
                });
            }
        }
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::testing::{RecordingConnector, StaticCredentials};
    use std::sync::Arc;

    const CONFIG: &str = r#"
credentials:
  aws_iam_role: arn:aws:iam::123456789012:role/rin
  aws_region: ap-northeast-1
redshift:
  host: localhost
  dbname: test
  user: test_user
  password: test_pass
s3:
  bucket: test.bucket.test
  region: ap-northeast-1
targets:
  - redshift:
      table: foo
    s3:
      key_prefix: test/foo
"#;

    fn rin() -> (Rin, Arc<RecordingConnector>) {
        let config = Config::from_yaml(CONFIG, true).unwrap();
        let connector = Arc::new(RecordingConnector::new());
        let rin = Rin::new(config, connector.clone(), Arc::new(StaticCredentials::new()));
        (rin, connector)
    }

    fn s3_body(key: &str) -> String {
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

    fn sqs_event(messages: &[(&str, String)]) -> SqsEvent {
        let records: Vec<serde_json::Value> = messages
            .iter()
            .map(|(id, body)| {
                serde_json::json!({
                    "messageId": id,
                    "receiptHandle": format!("handle-{id}"),
                    "body": body,
                    "eventSource": "aws:sqs",
                    "awsRegion": "ap-northeast-1"
                })
            })
            .collect();
        serde_json::from_value(serde_json::json!({ "Records": records })).unwrap()
    }

    #[tokio::test]
    async fn test_all_messages_succeed() {
        let (rin, connector) = rin();
        let event = sqs_event(&[
            ("m1", s3_body("test/foo/a.json")),
            ("m2", s3_body("unmatched/b.json")),
        ]);

        let response = handle_sqs_event(&rin, event).await.unwrap();

        assert!(response.batch_item_failures.is_empty());
        let statements = connector.statements();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].contains("CREDENTIALS 'aws_iam_role=arn:aws:iam::123456789012:role/rin'"));
    }

    #[tokio::test]
    async fn test_failed_messages_are_reported() {
        let (rin, connector) = rin();
        connector.fail_next_statements(1);
        let event = sqs_event(&[
            ("m1", s3_body("test/foo/a.json")),
            ("m2", "not json".to_string()),
            ("m3", s3_body("test/foo/c.json")),
        ]);

        let response = handle_sqs_event(&rin, event).await.unwrap();

        let failed: Vec<&str> = response
            .batch_item_failures
            .iter()
            .map(|f| f.item_identifier.as_str())
            .collect();
        assert_eq!(failed, vec!["m1", "m2"]);
        assert_eq!(connector.statements().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_message_id_fails_invocation() {
        let (rin, _) = rin();
        let event = sqs_event(&[("", s3_body("test/foo/a.json"))]);
        let err = handle_sqs_event(&rin, event).await.unwrap_err();
        assert_eq!(err, LambdaError::EmptyMessageId);
    }

    #[test]
    fn test_response_wire_format() {
        let response = SqsBatchResponse {
            batch_item_failures: vec![BatchItemFailure {
                item_identifier: "m1".to_string(),
            }],
        };
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"batchItemFailures":[{"itemIdentifier":"m1"}]}"#
        );
    }
}
