//! S3 object notification parsing for rin
//!
//! Queue messages carry S3 `ObjectCreated` notifications, either directly
//! (S3 → SQS) or wrapped in an SNS envelope (S3 → SNS → SQS). This crate
//! turns a raw message body into an [`Event`]:
//!
//! ```text
//! body ──► SNS envelope? ──► {"Records": [...]} ──► Event
//!              │                    │
//!              └─ Message string    └─ keys containing '%' are URL-decoded
//! ```
//!
//! S3 also sends a synthetic `s3:TestEvent` when a notification is first
//! configured. It has no records and is reported through
//! [`Event::is_test_event`] so callers can acknowledge it without loading.

mod error;
mod event;

pub use error::{DecodeError, Result};
pub use event::{Event, EventRecord, S3Bucket, S3Entity, S3Object, TEST_EVENT};

use serde::Deserialize;
use std::borrow::Cow;

/// Format of an S3 object location, shared with statement building.
pub fn s3_uri(bucket: &str, key: &str) -> String {
    format!("s3://{bucket}/{key}")
}

#[derive(Debug, Deserialize)]
struct SnsEnvelope {
    #[serde(rename = "Message")]
    message: Option<String>,
}

/// Parse a queue message body into an [`Event`].
///
/// Fails when the body, or the message inside an SNS envelope, is not JSON of
/// the expected shape. Object keys are URL-decoded on a best-effort basis.
pub fn parse(body: &[u8]) -> Result<Event> {
    let envelope: SnsEnvelope = serde_json::from_slice(body).map_err(DecodeError::Envelope)?;

    let mut event: Event = match envelope.message {
        Some(inner) => serde_json::from_str(&inner).map_err(DecodeError::Notification)?,
        None => serde_json::from_slice(body).map_err(DecodeError::Notification)?,
    };

    if event.records.is_empty() && event.is_test_event() {
        return Ok(event);
    }

    for record in event.records.iter_mut() {
        let decoded = decode_key(&record.s3.object.key).into_owned();
        record.s3.object.key = decoded;
    }

    Ok(event)
}

/// Decode an object key the way S3 encodes it in notifications
/// (form encoding: `%XX` escapes and `+` for spaces).
///
/// Keys without a `%` are returned untouched, and so are keys with a
/// malformed escape or that do not decode to valid UTF-8.
pub fn decode_key(key: &str) -> Cow<'_, str> {
    if !key.contains('%') {
        return Cow::Borrowed(key);
    }
    if !has_valid_escapes(key) {
        tracing::debug!("Leaving key {key:?} with malformed escape as is");
        return Cow::Borrowed(key);
    }
    let spaced = key.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => Cow::Owned(decoded.into_owned()),
        Err(e) => {
            tracing::debug!("Leaving undecodable key {key:?} as is: {e}");
            Cow::Borrowed(key)
        }
    }
}

/// Every `%` is followed by two hex digits.
fn has_valid_escapes(key: &str) -> bool {
    let bytes = key.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT: &str = r#"{
      "Records": [
        {
          "eventVersion": "2.0",
          "eventSource": "aws:s3",
          "awsRegion": "ap-northeast-1",
          "eventTime": "2015-04-21T04:55:48.282Z",
          "eventName": "ObjectCreated:Put",
          "userIdentity": {"principalId": "AWS:AIDAITB24YMP65EXRRFHC"},
          "s3": {
            "s3SchemaVersion": "1.0",
            "configurationId": "test",
            "bucket": {"name": "test.bucket.test", "arn": "arn:aws:s3:::test.bucket.test"},
            "object": {"key": "foo/bar%3Dbaz.json", "size": 443, "eTag": "86fcdfb65af50a994cf63ddd280cea0d"}
          }
        }
      ]
    }"#;

    const TEST_EVENT_BODY: &str = r#"{
      "Service": "Amazon S3",
      "Event": "s3:TestEvent",
      "Time": "2015-04-22T02:28:28.921Z",
      "Bucket": "example-bucket",
      "RequestId": "16FB3C3F2DF8D8C0",
      "HostId": "LVZUhnT0Z8JGhgB9VJyjmLBPVJp0ZxUJpbZeqLcqV9fFRMEJnxqRsAt0kFMVqqFS"
    }"#;

    #[test]
    fn test_parse_event() {
        let event = parse(EVENT.as_bytes()).unwrap();
        assert!(!event.is_test_event());
        assert_eq!(event.records.len(), 1);

        let r = &event.records[0];
        assert_eq!(r.event_name, "ObjectCreated:Put");
        assert_eq!(r.event_source, "aws:s3");
        assert_eq!(r.aws_region, "ap-northeast-1");
        assert_eq!(r.s3.bucket.name, "test.bucket.test");
        assert_eq!(r.s3.object.key, "foo/bar=baz.json");
        assert_eq!(r.s3.object.size, 443);
        assert_eq!(r.s3.object.e_tag, "86fcdfb65af50a994cf63ddd280cea0d");
    }

    #[test]
    fn test_parse_test_event() {
        let event = parse(TEST_EVENT_BODY.as_bytes()).unwrap();
        assert!(event.is_test_event());
        assert!(event.records.is_empty());
        assert_eq!(event.to_string(), "s3:TestEvent for example-bucket");
    }

    #[test]
    fn test_parse_sns_envelope() {
        let envelope = serde_json::json!({
            "Type": "Notification",
            "TopicArn": "arn:aws:sns:ap-northeast-1:123456789012:rin",
            "Message": EVENT,
        });
        let body = serde_json::to_vec(&envelope).unwrap();

        let event = parse(&body).unwrap();
        assert_eq!(event.records.len(), 1);
        assert_eq!(event.records[0].s3.object.key, "foo/bar=baz.json");
    }

    #[test]
    fn test_parse_minimal_record() {
        let body = r#"{"Records":[{"eventName":"PutObject","s3":{"bucket":{"name":"rin-test"},"object":{"key":"test/foo/1"}}}]}"#;
        let event = parse(body.as_bytes()).unwrap();
        assert_eq!(event.records[0].s3.bucket.name, "rin-test");
        assert_eq!(event.records[0].s3.object.key, "test/foo/1");
        assert_eq!(event.to_string(), "PutObject s3://rin-test/test/foo/1");
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse(b"not json").unwrap_err();
        assert!(matches!(err, DecodeError::Envelope(_)));
    }

    #[test]
    fn test_parse_invalid_inner_message() {
        let body = r#"{"Message": "{broken"}"#;
        let err = parse(body.as_bytes()).unwrap_err();
        assert!(matches!(err, DecodeError::Notification(_)));
    }

    #[test]
    fn test_parse_wrong_records_shape() {
        let err = parse(br#"{"Records": "nope"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Notification(_)));
    }

    #[test]
    fn test_decode_key() {
        assert_eq!(decode_key("plain/key.json"), "plain/key.json");
        assert_eq!(decode_key("a+b/c.json"), "a+b/c.json");
        assert_eq!(decode_key("dir%2Fwith+space%21.csv"), "dir/with space!.csv");
        assert_eq!(decode_key("y%27s.csv"), "y's.csv");
    }

    #[test]
    fn test_decode_key_invalid_utf8_kept() {
        assert_eq!(decode_key("bad%FF%FE.json"), "bad%FF%FE.json");
    }

    #[test]
    fn test_decode_key_malformed_escape_kept() {
        assert_eq!(decode_key("a+b%zz%2F.json"), "a+b%zz%2F.json");
        assert_eq!(decode_key("trailing%2"), "trailing%2");
        assert_eq!(decode_key("trailing%"), "trailing%");
        assert_eq!(decode_key("ok%2f+x"), "ok/ x");
    }
}
