//! S3 notification types
//!
//! Only the fields rin routes on are modelled; everything else in the
//! notification is ignored during deserialization.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value of the `Event` field in the notification S3 sends when a bucket
/// notification is configured.
pub const TEST_EVENT: &str = "s3:TestEvent";

/// A batch of S3 notification records, or a test event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,

    /// Only set on test events
    #[serde(rename = "Event", default)]
    pub event: String,

    /// Only set on test events
    #[serde(rename = "Bucket", default)]
    pub bucket: String,
}

impl Event {
    pub fn is_test_event(&self) -> bool {
        self.event == TEST_EVENT
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_test_event() {
            return write!(f, "{} for {}", self.event, self.bucket);
        }
        let records: Vec<String> = self.records.iter().map(ToString::to_string).collect();
        write!(f, "{}", records.join(", "))
    }
}

/// One object notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventRecord {
    pub event_version: String,
    pub event_name: String,
    pub event_source: String,
    pub event_time: String,
    pub aws_region: String,
    pub s3: S3Entity,
}

impl EventRecord {
    pub fn bucket(&self) -> &str {
        &self.s3.bucket.name
    }

    pub fn key(&self) -> &str {
        &self.s3.object.key
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.event_name,
            crate::s3_uri(self.bucket(), self.key())
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct S3Entity {
    pub s3_schema_version: String,
    pub configuration_id: String,
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Bucket {
    pub name: String,
    pub arn: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Object {
    pub key: String,
    pub size: i64,
    #[serde(rename = "eTag")]
    pub e_tag: String,
}
