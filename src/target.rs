//! Routing targets
//!
//! A [`Target`] is one entry of the `targets` list after merging with the
//! global `redshift`/`s3`/`sql_option` blocks. Targets are built once when the
//! configuration is loaded and are read-only afterwards.

use crate::error::ImportError;
use crate::sql::{copy_statement, CopyCredentials, TableName};
use regex::Regex;
use rin_event::EventRecord;
use rin_redshift::Endpoint;
use std::fmt;
use std::sync::LazyLock;

/// Strings captured by a key matcher. Index 0 is the whole match.
pub type Captures = Vec<String>;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\d+)").expect("Invalid placeholder pattern"));

/// How object keys are matched.
#[derive(Debug, Clone)]
pub enum KeyMatcher {
    /// Key starts with the prefix. Captures the whole key.
    Prefix(String),
    /// Key contains a match. Captures the whole match and every group;
    /// groups that did not participate capture an empty string.
    Regex(Regex),
}

impl KeyMatcher {
    pub fn captures(&self, key: &str) -> Option<Captures> {
        match self {
            KeyMatcher::Prefix(prefix) => key.starts_with(prefix.as_str()).then(|| vec![key.to_string()]),
            KeyMatcher::Regex(regex) => regex.captures(key).map(|caps| {
                caps.iter()
                    .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect()
            }),
        }
    }
}

impl fmt::Display for KeyMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMatcher::Prefix(prefix) => write!(f, "{prefix}"),
            KeyMatcher::Regex(regex) => write!(f, "{}", regex.as_str()),
        }
    }
}

/// Replace `$N` with `captures[N]`.
///
/// Digits are read greedily, so `$10` is index 10. Indices without a capture
/// are left as they are.
pub fn expand_placeholders(template: &str, captures: &[String]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| captures.get(i))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Objects a target applies to.
#[derive(Debug, Clone)]
pub struct S3Source {
    pub bucket: String,
    pub region: String,
    pub matcher: KeyMatcher,
}

impl fmt::Display for S3Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", rin_event::s3_uri(&self.bucket, &self.matcher.to_string()))
    }
}

/// Table a target loads into. Schema and table may contain placeholders.
#[derive(Debug, Clone)]
pub struct Destination {
    pub endpoint: Endpoint,
    pub schema: String,
    pub table: String,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let schema = if self.schema.is_empty() {
            "public"
        } else {
            &self.schema
        };
        write!(f, "{}/{}.{}", self.endpoint.visible_dsn(), schema, self.table)
    }
}

/// What a target does with a matching object.
#[derive(Debug, Clone)]
pub enum Action {
    Load(Destination),
    /// Accept the object without loading it
    Discard,
}

#[derive(Debug, Clone)]
pub struct Target {
    pub source: S3Source,
    pub action: Action,
    /// Appended verbatim to the COPY statement
    pub sql_option: String,
    /// Stop evaluating later targets once this one fires
    pub break_after: bool,
}

impl Target {
    pub fn matches(&self, bucket: &str, key: &str) -> Option<Captures> {
        if bucket != self.source.bucket {
            return None;
        }
        self.source.matcher.captures(key)
    }

    pub fn matches_record(&self, record: &EventRecord) -> Option<Captures> {
        self.matches(record.bucket(), record.key())
    }

    pub fn is_discard(&self) -> bool {
        matches!(self.action, Action::Discard)
    }

    pub fn destination(&self) -> Option<&Destination> {
        match &self.action {
            Action::Load(destination) => Some(destination),
            Action::Discard => None,
        }
    }

    /// Build the COPY statement loading `key` into this target's table.
    pub fn build_copy_sql(
        &self,
        key: &str,
        credentials: &CopyCredentials,
        captures: &[String],
    ) -> Result<String, ImportError> {
        let destination = self.destination().ok_or_else(|| ImportError::NoDestination {
            target: self.to_string(),
        })?;

        let schema = expand_placeholders(&destination.schema, captures);
        let table = expand_placeholders(&destination.table, captures);
        let table_name = TableName {
            schema: Some(schema.as_str()).filter(|s| !s.is_empty()),
            table: &table,
        };

        Ok(copy_statement(
            &table_name,
            &rin_event::s3_uri(&self.source.bucket, key),
            credentials,
            &self.source.region,
            &self.sql_option,
        ))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            Action::Load(destination) => write!(f, "{} => {}", self.source, destination)?,
            Action::Discard => write!(f, "{} => Discard", self.source)?,
        }
        if self.break_after {
            write!(f, " => Break")?;
        }
        Ok(())
    }
}
