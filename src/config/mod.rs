//! Configuration loading
//!
//! The YAML file has global `redshift`, `s3` and `sql_option` blocks and a
//! list of `targets`. Each target inherits every field it leaves unset from
//! the global blocks; a target without a `redshift` or `s3` block takes the
//! global one as is. After merging, every target is resolved into a
//! [`Target`] with a compiled key matcher and a fully resolved [`Endpoint`].
//!
//! ```yaml
//! queue_name: rin_test
//! credentials:
//!   aws_access_key_id: AAA
//!   aws_secret_access_key: '{{ must_env "AWS_SECRET_ACCESS_KEY" }}'
//!   aws_region: ap-northeast-1
//! redshift:
//!   host: localhost
//!   dbname: test
//!   user: test_user
//!   password: test_pass
//! s3:
//!   bucket: test.bucket.test
//!   region: ap-northeast-1
//! sql_option: "JSON 'auto' GZIP"
//! targets:
//!   - redshift:
//!       table: foo
//!     s3:
//!       key_prefix: test/foo
//! ```

pub mod duration;
pub mod template;

use crate::error::ConfigError;
use crate::sql::CopyCredentials;
use crate::target::{Action, Destination, KeyMatcher, S3Source, Target};
use anyhow::Context;
use regex::Regex;
use rin_redshift::{Address, Driver, Endpoint, SslMode, DEFAULT_PORT};
use serde::Deserialize;
use std::fmt;

/// Whether rin is running inside AWS Lambda, where the queue is the event
/// source and `queue_name` is not needed.
pub fn is_lambda() -> bool {
    std::env::var("AWS_LAMBDA_FUNCTION_NAME").is_ok_and(|v| !v.is_empty())
        || std::env::var("AWS_EXECUTION_ENV").is_ok_and(|v| v.starts_with("AWS_Lambda"))
}

/// The `credentials` block.
///
/// Used both for rin's own AWS clients and for the COPY `CREDENTIALS` clause.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_region: Option<String>,
    pub aws_iam_role: Option<String>,
}

impl Credentials {
    pub fn copy_credentials(&self) -> CopyCredentials {
        CopyCredentials::new(
            self.aws_iam_role.as_deref(),
            self.aws_access_key_id.as_deref(),
            self.aws_secret_access_key.as_deref(),
        )
    }

    /// Static key pair, when both halves are configured
    pub fn access_key(&self) -> Option<(&str, &str)> {
        let id = non_empty(&self.aws_access_key_id)?;
        let secret = non_empty(&self.aws_secret_access_key)?;
        Some((id, secret))
    }

    pub fn region(&self) -> Option<&str> {
        non_empty(&self.aws_region)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("aws_access_key_id", &self.aws_access_key_id)
            .field(
                "aws_secret_access_key",
                &self.aws_secret_access_key.as_ref().map(|_| "****"),
            )
            .field("aws_region", &self.aws_region)
            .field("aws_iam_role", &self.aws_iam_role)
            .finish()
    }
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
struct RedshiftConfig {
    driver: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    cluster: Option<String>,
    workgroup: Option<String>,
    dbname: Option<String>,
    user: Option<String>,
    password: Option<String>,
    schema: Option<String>,
    table: Option<String>,
    reconnect_on_error: Option<bool>,
    sslmode: Option<SslMode>,
}

impl RedshiftConfig {
    fn merged(self, global: &RedshiftConfig) -> RedshiftConfig {
        RedshiftConfig {
            driver: pick(self.driver, &global.driver),
            host: pick(self.host, &global.host),
            port: self.port.filter(|p| *p != 0).or(global.port),
            cluster: pick(self.cluster, &global.cluster),
            workgroup: pick(self.workgroup, &global.workgroup),
            dbname: pick(self.dbname, &global.dbname),
            user: pick(self.user, &global.user),
            password: pick(self.password, &global.password),
            schema: pick(self.schema, &global.schema),
            table: pick(self.table, &global.table),
            reconnect_on_error: self.reconnect_on_error.or(global.reconnect_on_error),
            sslmode: self.sslmode.or(global.sslmode),
        }
    }

    fn driver(&self) -> Result<Driver, String> {
        match non_empty(&self.driver) {
            Some(driver) => driver.parse(),
            None => Ok(Driver::default()),
        }
    }

    fn endpoint(&self) -> Result<Endpoint, String> {
        let driver = self.driver()?;
        let address = match driver {
            Driver::Postgres => {
                let host = non_empty(&self.host)
                    .ok_or_else(|| "redshift.host is required for the postgres driver".to_string())?;
                Address::Host {
                    host: host.to_string(),
                    port: self.port.filter(|p| *p != 0).unwrap_or(DEFAULT_PORT),
                }
            }
            Driver::RedshiftData => {
                if let Some(workgroup) = non_empty(&self.workgroup) {
                    Address::Workgroup(workgroup.to_string())
                } else if let Some(cluster) = non_empty(&self.cluster) {
                    Address::Cluster(cluster.to_string())
                } else {
                    return Err(
                        "redshift.workgroup or redshift.cluster is required for the redshift-data driver"
                            .to_string(),
                    );
                }
            }
        };
        Ok(Endpoint {
            driver,
            address,
            dbname: self.dbname.clone().unwrap_or_default(),
            user: self.user.clone().unwrap_or_default(),
            password: non_empty(&self.password).map(str::to_string),
            sslmode: self.sslmode.unwrap_or_default(),
            reconnect_on_error: self.reconnect_on_error.unwrap_or(false),
        })
    }
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
struct S3Config {
    bucket: Option<String>,
    region: Option<String>,
    key_prefix: Option<String>,
    key_regexp: Option<String>,
}

impl S3Config {
    fn merged(self, global: &S3Config) -> S3Config {
        S3Config {
            bucket: pick(self.bucket, &global.bucket),
            region: pick(self.region, &global.region),
            key_prefix: pick(self.key_prefix, &global.key_prefix),
            key_regexp: pick(self.key_regexp, &global.key_regexp),
        }
    }

    fn matcher(&self, index: usize) -> Result<KeyMatcher, ConfigError> {
        if let Some(prefix) = non_empty(&self.key_prefix) {
            return Ok(KeyMatcher::Prefix(prefix.to_string()));
        }
        let pattern = non_empty(&self.key_regexp).ok_or(ConfigError::NoKeyMatcher { index })?;
        let regex = Regex::new(pattern).map_err(|source| ConfigError::InvalidRegexp {
            index,
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(KeyMatcher::Regex(regex))
    }
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
struct TargetConfig {
    redshift: Option<RedshiftConfig>,
    s3: Option<S3Config>,
    sql_option: Option<String>,
    #[serde(rename = "break")]
    break_after: bool,
    discard: bool,
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    queue_name: Option<String>,
    credentials: Credentials,
    redshift: RedshiftConfig,
    s3: S3Config,
    sql_option: Option<String>,
    targets: Vec<TargetConfig>,
}

/// Loaded and validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub queue_name: Option<String>,
    pub credentials: Credentials,
    pub copy_credentials: CopyCredentials,
    pub targets: Vec<Target>,
}

impl Config {
    /// Fetch, expand, parse and validate the configuration at `path`
    /// (local path, `file://`, `s3://` or `http(s)://`).
    pub async fn load(path: &str) -> anyhow::Result<Self> {
        let src = rin_file::fetch(path).await?;
        let src = String::from_utf8(src).with_context(|| format!("{path} is not UTF-8"))?;
        Ok(Self::from_yaml(&src, is_lambda())?)
    }

    /// Parse configuration text. `lambda` relaxes the `queue_name` requirement.
    pub fn from_yaml(src: &str, lambda: bool) -> Result<Self, ConfigError> {
        let expanded = template::expand(src).map_err(ConfigError::Template)?;
        let raw: RawConfig = serde_yaml::from_str(&expanded)?;
        Self::resolve(raw, lambda)
    }

    fn resolve(raw: RawConfig, lambda: bool) -> Result<Self, ConfigError> {
        let global_driver = raw.redshift.driver().map_err(ConfigError::InvalidDriver)?;
        tracing::debug!("redshift.driver is {global_driver}");

        let queue_name = non_empty(&raw.queue_name).map(str::to_string);
        if queue_name.is_none() && !lambda {
            return Err(ConfigError::MissingQueueName);
        }
        if raw.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }

        let mut targets = Vec::with_capacity(raw.targets.len());
        for (index, target) in raw.targets.into_iter().enumerate() {
            let redshift = target.redshift.unwrap_or_default().merged(&raw.redshift);
            let s3 = target.s3.unwrap_or_default().merged(&raw.s3);
            let sql_option = pick(target.sql_option, &raw.sql_option).unwrap_or_default();

            let matcher = s3.matcher(index)?;
            let source = S3Source {
                bucket: s3.bucket.unwrap_or_default(),
                region: s3.region.unwrap_or_default(),
                matcher,
            };

            let action = if target.discard {
                Action::Discard
            } else {
                let endpoint = redshift
                    .endpoint()
                    .map_err(|message| ConfigError::InvalidEndpoint { index, message })?;
                let table = non_empty(&redshift.table)
                    .ok_or(ConfigError::MissingTable { index })?
                    .to_string();
                Action::Load(Destination {
                    endpoint,
                    schema: redshift.schema.unwrap_or_default(),
                    table,
                })
            };

            targets.push(Target {
                source,
                action,
                sql_option,
                break_after: target.break_after,
            });
        }

        Ok(Config {
            queue_name,
            copy_credentials: raw.credentials.copy_credentials(),
            credentials: raw.credentials,
            targets,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Own value unless unset or empty, then the global one.
fn pick(own: Option<String>, global: &Option<String>) -> Option<String> {
    own.filter(|s| !s.is_empty())
        .or_else(|| non_empty(global).map(str::to_string))
}
