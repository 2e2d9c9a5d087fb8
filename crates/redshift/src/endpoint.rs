//! Redshift endpoint descriptors
//!
//! An [`Endpoint`] is fully resolved at configuration load: the driver decides
//! the [`AccessMode`], and the driver plus the presence of a static password
//! decide the [`CredentialStrategy`]. Nothing is inspected again at load time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default port of a provisioned Redshift cluster.
pub const DEFAULT_PORT: u16 = 5439;

/// How rin talks to Redshift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Driver {
    /// PostgreSQL wire protocol
    #[default]
    Postgres,
    /// Redshift Data API
    RedshiftData,
}

impl Driver {
    pub fn access_mode(&self) -> AccessMode {
        match self {
            Driver::Postgres => AccessMode::Transactional,
            // The Data API has no transaction concept for single statements
            Driver::RedshiftData => AccessMode::NonTransactional,
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Driver::Postgres => write!(f, "postgres"),
            Driver::RedshiftData => write!(f, "redshift-data"),
        }
    }
}

impl std::str::FromStr for Driver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(Driver::Postgres),
            "redshift-data" => Ok(Driver::RedshiftData),
            _ => Err(format!(
                "invalid redshift.driver {s:?}, must be postgres or redshift-data"
            )),
        }
    }
}

/// TLS mode for the `postgres` driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    Disable,
    #[default]
    Prefer,
    Require,
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SslMode::Disable => write!(f, "disable"),
            SslMode::Prefer => write!(f, "prefer"),
            SslMode::Require => write!(f, "require"),
        }
    }
}

/// Execution strategy for a load statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// BEGIN, execute, COMMIT; ROLLBACK on failure
    Transactional,
    /// Execute the statement on its own
    NonTransactional,
}

/// Where the warehouse lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// Cluster endpoint for the `postgres` driver
    Host { host: String, port: u16 },
    /// Provisioned cluster identifier for the `redshift-data` driver
    Cluster(String),
    /// Serverless workgroup for the `redshift-data` driver
    Workgroup(String),
}

/// How the login for a new connection is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialStrategy {
    /// Configured user and password
    Static,
    /// Temporary user and password from `GetClusterCredentials`
    ClusterCredentials { cluster_identifier: String },
    /// The driver authenticates through IAM itself
    Iam,
}

/// A resolved Redshift connection target.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub driver: Driver,
    pub address: Address,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    pub sslmode: SslMode,
    pub reconnect_on_error: bool,
}

impl Endpoint {
    pub fn access_mode(&self) -> AccessMode {
        self.driver.access_mode()
    }

    pub fn credential_strategy(&self) -> CredentialStrategy {
        match (&self.driver, &self.address, &self.password) {
            (Driver::RedshiftData, _, _) => CredentialStrategy::Iam,
            (Driver::Postgres, _, Some(_)) => CredentialStrategy::Static,
            (Driver::Postgres, Address::Host { host, .. }, None) => {
                CredentialStrategy::ClusterCredentials {
                    cluster_identifier: host.split('.').next().unwrap_or(host).to_string(),
                }
            }
            (Driver::Postgres, Address::Cluster(id), None) => {
                CredentialStrategy::ClusterCredentials {
                    cluster_identifier: id.clone(),
                }
            }
            (Driver::Postgres, Address::Workgroup(_), None) => CredentialStrategy::Static,
        }
    }

    /// Pool key for this endpoint.
    ///
    /// Built from the configured login only, so rotating temporary passwords
    /// keeps mapping to the same pooled connection.
    pub fn identity(&self) -> String {
        let dsn = self.dsn_with(&self.user, self.password.as_deref().unwrap_or(""));
        match self.address {
            Address::Host { .. } => format!("{dsn}?sslmode={}", self.sslmode),
            Address::Cluster(_) | Address::Workgroup(_) => dsn,
        }
    }

    /// Connection string for the given login.
    pub fn dsn_with(&self, user: &str, password: &str) -> String {
        let escape = |s: &str| urlencoding::encode(s).into_owned();
        match &self.address {
            Address::Host { host, port } => {
                let password = if password.is_empty() {
                    "****".to_string()
                } else {
                    escape(password)
                };
                format!(
                    "postgres://{}:{}@{}:{}/{}",
                    escape(user),
                    password,
                    escape(host),
                    port,
                    escape(&self.dbname)
                )
            }
            Address::Workgroup(workgroup) => {
                format!("workgroup({})/{}", escape(workgroup), escape(&self.dbname))
            }
            Address::Cluster(cluster) => format!(
                "{}@cluster({})/{}",
                escape(user),
                escape(cluster),
                escape(&self.dbname)
            ),
        }
    }

    /// Connection string safe for logs: never contains a password.
    pub fn visible_dsn(&self) -> String {
        match self.driver {
            Driver::Postgres => self
                .dsn_with(&self.user, "")
                .replacen("postgres://", "redshift://", 1),
            Driver::RedshiftData => format!("{}://{}", self.driver, self.dsn_with(&self.user, "")),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.visible_dsn())
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("driver", &self.driver)
            .field("address", &self.address)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("sslmode", &self.sslmode)
            .field("reconnect_on_error", &self.reconnect_on_error)
            .finish()
    }
}
