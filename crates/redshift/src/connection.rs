//! Connection abstraction over the two Redshift drivers

use crate::data_api::DataApiConnection;
use crate::endpoint::{Driver, Endpoint};
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// User and password used to open a connection.
#[derive(Clone, PartialEq, Eq)]
pub struct Login {
    pub user: String,
    pub password: Option<String>,
}

impl fmt::Debug for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Login")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .finish()
    }
}

/// A live handle to Redshift.
///
/// Transaction control is exposed as separate steps so the executor can
/// decide the strategy; drivers without transactions return
/// [`LoadError::Unsupported`](crate::LoadError::Unsupported).
#[async_trait]
pub trait Connection: Send + Sync {
    /// Cheap liveness probe
    async fn ping(&self) -> Result<()>;

    async fn begin(&self) -> Result<()>;

    /// Prepare and execute a single statement
    async fn execute(&self, sql: &str) -> Result<()>;

    async fn commit(&self) -> Result<()>;

    async fn rollback(&self) -> Result<()>;

    /// Release the underlying resources. The handle must not be used afterwards.
    fn close(&self);
}

/// Opens connections for an endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint, login: &Login) -> Result<Arc<dyn Connection>>;
}

/// Connector dispatching on [`Driver`].
pub struct RedshiftConnector {
    data_api: aws_sdk_redshiftdata::Client,
}

impl RedshiftConnector {
    pub fn new(data_api: aws_sdk_redshiftdata::Client) -> Self {
        Self { data_api }
    }

    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig) -> Self {
        Self::new(aws_sdk_redshiftdata::Client::new(sdk_config))
    }
}

#[async_trait]
impl Connector for RedshiftConnector {
    async fn connect(&self, endpoint: &Endpoint, login: &Login) -> Result<Arc<dyn Connection>> {
        match endpoint.driver {
            Driver::Postgres => {
                let connection = crate::postgres::connect(endpoint, login).await?;
                Ok(Arc::new(connection))
            }
            Driver::RedshiftData => {
                let connection = DataApiConnection::new(self.data_api.clone(), endpoint, login)?;
                Ok(Arc::new(connection))
            }
        }
    }
}
