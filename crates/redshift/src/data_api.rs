//! `redshift-data` driver: statements through the Redshift Data API
//!
//! Each statement is submitted with `ExecuteStatement` and then polled with
//! `DescribeStatement` until it finishes. There is no session to keep alive,
//! so the "connection" only carries the client and the statement target.

use crate::connection::{Connection, Login};
use crate::endpoint::{Address, Endpoint};
use crate::error::{LoadError, Result};
use async_trait::async_trait;
use aws_sdk_redshiftdata::error::DisplayErrorContext;
use aws_sdk_redshiftdata::types::StatusString;
use std::time::Duration;
use tracing::debug;

const POLL_INTERVAL_MIN: Duration = Duration::from_millis(200);
const POLL_INTERVAL_MAX: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
enum Target {
    Cluster { identifier: String, db_user: String },
    Workgroup(String),
}

pub(crate) struct DataApiConnection {
    client: aws_sdk_redshiftdata::Client,
    target: Target,
    database: String,
}

impl DataApiConnection {
    pub(crate) fn new(
        client: aws_sdk_redshiftdata::Client,
        endpoint: &Endpoint,
        login: &Login,
    ) -> Result<Self> {
        let target = match &endpoint.address {
            Address::Workgroup(workgroup) => Target::Workgroup(workgroup.clone()),
            Address::Cluster(identifier) => Target::Cluster {
                identifier: identifier.clone(),
                db_user: login.user.clone(),
            },
            Address::Host { .. } => {
                return Err(LoadError::Connect(
                    "redshift-data driver requires workgroup or cluster".to_string(),
                ))
            }
        };
        Ok(Self {
            client,
            target,
            database: endpoint.dbname.clone(),
        })
    }

    async fn wait(&self, id: &str) -> Result<()> {
        let mut interval = POLL_INTERVAL_MIN;
        loop {
            tokio::time::sleep(interval).await;

            let output = self
                .client
                .describe_statement()
                .id(id)
                .send()
                .await
                .map_err(|e| LoadError::Statement(DisplayErrorContext(&e).to_string()))?;

            match output.status() {
                Some(StatusString::Finished) => return Ok(()),
                Some(StatusString::Failed) => {
                    let message = output.error().unwrap_or("unknown error");
                    return Err(LoadError::Statement(format!("statement {id} failed: {message}")));
                }
                Some(StatusString::Aborted) => {
                    return Err(LoadError::Statement(format!("statement {id} was aborted")))
                }
                status => debug!("Statement {id} is {status:?}"),
            }

            interval = (interval * 2).min(POLL_INTERVAL_MAX);
        }
    }
}

#[async_trait]
impl Connection for DataApiConnection {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn begin(&self) -> Result<()> {
        Err(LoadError::Unsupported("transaction"))
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        let mut request = self
            .client
            .execute_statement()
            .sql(sql)
            .database(&self.database);
        request = match &self.target {
            Target::Cluster {
                identifier,
                db_user,
            } => request.cluster_identifier(identifier).db_user(db_user),
            Target::Workgroup(workgroup) => request.workgroup_name(workgroup),
        };

        let output = request
            .send()
            .await
            .map_err(|e| LoadError::Statement(DisplayErrorContext(&e).to_string()))?;
        let id = output
            .id()
            .ok_or_else(|| LoadError::Statement("no statement id returned".to_string()))?;

        debug!("Submitted statement {id}");
        self.wait(id).await
    }

    async fn commit(&self) -> Result<()> {
        Err(LoadError::Unsupported("transaction"))
    }

    async fn rollback(&self) -> Result<()> {
        Err(LoadError::Unsupported("transaction"))
    }

    fn close(&self) {}
}
