//! Temporary database credentials

use crate::error::{LoadError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::info;

/// Short-lived login returned by the control plane.
#[derive(Clone)]
pub struct TemporaryCredentials {
    pub user: String,
    pub password: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for TemporaryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporaryCredentials")
            .field("user", &self.user)
            .field("password", &"****")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of temporary cluster credentials.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn cluster_credentials(
        &self,
        cluster_identifier: &str,
        db_user: &str,
    ) -> Result<TemporaryCredentials>;
}

/// [`CredentialSource`] backed by the Redshift `GetClusterCredentials` API.
pub struct ClusterCredentials {
    client: aws_sdk_redshift::Client,
}

impl ClusterCredentials {
    pub fn new(client: aws_sdk_redshift::Client) -> Self {
        Self { client }
    }

    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig) -> Self {
        Self::new(aws_sdk_redshift::Client::new(sdk_config))
    }
}

#[async_trait]
impl CredentialSource for ClusterCredentials {
    async fn cluster_credentials(
        &self,
        cluster_identifier: &str,
        db_user: &str,
    ) -> Result<TemporaryCredentials> {
        info!("Getting cluster credentials for {cluster_identifier} user {db_user}");

        let output = self
            .client
            .get_cluster_credentials()
            .cluster_identifier(cluster_identifier)
            .db_user(db_user)
            .send()
            .await
            .map_err(|e| {
                LoadError::Credentials(
                    aws_sdk_redshift::error::DisplayErrorContext(&e).to_string(),
                )
            })?;

        let user = output
            .db_user()
            .ok_or_else(|| LoadError::Credentials("no DbUser in response".to_string()))?;
        let password = output
            .db_password()
            .ok_or_else(|| LoadError::Credentials("no DbPassword in response".to_string()))?;
        let expires_at = output
            .expiration()
            .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()));

        Ok(TemporaryCredentials {
            user: user.to_string(),
            password: password.to_string(),
            expires_at,
        })
    }
}
