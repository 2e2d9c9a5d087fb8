//! Connection pool keyed by endpoint identity
//!
//! The pool holds at most one connection per [`Endpoint::identity`]. The map
//! is guarded by a single mutex that is only held for bookkeeping; liveness
//! probes, credential requests and dials all run with the lock released.

use crate::connection::{Connection, Connector, Login};
use crate::credentials::CredentialSource;
use crate::endpoint::{CredentialStrategy, Endpoint};
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Temporary credentials this close to expiry are renewed before reuse.
const RENEW_MARGIN: chrono::Duration = chrono::Duration::seconds(60);

/// Outcome of checking a pooled connection before reuse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Reuse as is
    Alive,
    /// The temporary credentials behind it are expiring: reconnect with fresh ones
    Renew,
    /// The liveness probe failed: reconnect
    Dead,
}

#[derive(Clone)]
struct PoolEntry {
    connection: Arc<dyn Connection>,
    expires_at: Option<DateTime<Utc>>,
}

pub struct ConnectionPool {
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialSource>,
    entries: Mutex<HashMap<String, PoolEntry>>,
}

impl ConnectionPool {
    pub fn new(connector: Arc<dyn Connector>, credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            connector,
            credentials,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get a live connection for the endpoint, reusing the pooled one when it
    /// is still usable.
    pub async fn acquire(&self, endpoint: &Endpoint) -> Result<Arc<dyn Connection>> {
        let identity = endpoint.identity();

        let pooled = self.entries.lock().await.get(&identity).cloned();
        if let Some(entry) = pooled {
            match Self::inspect(&entry).await {
                Verdict::Alive => return Ok(entry.connection),
                Verdict::Renew => {
                    info!(
                        "Credentials for {} are expiring, renewing",
                        endpoint.visible_dsn()
                    )
                }
                Verdict::Dead => {
                    warn!(
                        "Pooled connection to {} is dead, reconnecting",
                        endpoint.visible_dsn()
                    )
                }
            }
            self.evict(&identity, &entry).await;
        }

        info!("Connect to Redshift {}", endpoint.visible_dsn());
        let (login, expires_at) = self.login(endpoint).await?;
        let connection = self.connector.connect(endpoint, &login).await?;

        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.get(&identity) {
            // Another caller connected while the lock was released
            let existing = Arc::clone(&existing.connection);
            drop(entries);
            connection.close();
            return Ok(existing);
        }
        entries.insert(
            identity,
            PoolEntry {
                connection: Arc::clone(&connection),
                expires_at,
            },
        );
        Ok(connection)
    }

    /// Close and forget the pooled connection for the endpoint, if any.
    pub async fn force_reconnect(&self, endpoint: &Endpoint) {
        info!("Disconnect to Redshift {}", endpoint.visible_dsn());
        let removed = self.entries.lock().await.remove(&endpoint.identity());
        if let Some(entry) = removed {
            entry.connection.close();
        }
    }

    /// Close every pooled connection.
    pub async fn close_all(&self) {
        let entries: Vec<PoolEntry> = self.entries.lock().await.drain().map(|(_, e)| e).collect();
        for entry in entries {
            entry.connection.close();
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn inspect(entry: &PoolEntry) -> Verdict {
        if let Some(expires_at) = entry.expires_at {
            if Utc::now() + RENEW_MARGIN >= expires_at {
                return Verdict::Renew;
            }
        }
        match entry.connection.ping().await {
            Ok(()) => Verdict::Alive,
            Err(e) => {
                warn!("Ping failed: {e}");
                Verdict::Dead
            }
        }
    }

    async fn evict(&self, identity: &str, entry: &PoolEntry) {
        let mut entries = self.entries.lock().await;
        let same = entries
            .get(identity)
            .is_some_and(|current| Arc::ptr_eq(&current.connection, &entry.connection));
        if same {
            entries.remove(identity);
        }
        drop(entries);
        entry.connection.close();
    }

    async fn login(&self, endpoint: &Endpoint) -> Result<(Login, Option<DateTime<Utc>>)> {
        match endpoint.credential_strategy() {
            CredentialStrategy::ClusterCredentials { cluster_identifier } => {
                let credentials = self
                    .credentials
                    .cluster_credentials(&cluster_identifier, &endpoint.user)
                    .await?;
                tracing::debug!("Got temporary user {}", credentials.user);
                Ok((
                    Login {
                        user: credentials.user,
                        password: Some(credentials.password),
                    },
                    credentials.expires_at,
                ))
            }
            CredentialStrategy::Static | CredentialStrategy::Iam => Ok((
                Login {
                    user: endpoint.user.clone(),
                    password: endpoint.password.clone(),
                },
                None,
            )),
        }
    }
}
