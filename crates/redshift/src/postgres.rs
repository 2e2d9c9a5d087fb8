//! `postgres` driver: Redshift over the PostgreSQL wire protocol

use crate::connection::{Connection, Login};
use crate::endpoint::{Address, Endpoint, SslMode};
use crate::error::{LoadError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error};

pub(crate) struct PgConnection {
    client: Client,
    handle: JoinHandle<()>,
}

/// Open a connection to a provisioned cluster with the given login.
pub(crate) async fn connect(endpoint: &Endpoint, login: &Login) -> Result<PgConnection> {
    let config = pg_config(endpoint, login)?;

    let (client, handle) = match endpoint.sslmode {
        SslMode::Disable => {
            let (client, connection) = config
                .connect(NoTls)
                .await
                .map_err(|e| LoadError::Connect(e.to_string()))?;
            let handle = tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!("Redshift connection error: {e}");
                }
            });
            (client, handle)
        }
        SslMode::Prefer | SslMode::Require => {
            let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config()?);
            let (client, connection) = config
                .connect(tls)
                .await
                .map_err(|e| LoadError::Connect(e.to_string()))?;
            let handle = tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!("Redshift connection error: {e}");
                }
            });
            (client, handle)
        }
    };

    debug!("Connected to {}", endpoint.visible_dsn());
    Ok(PgConnection { client, handle })
}

fn pg_config(endpoint: &Endpoint, login: &Login) -> Result<tokio_postgres::Config> {
    let Address::Host { host, port } = &endpoint.address else {
        return Err(LoadError::Connect(format!(
            "postgres driver requires host: {}",
            endpoint.visible_dsn()
        )));
    };

    let mut config = tokio_postgres::Config::new();
    config
        .host(host)
        .port(*port)
        .dbname(&endpoint.dbname)
        .user(&login.user)
        .application_name("rin")
        .ssl_mode(match endpoint.sslmode {
            SslMode::Disable => tokio_postgres::config::SslMode::Disable,
            SslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
            SslMode::Require => tokio_postgres::config::SslMode::Require,
        });
    if let Some(password) = &login.password {
        config.password(password);
    }
    Ok(config)
}

fn tls_config() -> Result<rustls::ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| LoadError::Connect(format!("Invalid TLS configuration: {e}")))?
        .with_root_certificates(root_store)
        .with_no_client_auth();
    Ok(config)
}

#[async_trait]
impl Connection for PgConnection {
    async fn ping(&self) -> Result<()> {
        if self.client.is_closed() {
            return Err(LoadError::Connect("connection is closed".to_string()));
        }
        self.client
            .simple_query("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| LoadError::Connect(e.to_string()))
    }

    async fn begin(&self) -> Result<()> {
        self.client
            .batch_execute("BEGIN")
            .await
            .map_err(|e| LoadError::Begin(e.to_string()))
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        let statement = self
            .client
            .prepare(sql)
            .await
            .map_err(|e| LoadError::Statement(e.to_string()))?;
        self.client
            .execute(&statement, &[])
            .await
            .map(|_| ())
            .map_err(|e| LoadError::Statement(e.to_string()))
    }

    async fn commit(&self) -> Result<()> {
        self.client
            .batch_execute("COMMIT")
            .await
            .map_err(|e| LoadError::Commit(e.to_string()))
    }

    async fn rollback(&self) -> Result<()> {
        self.client
            .batch_execute("ROLLBACK")
            .await
            .map_err(|e| LoadError::Rollback(e.to_string()))
    }

    fn close(&self) {
        self.handle.abort();
    }
}
