//! Redshift access for rin
//!
//! This crate owns everything between a finished `COPY` statement and the
//! warehouse:
//!
//! - [`Endpoint`] - a resolved connection target and its pool identity
//! - [`ConnectionPool`] - one live connection per endpoint identity, with
//!   liveness checks, temporary credential rotation and forced reconnects
//! - [`execute`] - runs a statement with or without a transaction depending on
//!   the endpoint's [`AccessMode`]
//!
//! Two drivers are supported:
//!
//! - `postgres` - the PostgreSQL wire protocol against a provisioned cluster
//!   (`tokio-postgres`). Transactional. Uses either a static password or
//!   temporary credentials from `GetClusterCredentials`.
//! - `redshift-data` - the Redshift Data API, for provisioned clusters or
//!   serverless workgroups. Stateless HTTP, so no transactions; authentication
//!   is done by the API through IAM.

pub mod connection;
pub mod credentials;
mod data_api;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod pool;
mod postgres;

pub use connection::{Connection, Connector, Login, RedshiftConnector};
pub use credentials::{ClusterCredentials, CredentialSource, TemporaryCredentials};
pub use endpoint::{AccessMode, Address, CredentialStrategy, Driver, Endpoint, SslMode, DEFAULT_PORT};
pub use error::{LoadError, Result};
pub use executor::execute;
pub use pool::{ConnectionPool, Verdict};
