//! Statement execution strategies

use crate::connection::Connection;
use crate::endpoint::AccessMode;
use crate::error::Result;
use tracing::{debug, warn};

/// Run `sql` on the connection.
///
/// In [`AccessMode::Transactional`] the statement is wrapped in a transaction
/// that is rolled back on failure. A rollback error is only logged; the error
/// that caused it is the one returned.
pub async fn execute(connection: &dyn Connection, mode: AccessMode, sql: &str) -> Result<()> {
    debug!("SQL: {sql}");
    match mode {
        AccessMode::NonTransactional => connection.execute(sql).await,
        AccessMode::Transactional => {
            connection.begin().await?;
            let result = match connection.execute(sql).await {
                Ok(()) => connection.commit().await,
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                if let Err(rollback) = connection.rollback().await {
                    warn!("Rollback failed after {e}: {rollback}");
                }
            }
            result
        }
    }
}
