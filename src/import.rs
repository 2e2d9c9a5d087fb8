//! Routing of notification records to targets
//!
//! For each record, targets are walked in configuration order. Every target
//! that matches fires: a discard target just counts the record as handled, a
//! load target runs its COPY. A firing target with `break` set ends the walk
//! for that record. The first failed load aborts the whole message.

use crate::error::{ImportError, ProcessError};
use crate::target::{Destination, Target};
use crate::Rin;
use rin_event::{Event, EventRecord};
use rin_redshift::{Endpoint, LoadError};
use tracing::{debug, info, warn};

/// Result of processing one message body.
#[derive(Debug, Clone, PartialEq)]
pub enum Processed {
    /// `s3:TestEvent`: nothing to load
    TestEvent(Event),
    /// Number of target actions completed
    Imported(usize),
}

/// Parse a message body and import every record in it.
pub async fn process(rin: &Rin, body: &str) -> Result<Processed, ProcessError> {
    let event = rin_event::parse(body.as_bytes())?;
    if event.is_test_event() {
        return Ok(Processed::TestEvent(event));
    }
    info!("Importing event: {event}");
    let handled = import(rin, &event).await?;
    Ok(Processed::Imported(handled))
}

/// Import every record of the event. Returns the number of target actions
/// completed, discards included.
pub async fn import(rin: &Rin, event: &Event) -> Result<usize, ImportError> {
    let mut handled = 0;
    for record in &event.records {
        let n = import_record(rin, record).await?;
        if n == 0 {
            debug!("{record} matched no target");
        }
        handled += n;
    }
    Ok(handled)
}

async fn import_record(rin: &Rin, record: &EventRecord) -> Result<usize, ImportError> {
    let mut handled = 0;
    for target in &rin.config().targets {
        let Some(captures) = target.matches_record(record) else {
            continue;
        };
        match target.destination() {
            None => info!("Discard {record}"),
            Some(destination) => {
                let sql =
                    target.build_copy_sql(record.key(), &rin.config().copy_credentials, &captures)?;
                load(rin, target, destination, &sql).await?;
            }
        }
        handled += 1;
        if target.break_after {
            debug!("Break after {target}");
            break;
        }
    }
    Ok(handled)
}

async fn load(
    rin: &Rin,
    target: &Target,
    destination: &Destination,
    sql: &str,
) -> Result<(), ImportError> {
    let endpoint = &destination.endpoint;
    info!("Import to target {target}");

    match execute(rin, endpoint, sql).await {
        Ok(()) => {
            info!("Import completed");
            Ok(())
        }
        Err(source) => {
            warn!("Import failed: {source}");
            if endpoint.reconnect_on_error {
                rin.pool().force_reconnect(endpoint).await;
            }
            Err(ImportError::Load {
                endpoint: endpoint.visible_dsn(),
                source,
            })
        }
    }
}

async fn execute(rin: &Rin, endpoint: &Endpoint, sql: &str) -> Result<(), LoadError> {
    let connection = rin.pool().acquire(endpoint).await?;
    rin_redshift::execute(connection.as_ref(), endpoint.access_mode(), sql).await
}
