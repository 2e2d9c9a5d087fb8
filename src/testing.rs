//! In-memory stand-ins for SQS and Redshift
//!
//! These let the consumer loop, the importer and the Lambda handler run in
//! tests without AWS. All of them are cheap to clone-share through `Arc` and
//! expose what happened to them for assertions.

use async_trait::async_trait;
use rin_redshift::{
    Connection, Connector, CredentialSource, Endpoint, LoadError, Login, TemporaryCredentials,
};
use rin_sqs::{Queue, QueueError, QueueMessage};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Take one from a "fail the next n calls" counter.
fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// FIFO queue held in memory.
#[derive(Default)]
pub struct MemoryQueue {
    messages: Mutex<VecDeque<QueueMessage>>,
    deleted: Mutex<Vec<String>>,
    receives: AtomicUsize,
    receive_failures: AtomicUsize,
    delete_failures: AtomicUsize,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a body. The message id is `msg-<n>` and the receipt handle
    /// `handle-<n>`, numbered from 1.
    pub fn push(&self, body: impl Into<String>) -> QueueMessage {
        let mut messages = lock(&self.messages);
        let n = messages.len() + lock(&self.deleted).len() + 1;
        let message = QueueMessage {
            message_id: format!("msg-{n}"),
            receipt_handle: format!("handle-{n}"),
            body: body.into(),
        };
        messages.push_back(message.clone());
        message
    }

    pub fn fail_next_receives(&self, n: usize) {
        self.receive_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_deletes(&self, n: usize) {
        self.delete_failures.store(n, Ordering::SeqCst);
    }

    /// Receipt handles deleted so far
    pub fn deleted(&self) -> Vec<String> {
        lock(&self.deleted).clone()
    }

    /// Messages still on the queue
    pub fn pending(&self) -> usize {
        lock(&self.messages).len()
    }

    pub fn receives(&self) -> usize {
        self.receives.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Queue for MemoryQueue {
    /// Pops the head of the queue. A message that is received but never
    /// deleted is put back at the tail, like an expired visibility timeout.
    async fn receive(&self) -> rin_sqs::Result<Option<QueueMessage>> {
        self.receives.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.receive_failures) {
            return Err(QueueError::Receive("simulated receive failure".to_string()));
        }
        let mut messages = lock(&self.messages);
        let message = messages.pop_front();
        if let Some(message) = &message {
            messages.push_back(message.clone());
        }
        Ok(message)
    }

    async fn delete(&self, receipt_handle: &str) -> rin_sqs::Result<()> {
        if take_failure(&self.delete_failures) {
            return Err(QueueError::Delete("simulated delete failure".to_string()));
        }
        lock(&self.messages).retain(|m| m.receipt_handle != receipt_handle);
        lock(&self.deleted).push(receipt_handle.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct Recording {
    statements: Mutex<Vec<String>>,
    logins: Mutex<Vec<Login>>,
    connects: AtomicUsize,
    closes: AtomicUsize,
    statement_failures: AtomicUsize,
    connect_failures: AtomicUsize,
}

/// Connector whose connections record the statements they commit.
#[derive(Default)]
pub struct RecordingConnector {
    recording: Arc<Recording>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statements that took effect: committed, or run without a transaction
    pub fn statements(&self) -> Vec<String> {
        lock(&self.recording.statements).clone()
    }

    pub fn logins(&self) -> Vec<Login> {
        lock(&self.recording.logins).clone()
    }

    pub fn connects(&self) -> usize {
        self.recording.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.recording.closes.load(Ordering::SeqCst)
    }

    pub fn fail_next_statements(&self, n: usize) {
        self.recording.statement_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_connects(&self, n: usize) {
        self.recording.connect_failures.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        login: &Login,
    ) -> rin_redshift::Result<Arc<dyn Connection>> {
        if take_failure(&self.recording.connect_failures) {
            return Err(LoadError::Connect(format!(
                "simulated connect failure to {}",
                endpoint.visible_dsn()
            )));
        }
        self.recording.connects.fetch_add(1, Ordering::SeqCst);
        lock(&self.recording.logins).push(login.clone());
        Ok(Arc::new(RecordingConnection {
            recording: Arc::clone(&self.recording),
            pending: Mutex::new(None),
            closed: AtomicBool::new(false),
        }))
    }
}

struct RecordingConnection {
    recording: Arc<Recording>,
    /// Statements of the open transaction, if any
    pending: Mutex<Option<Vec<String>>>,
    closed: AtomicBool,
}

#[async_trait]
impl Connection for RecordingConnection {
    async fn ping(&self) -> rin_redshift::Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LoadError::Connect("connection is closed".to_string()));
        }
        Ok(())
    }

    async fn begin(&self) -> rin_redshift::Result<()> {
        *lock(&self.pending) = Some(Vec::new());
        Ok(())
    }

    async fn execute(&self, sql: &str) -> rin_redshift::Result<()> {
        if take_failure(&self.recording.statement_failures) {
            return Err(LoadError::Statement("simulated statement failure".to_string()));
        }
        match lock(&self.pending).as_mut() {
            Some(pending) => pending.push(sql.to_string()),
            None => lock(&self.recording.statements).push(sql.to_string()),
        }
        Ok(())
    }

    async fn commit(&self) -> rin_redshift::Result<()> {
        if let Some(pending) = lock(&self.pending).take() {
            lock(&self.recording.statements).extend(pending);
        }
        Ok(())
    }

    async fn rollback(&self) -> rin_redshift::Result<()> {
        lock(&self.pending).take();
        Ok(())
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.recording.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Credential source handing out numbered temporary passwords.
pub struct StaticCredentials {
    ttl: chrono::Duration,
    issued: AtomicUsize,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::with_ttl(chrono::Duration::minutes(15))
    }

    pub fn with_ttl(ttl: chrono::Duration) -> Self {
        Self {
            ttl,
            issued: AtomicUsize::new(0),
        }
    }

    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }
}

impl Default for StaticCredentials {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn cluster_credentials(
        &self,
        cluster_identifier: &str,
        db_user: &str,
    ) -> rin_redshift::Result<TemporaryCredentials> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TemporaryCredentials {
            user: format!("IAM:{db_user}"),
            password: format!("{cluster_identifier}-temporary-{n}"),
            expires_at: Some(chrono::Utc::now() + self.ttl),
        })
    }
}
