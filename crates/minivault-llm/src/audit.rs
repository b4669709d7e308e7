//! Audit logging for generation requests.
//!
//! Every completed request becomes one [`LogRecord`]. Submitters push records
//! onto an unbounded channel and return immediately; a single background task
//! owns the receiving end and appends each record as one JSON line to
//! `<log_dir>/<YYYY-MM-DD>.jsonl`.
//!
//! The queue is deliberately unbounded: a burst of requests grows memory
//! rather than blocking or rejecting a request path. Records are only
//! guaranteed on disk once [`AuditLogger::close`] has returned.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::backend::BackendKind;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit log I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Audit record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: Uuid,
    pub endpoint: String,
    pub prompt: String,
    pub response: String,
    pub llm_type: BackendKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: f64,
    /// False when the caller went away before the stream was exhausted.
    pub completed: bool,
}

impl LogRecord {
    /// `elapsed` comes from a monotonic clock started alongside `started_at`;
    /// `finished_at` is derived from it so the two timestamps always agree
    /// with `duration_ms`.
    pub fn new(
        endpoint: impl Into<String>,
        prompt: impl Into<String>,
        response: impl Into<String>,
        llm_type: BackendKind,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        let finished_at = chrono::Duration::from_std(elapsed)
            .ok()
            .and_then(|d| started_at.checked_add_signed(d))
            .unwrap_or(started_at);
        Self {
            id: Uuid::new_v4(),
            endpoint: endpoint.into(),
            prompt: prompt.into(),
            response: response.into(),
            llm_type,
            started_at,
            finished_at,
            duration_ms: elapsed.as_secs_f64() * 1000.0,
            completed: true,
        }
    }

    pub fn incomplete(mut self) -> Self {
        self.completed = false;
        self
    }
}

// ── Sink ──────────────────────────────────────────────────────────────────────

/// Destination for records dequeued by the audit worker.
#[async_trait]
pub trait AuditSink: Send + 'static {
    /// Durably append one record. Called sequentially, in dequeue order.
    async fn append(&mut self, record: &LogRecord) -> Result<(), AuditError>;
}

/// One append-only JSON-lines file per calendar day (local time).
#[derive(Debug, Clone)]
pub struct DailyJsonlSink {
    log_dir: PathBuf,
}

impl DailyJsonlSink {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self { log_dir: log_dir.into() }
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.log_dir.join(format!("{}.jsonl", date.format("%Y-%m-%d")))
    }

    pub fn today_path(&self) -> PathBuf {
        self.path_for(Local::now().date_naive())
    }
}

#[async_trait]
impl AuditSink for DailyJsonlSink {
    async fn append(&mut self, record: &LogRecord) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.today_path())
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

// ── Logger ────────────────────────────────────────────────────────────────────

/// Cheap, cloneable submission side of the audit logger.
#[derive(Debug, Clone)]
pub struct AuditHandle {
    tx: mpsc::UnboundedSender<LogRecord>,
}

impl AuditHandle {
    /// Queue `record` for persistence. Never blocks and never fails the caller.
    pub fn submit(&self, record: LogRecord) {
        if let Err(e) = self.tx.send(record) {
            tracing::warn!(record_id = %e.0.id, "audit logger is closed; record dropped");
        }
    }
}

/// Owner of the background persistence worker.
pub struct AuditLogger {
    handle: AuditHandle,
    shutdown: CancellationToken,
    worker: JoinHandle<()>,
}

impl AuditLogger {
    /// Start a worker writing daily JSON-lines files under `log_dir`.
    /// Must be called from within a tokio runtime.
    pub fn start(log_dir: impl Into<PathBuf>) -> Self {
        Self::with_sink(DailyJsonlSink::new(log_dir))
    }

    pub fn with_sink<S: AuditSink>(sink: S) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let worker = tokio::spawn(run_worker(sink, rx, shutdown.clone()));
        Self { handle: AuditHandle { tx }, shutdown, worker }
    }

    pub fn handle(&self) -> AuditHandle {
        self.handle.clone()
    }

    pub fn submit(&self, record: LogRecord) {
        self.handle.submit(record);
    }

    /// Stop the worker after it has persisted everything already queued.
    pub async fn close(self) {
        self.shutdown.cancel();
        if let Err(e) = self.worker.await {
            tracing::error!(error = %e, "audit worker terminated abnormally");
        }
    }
}

async fn run_worker<S: AuditSink>(
    mut sink: S,
    mut rx: mpsc::UnboundedReceiver<LogRecord>,
    shutdown: CancellationToken,
) {
    tracing::debug!("audit worker started");
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            received = rx.recv() => match received {
                Some(record) => write_record(&mut sink, &record).await,
                // every handle dropped
                None => break,
            },
        }
    }

    // Refuse new submissions, then flush what is already queued.
    rx.close();
    let mut drained = 0usize;
    while let Some(record) = rx.recv().await {
        write_record(&mut sink, &record).await;
        drained += 1;
    }
    tracing::info!(drained, "audit worker stopped");
}

async fn write_record<S: AuditSink>(sink: &mut S, record: &LogRecord) {
    if let Err(e) = sink.append(record).await {
        tracing::error!(
            record_id = %record.id,
            endpoint = %record.endpoint,
            error = %e,
            "failed to persist audit record"
        );
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
