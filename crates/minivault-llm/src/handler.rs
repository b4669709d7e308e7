//! Request orchestration: time the backend call, hand output to the caller,
//! submit one audit record per request.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures_util::stream::Stream;
use minivault_common::GenerationRequest;

use crate::audit::{AuditHandle, LogRecord};
use crate::backend::{BackendKind, ChunkStream, GenerationBackend, LlmError};

pub const GENERATE_ENDPOINT: &str = "/generate";
pub const STREAM_ENDPOINT: &str = "/stream";

/// Stateless between requests apart from the shared backend and audit handle.
/// Failed requests are not audited.
#[derive(Clone)]
pub struct RequestHandler {
    backend: Arc<dyn GenerationBackend>,
    audit: AuditHandle,
}

impl RequestHandler {
    pub fn new(backend: Arc<dyn GenerationBackend>, audit: AuditHandle) -> Self {
        Self { backend, audit }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let response = self.backend.generate(request.prompt()).await?;
        let elapsed = clock.elapsed();

        self.audit.submit(LogRecord::new(
            GENERATE_ENDPOINT,
            request.into_prompt(),
            response.clone(),
            self.backend.kind(),
            started_at,
            elapsed,
        ));
        Ok(response)
    }

    /// Open a stream whose chunks are forwarded as produced and audited once
    /// the stream ends. Errors opening the stream are returned before any
    /// chunk exists.
    pub async fn stream(&self, request: GenerationRequest) -> Result<AuditedStream, LlmError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let inner = self.backend.stream(request.prompt()).await?;
        Ok(AuditedStream {
            inner,
            chunks: Vec::new(),
            prompt: request.into_prompt(),
            llm_type: self.backend.kind(),
            started_at,
            clock,
            audit: self.audit.clone(),
            state: StreamState::Streaming,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Streaming,
    Finished,
    Failed,
}

/// Chunk stream that keeps a copy of every chunk it forwards.
///
/// Holding the whole response until the stream ends costs O(response) memory
/// per in-flight stream. In exchange chunks reach the caller with no extra
/// work on the hot path and the audit log gets one record per request rather
/// than one per chunk.
///
/// - exhausted: one record with `completed = true`
/// - backend error: no record, the error is the last item
/// - dropped early: one record with what was forwarded, `completed = false`
pub struct AuditedStream {
    inner: ChunkStream,
    chunks: Vec<String>,
    prompt: String,
    llm_type: BackendKind,
    started_at: DateTime<Utc>,
    clock: Instant,
    audit: AuditHandle,
    state: StreamState,
}

impl AuditedStream {
    fn submit_record(&mut self, completed: bool) {
        let record = LogRecord::new(
            STREAM_ENDPOINT,
            std::mem::take(&mut self.prompt),
            std::mem::take(&mut self.chunks).concat(),
            self.llm_type,
            self.started_at,
            self.clock.elapsed(),
        );
        self.audit.submit(if completed { record } else { record.incomplete() });
    }
}

impl Stream for AuditedStream {
    type Item = Result<String, LlmError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.state != StreamState::Streaming {
            return Poll::Ready(None);
        }
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                self.chunks.push(chunk.clone());
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                tracing::warn!(llm_type = %self.llm_type, error = %e, "stream failed mid-response");
                self.state = StreamState::Failed;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.state = StreamState::Finished;
                self.submit_record(true);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for AuditedStream {
    fn drop(&mut self) {
        if self.state == StreamState::Streaming {
            tracing::debug!(
                llm_type = %self.llm_type,
                chunks = self.chunks.len(),
                "stream abandoned by caller"
            );
            self.submit_record(false);
        }
    }
}
