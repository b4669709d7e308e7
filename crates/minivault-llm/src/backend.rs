//! Generation backend trait and concrete implementations.
//!
//! Backends:
//!   StubBackend   — canned responses picked at random, paced streaming, no I/O
//!   RemoteBackend — Ollama-style `/api/generate` endpoint (JSON in, JSON / NDJSON out)
//!
//! Both are shared read-only across concurrent requests behind an
//! `Arc<dyn GenerationBackend>`; see [`crate::factory::build_backend`].

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, Stream, StreamExt};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport failure or non-success status from the backend.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    /// Backend answered, but with a payload we cannot interpret.
    #[error("Backend protocol error: {0}")]
    Protocol(String),
    #[error("Backend configuration error: {0}")]
    Config(String),
}

// ── Kind ──────────────────────────────────────────────────────────────────────

/// Stable type tag written into every audit record as `llm_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Stubbed,
    Ollama,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Stubbed => "stubbed",
            BackendKind::Ollama  => "ollama",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Trait ─────────────────────────────────────────────────────────────────────

/// Lazy sequence of text chunks for one invocation.
///
/// Dropping the stream releases whatever it holds (for the remote backend,
/// the HTTP connection), whether it was exhausted, failed or abandoned.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Complete response for `prompt`. Never returns partial output.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// Incremental response for `prompt`. Concatenating every chunk yields
    /// the full text of this single invocation.
    async fn stream(&self, prompt: &str) -> Result<ChunkStream, LlmError>;

    fn kind(&self) -> BackendKind;
}

// ── 1. Stub (local, no I/O) ───────────────────────────────────────────────────

pub const STUB_RESPONSES: [&str; 2] = [
    "Hello friend. Hello friend? That's lame. Maybe I should give you a name? But that's a \
     slippery slope. You're only in my head. We have to remember that. Shit. It's actually \
     happened. I'm talking to an imaginary person.",
    "What if changing the world was just about being here, by showing up no matter how many \
     times we get told we don't belong, by staying true even when we're shamed into being \
     false, by believing in ourselves even when we're told we're too different? And if we all \
     held on to that, if we refuse to budge and fall in line, if we stood our ground for long \
     enough, just maybe… The world can't help but change around us.",
];

/// Pacing applied per character of each streamed token.
pub const DEFAULT_CHAR_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct StubBackend {
    char_delay: Duration,
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StubBackend {
    pub fn new() -> Self {
        Self { char_delay: DEFAULT_CHAR_DELAY }
    }

    pub fn with_char_delay(mut self, char_delay: Duration) -> Self {
        self.char_delay = char_delay;
        self
    }

    fn pick(&self) -> &'static str {
        STUB_RESPONSES[rand::thread_rng().gen_range(0..STUB_RESPONSES.len())]
    }
}

#[async_trait]
impl GenerationBackend for StubBackend {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        Ok(self.pick().to_string())
    }

    async fn stream(&self, _prompt: &str) -> Result<ChunkStream, LlmError> {
        let char_delay = self.char_delay;
        let words = self.pick().split_whitespace();

        // Each word is yielded with a trailing space, then the stream sleeps
        // for `char_delay * chars(word)` before producing the next one.
        let paced = stream::unfold((words, Duration::ZERO), move |(mut words, pending)| async move {
            if !pending.is_zero() {
                tokio::time::sleep(pending).await;
            }
            let word = words.next()?;
            let delay = char_delay * word.chars().count() as u32;
            Some((Ok::<_, LlmError>(format!("{word} ")), (words, delay)))
        });

        Ok(Box::pin(paced))
    }

    fn kind(&self) -> BackendKind { BackendKind::Stubbed }
}

// ── 2. Remote (Ollama /api/generate) ──────────────────────────────────────────

pub const GENERATE_PATH: &str = "/api/generate";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// One JSON object of the response: the whole answer when `stream` is
/// false, one fragment per line when it is true.
#[derive(Deserialize)]
struct GenerateChunk {
    response: String,
}

pub struct RemoteBackend {
    pub base_url: String,
    pub model: String,
    generate_url: String,
    client: reqwest::Client,
}

impl RemoteBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        Self::with_timeout(base_url, model, DEFAULT_TIMEOUT)
    }

    /// `timeout` bounds connecting and each read, not the whole stream.
    pub fn with_timeout(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let base_url = base_url.into();
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .map_err(|e| LlmError::Config(format!("cannot build HTTP client: {e}")))?;
        let generate_url = format!("{}{}", base_url.trim_end_matches('/'), GENERATE_PATH);
        Ok(Self { base_url, model: model.into(), generate_url, client })
    }

    pub fn generate_url(&self) -> &str {
        &self.generate_url
    }

    async fn post(&self, prompt: &str, stream: bool) -> Result<reqwest::Response, LlmError> {
        let body = GenerateBody { model: &self.model, prompt, stream };
        let resp = self.client
            .post(&self.generate_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Unavailable(format!("POST {} failed: {e}", self.generate_url)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LlmError::Unavailable(format!(
                "POST {} returned HTTP {}",
                self.generate_url,
                status.as_u16()
            )));
        }
        Ok(resp)
    }
}

#[async_trait]
impl GenerationBackend for RemoteBackend {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let resp = self.post(prompt, false).await?;
        let body = resp
            .bytes()
            .await
            .map_err(|e| LlmError::Unavailable(format!("reading response body failed: {e}")))?;
        let chunk: GenerateChunk = serde_json::from_slice(&body)
            .map_err(|e| LlmError::Protocol(format!("unexpected generate payload: {e}")))?;
        Ok(chunk.response)
    }

    async fn stream(&self, prompt: &str) -> Result<ChunkStream, LlmError> {
        let resp = self.post(prompt, true).await?;
        tracing::debug!(model = %self.model, url = %self.generate_url, "remote stream opened");
        // The response owns the connection; it is closed when the returned
        // stream is dropped.
        Ok(Box::pin(ndjson_chunks(resp.bytes_stream())))
    }

    fn kind(&self) -> BackendKind { BackendKind::Ollama }
}

// ── NDJSON decoding ───────────────────────────────────────────────────────────

struct NdjsonState {
    body: Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>>,
    buf: BytesMut,
    /// Bytes of `buf` already known to hold no newline.
    scanned: usize,
    eof: bool,
    failed: bool,
}

impl NdjsonState {
    /// Next complete line, or the unterminated remainder once the body ended.
    fn next_line(&mut self) -> Option<BytesMut> {
        if let Some(i) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') {
            let pos = self.scanned + i;
            let mut line = self.buf.split_to(pos + 1);
            line.truncate(pos);
            self.scanned = 0;
            return Some(line);
        }
        self.scanned = self.buf.len();
        if self.eof && !self.buf.is_empty() {
            self.scanned = 0;
            return Some(self.buf.split());
        }
        None
    }
}

fn parse_line(line: &[u8]) -> Option<Result<String, LlmError>> {
    let text = match std::str::from_utf8(line) {
        Ok(t) => t,
        Err(e) => return Some(Err(LlmError::Protocol(format!("stream line is not UTF-8: {e}")))),
    };
    if text.trim().is_empty() {
        return None;
    }
    Some(
        serde_json::from_str::<GenerateChunk>(text)
            .map(|c| c.response)
            .map_err(|e| LlmError::Protocol(format!("malformed stream line: {e}"))),
    )
}

/// Turn a newline-delimited JSON body into a stream of `response` fields.
///
/// Only one partial line is buffered at a time. Blank lines are skipped; the
/// first malformed line or transport error is yielded and ends the stream.
pub(crate) fn ndjson_chunks<S, E>(body: S) -> impl Stream<Item = Result<String, LlmError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: fmt::Display,
{
    let state = NdjsonState {
        body: Box::pin(body.map(|r| r.map_err(|e| e.to_string()))),
        buf: BytesMut::new(),
        scanned: 0,
        eof: false,
        failed: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.failed {
                return None;
            }
            if let Some(line) = state.next_line() {
                match parse_line(&line) {
                    None => continue,
                    Some(Ok(text)) => return Some((Ok(text), state)),
                    Some(Err(e)) => {
                        state.failed = true;
                        return Some((Err(e), state));
                    }
                }
            }
            if state.eof {
                return None;
            }
            match state.body.next().await {
                Some(Ok(bytes)) => state.buf.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    state.failed = true;
                    return Some((Err(LlmError::Unavailable(format!("stream interrupted: {e}"))), state));
                }
                None => state.eof = true,
            }
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
