//! minivault-llm — text generation behind a pluggable backend, with
//! non-blocking audit logging of every request/response pair.
//!
//!   backend — `GenerationBackend` trait, `StubBackend`, `RemoteBackend`
//!   factory — `BackendConfig` and `build_backend`
//!   audit   — `LogRecord`, `AuditLogger` and its background worker
//!   handler — `RequestHandler`, the per-request orchestration

pub mod backend;
pub mod factory;
pub mod audit;
pub mod handler;

pub use audit::{AuditHandle, AuditLogger, LogRecord};
pub use backend::{BackendKind, ChunkStream, GenerationBackend, LlmError};
pub use factory::{build_backend, BackendConfig};
pub use handler::{AuditedStream, RequestHandler};
