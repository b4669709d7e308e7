//! minivault-common — Shared types and errors used across all Minivault crates.

pub mod error;
pub mod request;

// Re-export commonly used types
pub use error::{MinivaultError, Result};
pub use request::{GenerationRequest, DEFAULT_MAX_PROMPT_CHARS};
