//! minivault-web — HTTP boundary for Minivault
//! Provides:
//!   - POST /generate  full response as JSON
//!   - POST /stream    plain-text chunks as they are generated
//!   - GET  /health    liveness and active backend

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
