//! Axum route handlers, grouped by page / feature.

pub mod generate;
pub mod health;
