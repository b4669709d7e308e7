//! Shared application state for the web server.

use std::sync::Arc;

use minivault_common::DEFAULT_MAX_PROMPT_CHARS;
use minivault_llm::RequestHandler;

/// Shared state injected into every Axum handler.
#[derive(Clone)]
pub struct AppState {
    pub handler: RequestHandler,
    /// Prompts longer than this many characters are rejected.
    pub max_prompt_chars: usize,
}

impl AppState {
    pub fn new(handler: RequestHandler) -> Self {
        Self { handler, max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS }
    }

    pub fn with_max_prompt_chars(mut self, max_prompt_chars: usize) -> Self {
        self.max_prompt_chars = max_prompt_chars;
        self
    }
}

pub type SharedState = Arc<AppState>;
