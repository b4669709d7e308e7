//! Validated generation request.
//!
//! A `GenerationRequest` can only be obtained through [`GenerationRequest::new`],
//! so anything holding one has already passed the prompt bounds check.

use crate::error::{MinivaultError, Result};

/// Upper bound on prompt length, in characters, when none is configured.
pub const DEFAULT_MAX_PROMPT_CHARS: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    prompt: String,
}

impl GenerationRequest {
    /// Validate `prompt` against `1..=max_chars` characters.
    pub fn new(prompt: impl Into<String>, max_chars: usize) -> Result<Self> {
        let prompt = prompt.into();
        let len = prompt.chars().count();
        if len == 0 {
            return Err(MinivaultError::Validation(
                "prompt must not be empty".to_string(),
            ));
        }
        if len > max_chars {
            return Err(MinivaultError::Validation(format!(
                "prompt is {len} characters, maximum is {max_chars}"
            )));
        }
        Ok(Self { prompt })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn into_prompt(self) -> String {
        self.prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_prompt_within_bounds() {
        let req = GenerationRequest::new("Hello, world!", DEFAULT_MAX_PROMPT_CHARS).unwrap();
        assert_eq!(req.prompt(), "Hello, world!");
    }

    #[test]
    fn test_rejects_empty_prompt() {
        let err = GenerationRequest::new("", DEFAULT_MAX_PROMPT_CHARS).unwrap_err();
        assert!(matches!(err, MinivaultError::Validation(_)));
    }

    #[test]
    fn test_rejects_oversized_prompt() {
        let prompt = "a".repeat(DEFAULT_MAX_PROMPT_CHARS + 1);
        let err = GenerationRequest::new(prompt, DEFAULT_MAX_PROMPT_CHARS).unwrap_err();
        assert!(err.to_string().contains("maximum is 8192"));
    }

    #[test]
    fn test_bound_counts_characters_not_bytes() {
        // 4 chars, 10 bytes
        let req = GenerationRequest::new("日本語!", 4);
        assert!(req.is_ok());
    }
}
