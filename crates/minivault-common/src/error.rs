use thiserror::Error;

#[derive(Debug, Error)]
pub enum MinivaultError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, MinivaultError>;
