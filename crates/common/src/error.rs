//! Error types for TriageBot.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TriageError {
    /// A required secret or setting is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Text generation or vectorization failed, or is not configured.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// A generated reply did not have the expected structure.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The issue tracker rejected or failed a label/comment call.
    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TriageError>;
