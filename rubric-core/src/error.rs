//! Error types for rubric-core

use thiserror::Error;

/// Main error type for the rubric-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem watch error
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Score store error with the path that failed
    #[error("store error at {path}: {message}")]
    Store { path: String, message: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Rejected direct-scoring input (bad session id, empty or oversized transcript)
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for rubric-core
pub type Result<T> = std::result::Result<T, Error>;
