//! Error types for the filename index

/// Result type alias for index operations
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors raised while building, storing or refreshing the filename index
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The source library could not be read
    #[error("Source library error: {0}")]
    Source(String),

    /// Invalid filename template or JPEG extension override
    #[error("Invalid filename template: {0}")]
    Template(String),

    /// Unknown collision policy name
    #[error("Unknown collision policy: {0}")]
    Policy(String),

    /// A blocking task could not be joined
    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Configuration error (from pfconfig/anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}
