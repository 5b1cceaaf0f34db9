//! Error types for the export worker

use std::time::Duration;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, ExportError>;

/// Failures of an export run
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The tool could not be started
    #[error("cannot run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool exited with a non-zero status
    #[error("export tool exited with status {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },

    /// The watchdog killed the tool
    #[error("export tool timed out after {0:?}")]
    Timeout(Duration),

    /// The tool succeeded but produced no file for this identifier
    #[error("no exported file for {0}")]
    MissingOutput(String),

    /// The tool output could not be parsed
    #[error("invalid tool output: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ExportError> for pfindex::IndexError {
    fn from(e: ExportError) -> Self {
        pfindex::IndexError::Source(e.to_string())
    }
}
