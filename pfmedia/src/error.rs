//! Error types of the media proxy and their HTTP mapping

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

/// Result type alias for media operations
pub type Result<T> = std::result::Result<T, MediaError>;

/// Retry hint sent with a 404 for a filename the index does not know
pub const RETRY_AFTER_UNKNOWN: &str = "4";
/// Retry hint sent with a 404 while the artifact is being exported
pub const RETRY_AFTER_PENDING: &str = "2";

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// The filename does not follow the canonical grammar
    #[error("invalid media filename: {0}")]
    Validation(String),

    /// The index has no entry for this filename
    #[error("unknown media filename: {0}")]
    NotFound(String),

    /// Several photos render to this filename
    #[error("ambiguous media filename {filename}: {}", .identifiers.join(","))]
    Ambiguous {
        filename: String,
        identifiers: Vec<String>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Ambiguous { .. } => StatusCode::CONFLICT,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Réponses sans corps : le client ne lit que le statut et `Retry-After`
impl IntoResponse for MediaError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound(_) => (
                StatusCode::NOT_FOUND,
                [(header::RETRY_AFTER, RETRY_AFTER_UNKNOWN)],
            )
                .into_response(),
            other => other.status_code().into_response(),
        }
    }
}
