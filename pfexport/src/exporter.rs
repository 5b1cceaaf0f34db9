//! Trait implemented by the workers that materialize artifacts

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub const DEFAULT_JPEG_QUALITY: f64 = 0.92;
pub const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_secs(300);

/// One artifact to produce: the photo `identifier`, written as `filename`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub identifier: String,
    pub filename: String,
}

impl ExportRequest {
    pub fn new(identifier: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            filename: filename.into(),
        }
    }
}

/// Réglages d'un export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Qualité JPEG entre 0 et 1
    pub jpeg_quality: f64,
    /// Mode mise à jour : un artefact déjà présent sous son nom canonique
    /// n'est pas réexporté
    pub update: bool,
    /// Télécharge les originaux absents localement (iCloud)
    pub download_missing: bool,
    /// Passe par PhotoKit plutôt que par la base de la photothèque
    pub use_photokit: bool,
    /// Durée maximale d'une invocation de l'outil
    pub timeout: Duration,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            update: true,
            download_missing: true,
            use_photokit: false,
            timeout: DEFAULT_EXPORT_TIMEOUT,
        }
    }
}

/// Produces exported artifacts into a destination directory
///
/// Implementations must be idempotent: exporting an identifier whose
/// artifact already exists replaces it.
#[async_trait]
pub trait Exporter: Send + Sync {
    async fn export(&self, requests: &[ExportRequest], dest_dir: &Path) -> Result<()>;
}
