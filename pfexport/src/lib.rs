//! # pfexport - Matérialisation des images exportées
//!
//! Cette crate produit les fichiers du cache d'images en pilotant l'outil
//! externe `osxphotos`.
//!
//! - [`Exporter`] : trait des producteurs d'artefacts, utilisé par la file de tâches
//! - [`OsxPhotos`] : implémentation par `osxphotos export`, avec chien de garde,
//!   qui sert aussi de [`pfindex::SourceLibrary`] via `osxphotos query --json`
//! - [`media_type`] : famille et type MIME d'après l'extension
//!
//! ```rust,ignore
//! use pfexport::{ExportRequest, Exporter, OsxPhotos};
//!
//! let osxphotos = OsxPhotos::new("osxphotos");
//! osxphotos
//!     .export(
//!         &[ExportRequest::new("UUID", "20240101T000000000000Z-IMG_0001.JPG")],
//!         Path::new("/cache/images"),
//!     )
//!     .await?;
//! ```

pub mod config_ext;
pub mod error;
pub mod exporter;
pub mod media_type;
pub mod osxphotos;

pub use config_ext::ExportConfigExt;
pub use error::{ExportError, Result};
pub use exporter::{ExportOptions, ExportRequest, Exporter};
pub use media_type::{MediaKind, media_kind, mime_type, mime_type_for};
pub use osxphotos::{OsxPhotos, parse_query_output};
