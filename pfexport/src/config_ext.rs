//! Extension pour intégrer l'export dans pfconfig
//!
//! Ce module fournit le trait `ExportConfigExt` qui expose la section
//! `export` de la configuration et fabrique le client `osxphotos`.

use std::time::Duration;

use pfconfig::Config;
use pfindex::IndexConfigExt;

use crate::exporter::{DEFAULT_EXPORT_TIMEOUT, DEFAULT_JPEG_QUALITY, ExportOptions};
use crate::osxphotos::OsxPhotos;

const DEFAULT_OSXPHOTOS_BIN: &str = "osxphotos";
const DEFAULT_CONCURRENCY: usize = 1;

/// Trait d'extension pour la configuration de l'export
///
/// # Exemple
///
/// ```rust,ignore
/// use pfconfig::get_config;
/// use pfexport::ExportConfigExt;
///
/// let config = get_config();
/// let osxphotos = config.create_osxphotos();
/// ```
pub trait ExportConfigExt {
    /// Binaire `osxphotos` (default: "osxphotos", cherché dans le PATH)
    fn get_osxphotos_bin(&self) -> String;

    /// Nombre d'exports simultanés (default: 1, jamais 0)
    fn get_export_concurrency(&self) -> usize;

    /// Options passées à chaque export
    fn get_export_options(&self) -> ExportOptions;

    /// Crée le client `osxphotos` pour la photothèque configurée
    fn create_osxphotos(&self) -> OsxPhotos;
}

impl ExportConfigExt for Config {
    fn get_osxphotos_bin(&self) -> String {
        let bin = self.get_string_or(&["export", "osxphotos_bin"], DEFAULT_OSXPHOTOS_BIN);
        pfconfig::expand_home(&bin).to_string_lossy().to_string()
    }

    fn get_export_concurrency(&self) -> usize {
        self.get_usize_or(&["export", "concurrency"], DEFAULT_CONCURRENCY)
            .max(1)
    }

    fn get_export_options(&self) -> ExportOptions {
        let defaults = ExportOptions::default();
        let quality = self.get_f64_or(&["export", "jpeg_quality"], DEFAULT_JPEG_QUALITY);

        ExportOptions {
            jpeg_quality: if (0.0..=1.0).contains(&quality) {
                quality
            } else {
                DEFAULT_JPEG_QUALITY
            },
            update: self.get_bool_or(&["export", "update"], defaults.update),
            download_missing: self
                .get_bool_or(&["export", "download_missing"], defaults.download_missing),
            use_photokit: self.get_bool_or(&["export", "use_photokit"], defaults.use_photokit),
            timeout: Duration::from_secs(
                self.get_u64_or(&["export", "timeout_secs"], DEFAULT_EXPORT_TIMEOUT.as_secs())
                    .max(1),
            ),
        }
    }

    fn create_osxphotos(&self) -> OsxPhotos {
        OsxPhotos::new(self.get_osxphotos_bin())
            .with_library(self.get_library_path())
            .with_options(self.get_export_options())
    }
}
