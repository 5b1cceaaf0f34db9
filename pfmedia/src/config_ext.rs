//! Extension pour intégrer le cache d'images dans pfconfig
//!
//! Ce module fournit le trait `MediaConfigExt` qui expose les sections
//! `media` et `notifications` de la configuration.

use std::time::Duration;

use anyhow::Result;
use pfconfig::Config;

const DEFAULT_CACHE_DIR: &str = "cache/images";
const DEFAULT_ROUTE: &str = "/p";
const DEFAULT_KEEP_ALIVE_SECS: u64 = 30;

/// Trait d'extension pour la configuration du cache d'images
///
/// # Exemple
///
/// ```rust,ignore
/// use pfconfig::get_config;
/// use pfmedia::MediaConfigExt;
///
/// let config = get_config();
/// let cache_dir = config.get_media_cache_dir()?;
/// ```
pub trait MediaConfigExt {
    /// Répertoire des images exportées (default: "cache/images", relatif au config_dir)
    fn get_media_cache_dir(&self) -> Result<String>;

    /// Définit le répertoire des images exportées
    fn set_media_cache_dir(&self, directory: String) -> Result<()>;

    /// Préfixe de montage du proxy (default: "/p")
    fn get_media_route(&self) -> String;

    /// Période des keep-alive SSE (default: 30 s)
    fn get_notifications_keep_alive(&self) -> Duration;
}

impl MediaConfigExt for Config {
    fn get_media_cache_dir(&self) -> Result<String> {
        self.get_managed_dir(&["media", "cache", "directory"], DEFAULT_CACHE_DIR)
    }

    fn set_media_cache_dir(&self, directory: String) -> Result<()> {
        self.set_managed_dir(&["media", "cache", "directory"], directory)
    }

    fn get_media_route(&self) -> String {
        let route = self.get_string_or(&["media", "route"], DEFAULT_ROUTE);
        format!("/{}", route.trim_matches('/'))
    }

    fn get_notifications_keep_alive(&self) -> Duration {
        Duration::from_secs(
            self.get_u64_or(&["notifications", "keep_alive_secs"], DEFAULT_KEEP_ALIVE_SECS)
                .max(1),
        )
    }
}
