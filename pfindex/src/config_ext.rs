//! Extension pour intégrer l'index des noms de fichiers dans pfconfig
//!
//! Ce module fournit le trait `IndexConfigExt` qui ajoute à
//! `pfconfig::Config` les réglages de la section `library`.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use pfconfig::{Config, expand_home};

use crate::builder::CollisionPolicy;
use crate::store::IndexStore;
use crate::template::{DEFAULT_TEMPLATE, FilenameTemplate};

const DEFAULT_LIBRARY_PATH: &str = "~/Pictures/Photos Library.photoslibrary";
const DEFAULT_INDEX_DIR: &str = "library";
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 600;

/// Trait d'extension pour la configuration de l'index
///
/// # Exemple
///
/// ```rust,ignore
/// use pfconfig::get_config;
/// use pfindex::IndexConfigExt;
///
/// let config = get_config();
/// let store = config.create_index_store()?;
/// println!("index: {}", store.index_path().display());
/// ```
pub trait IndexConfigExt {
    /// Chemin de la photothèque source, `~` développé
    fn get_library_path(&self) -> String;

    /// Répertoire racine des index (default: "library", relatif au config_dir)
    fn get_index_root(&self) -> Result<String>;

    /// Template des noms canoniques et éventuelle extension JPEG imposée
    fn get_filename_template(&self) -> Result<FilenameTemplate>;

    /// Politique de résolution des collisions (default: quality)
    fn get_collision_policy(&self) -> Result<CollisionPolicy>;

    /// Période de vérification de fraîcheur (default: 600 s)
    fn get_index_refresh_interval(&self) -> Duration;

    /// Crée le stockage de l'index pour la photothèque configurée
    fn create_index_store(&self) -> Result<IndexStore>;
}

impl IndexConfigExt for Config {
    fn get_library_path(&self) -> String {
        let raw = self.get_string_or(&["library", "path"], DEFAULT_LIBRARY_PATH);
        expand_home(&raw).to_string_lossy().to_string()
    }

    fn get_index_root(&self) -> Result<String> {
        self.get_managed_dir(&["library", "index", "directory"], DEFAULT_INDEX_DIR)
    }

    fn get_filename_template(&self) -> Result<FilenameTemplate> {
        let template = self.get_string_or(&["library", "index", "template"], DEFAULT_TEMPLATE);
        let jpeg_ext = self.get_optional_string(&["library", "index", "jpeg_ext"]);
        Ok(FilenameTemplate::new(&template, jpeg_ext.as_deref())?)
    }

    fn get_collision_policy(&self) -> Result<CollisionPolicy> {
        match self.get_optional_string(&["library", "index", "collision_policy"]) {
            Some(name) => Ok(name.parse()?),
            None => Ok(CollisionPolicy::default()),
        }
    }

    fn get_index_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.get_u64_or(
            &["library", "index", "refresh_interval_secs"],
            DEFAULT_REFRESH_INTERVAL_SECS,
        ))
    }

    fn create_index_store(&self) -> Result<IndexStore> {
        let root = self.get_index_root()?;
        Ok(IndexStore::for_library(Path::new(&root), &self.get_library_path()))
    }
}
