//! On-disk layout of the filename index
//!
//! ```text
//! <root>/<library slug>/
//!     filename-index.json
//!     filename-collisions.json
//!     filename-index.meta.json
//! ```
//!
//! Every file is replaced through a temporary sibling and an atomic rename,
//! so readers never observe a partial write.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::builder::{BuiltIndex, IndexEntry};
use crate::error::Result;

pub const INDEX_FILE: &str = "filename-index.json";
pub const COLLISIONS_FILE: &str = "filename-collisions.json";
pub const METADATA_FILE: &str = "filename-index.meta.json";

/// Freshness sidecar of the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    pub source_library_modified_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
}

/// Directory-safe name for a library location
///
/// `~/Pictures/Photos Library.photoslibrary` → `photos-library`
pub fn library_slug(location: &str) -> String {
    let stem = Path::new(location.trim_end_matches('/'))
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");

    let mut slug = String::with_capacity(stem.len());
    for c in stem.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "default".to_string()
    } else {
        slug.to_string()
    }
}

/// Paths and atomic writes of one library's index
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    /// Uses `dir` directly as the storage directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Storage directory of `location` under `root`
    pub fn for_library(root: impl AsRef<Path>, location: &str) -> Self {
        Self::new(root.as_ref().join(library_slug(location)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    pub fn collisions_path(&self) -> PathBuf {
        self.dir.join(COLLISIONS_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
    }

    /// Reads the metadata sidecar; absent or unreadable means "never built"
    pub fn read_metadata(&self) -> Option<IndexMetadata> {
        let path = self.metadata_path();
        let content = std::fs::read(&path).ok()?;
        match serde_json::from_slice(&content) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!(path = %path.display(), "ignoring corrupt index metadata: {}", e);
                None
            }
        }
    }

    pub fn write_metadata(&self, metadata: &IndexMetadata) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let tmp = self.temp_path(METADATA_FILE);
        let outcome = std::fs::write(&tmp, serde_json::to_vec(metadata)?)
            .and_then(|_| std::fs::rename(&tmp, self.metadata_path()));
        if outcome.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        Ok(outcome?)
    }

    /// Replaces the live index and collisions files with `built`
    ///
    /// On error the live files are left as they were and the temporary
    /// files are removed.
    pub fn install(&self, built: &BuiltIndex) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let tmp_index = self.temp_path(INDEX_FILE);
        let tmp_collisions = self.temp_path(COLLISIONS_FILE);

        let outcome = built
            .write_to(&tmp_index, &tmp_collisions)
            .and_then(|_| {
                std::fs::rename(&tmp_collisions, self.collisions_path())?;
                std::fs::rename(&tmp_index, self.index_path())?;
                Ok(())
            });

        if outcome.is_err() {
            let _ = std::fs::remove_file(&tmp_index);
            let _ = std::fs::remove_file(&tmp_collisions);
        } else {
            debug!(dir = %self.dir.display(), entries = built.index.len(), "index installed");
        }
        outcome
    }

    /// Loads the primary index
    pub fn load_index(&self) -> Result<HashMap<String, IndexEntry>> {
        load_index_file(&self.index_path())
    }

    /// Loads the collisions map, empty when absent
    pub fn load_collisions(&self) -> Result<HashMap<String, Vec<String>>> {
        match std::fs::read(self.collisions_path()) {
            Ok(content) => Ok(serde_json::from_slice(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

pub(crate) fn load_index_file(path: &Path) -> Result<HashMap<String, IndexEntry>> {
    let content = std::fs::read(path)?;
    Ok(serde_json::from_slice(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_library_slug() {
        assert_eq!(
            library_slug("~/Pictures/Photos Library.photoslibrary"),
            "photos-library"
        );
        assert_eq!(library_slug("/Volumes/Ext/Family_2024.photoslibrary/"), "family-2024");
        assert_eq!(library_slug(""), "default");
    }

    #[test]
    fn test_install_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::for_library(dir.path(), "/tmp/Test.photoslibrary");

        assert!(store.read_metadata().is_none());

        let mut index = BTreeMap::new();
        index.insert("a.jpg".to_string(), IndexEntry::Single("A".into()));
        let built = BuiltIndex {
            index,
            ..Default::default()
        };
        store.install(&built).unwrap();

        let loaded = store.load_index().unwrap();
        assert_eq!(loaded["a.jpg"], IndexEntry::Single("A".into()));
        assert!(store.load_collisions().unwrap().is_empty());

        let meta = IndexMetadata {
            source_library_modified_at: Utc::now(),
            generated_at: Utc::now(),
        };
        store.write_metadata(&meta).unwrap();
        assert_eq!(store.read_metadata(), Some(meta));

        let raw = std::fs::read_to_string(store.metadata_path()).unwrap();
        assert!(raw.contains("sourceLibraryModifiedAt"));
        assert!(raw.contains("generatedAt"));

        // Aucun fichier temporaire ne doit subsister
        let leftovers = std::fs::read_dir(store.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
