//! In-memory view of the primary index
//!
//! Every lookup stats the index file and reloads it when its modification
//! time (or presence) changed, so the cache follows rebuilds done by
//! another writer within one request.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::builder::IndexEntry;
use crate::store::load_index_file;

/// Result of resolving a canonical filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(String),
    /// Several records share the filename and none was chosen
    Ambiguous(Vec<String>),
    NotFound,
}

#[derive(Default)]
struct LookupState {
    entries: HashMap<String, IndexEntry>,
    mtime: Option<SystemTime>,
    loaded: bool,
}

/// Shared, lazily refreshed copy of `filename-index.json`
#[derive(Clone)]
pub struct LookupCache {
    path: Arc<PathBuf>,
    state: Arc<RwLock<LookupState>>,
}

async fn observed_mtime(path: &Path) -> Option<SystemTime> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    // Sans mtime exploitable, on force une relecture à chaque requête
    Some(metadata.modified().unwrap_or_else(|_| SystemTime::now()))
}

impl LookupCache {
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(index_path.into()),
            state: Arc::new(RwLock::new(LookupState::default())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolves `filename` against the current on-disk index
    pub async fn lookup(&self, filename: &str) -> Lookup {
        self.refresh(false).await;

        let state = self.state.read().await;
        match state.entries.get(filename) {
            None => Lookup::NotFound,
            Some(IndexEntry::Single(id)) => Lookup::Found(id.clone()),
            Some(IndexEntry::Collision(ids)) => match ids.as_slice() {
                [] => Lookup::NotFound,
                [id] => Lookup::Found(id.clone()),
                _ => Lookup::Ambiguous(ids.clone()),
            },
        }
    }

    /// Forces a re-read of the index file
    pub async fn reload(&self) {
        self.refresh(true).await;
    }

    /// Number of entries currently held in memory
    pub async fn len(&self) -> usize {
        self.refresh(false).await;
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn refresh(&self, force: bool) {
        let mtime = observed_mtime(&self.path).await;

        {
            let state = self.state.read().await;
            if !force && state.loaded && state.mtime == mtime {
                return;
            }
        }

        let mut state = self.state.write().await;
        if !force && state.loaded && state.mtime == mtime {
            return;
        }

        if mtime.is_none() {
            state.entries.clear();
            state.mtime = None;
            state.loaded = true;
            debug!(path = %self.path.display(), "index file absent, lookup cache empty");
            return;
        }

        let path = self.path.as_ref().clone();
        let loaded = tokio::task::spawn_blocking(move || load_index_file(&path)).await;

        match loaded {
            Ok(Ok(entries)) => {
                debug!(path = %self.path.display(), entries = entries.len(), "index loaded");
                state.entries = entries;
            }
            Ok(Err(e)) => {
                warn!(path = %self.path.display(), "keeping previous index, reload failed: {}", e);
            }
            Err(e) => {
                warn!(path = %self.path.display(), "keeping previous index, reload task failed: {}", e);
            }
        }
        state.mtime = mtime;
        state.loaded = true;
    }
}
