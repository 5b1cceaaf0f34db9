//! Index freshness monitor
//!
//! Compares the source library modification signal with the one recorded in
//! the metadata sidecar and rebuilds the index when they differ. Rebuilds are
//! single-flight: concurrent callers wait on one mutex and re-check freshness
//! once they hold it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::builder::{CollisionPolicy, build_index};
use crate::error::Result;
use crate::lookup::LookupCache;
use crate::source::SourceLibrary;
use crate::store::{IndexMetadata, IndexStore};
use crate::template::FilenameTemplate;

/// What [`IndexMonitor::ensure_fresh`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The index already matched the library
    Fresh,
    Rebuilt {
        entries: usize,
        collisions: usize,
        skipped: usize,
    },
}

struct MonitorInner {
    source: Arc<dyn SourceLibrary>,
    store: IndexStore,
    template: FilenameTemplate,
    policy: CollisionPolicy,
    lookup: LookupCache,
    rebuild_lock: Mutex<()>,
    rebuilds: AtomicU64,
}

/// Keeps the on-disk index in sync with the source library
#[derive(Clone)]
pub struct IndexMonitor {
    inner: Arc<MonitorInner>,
}

impl IndexMonitor {
    pub fn new(
        source: Arc<dyn SourceLibrary>,
        store: IndexStore,
        template: FilenameTemplate,
        policy: CollisionPolicy,
        lookup: LookupCache,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                source,
                store,
                template,
                policy,
                lookup,
                rebuild_lock: Mutex::new(()),
                rebuilds: AtomicU64::new(0),
            }),
        }
    }

    pub fn store(&self) -> &IndexStore {
        &self.inner.store
    }

    pub fn lookup(&self) -> &LookupCache {
        &self.inner.lookup
    }

    /// Number of successful rebuilds since creation
    pub fn rebuild_count(&self) -> u64 {
        self.inner.rebuilds.load(Ordering::SeqCst)
    }

    /// Current metadata sidecar, if an index was ever built
    pub fn metadata(&self) -> Option<IndexMetadata> {
        self.inner.store.read_metadata()
    }

    /// Rebuilds the index if it is missing or older than the library
    pub async fn ensure_fresh(&self) -> Result<RefreshOutcome> {
        let _guard = self.inner.rebuild_lock.lock().await;
        self.inner.refresh(false).await
    }

    /// Rebuilds the index unconditionally
    pub async fn force_rebuild(&self) -> Result<RefreshOutcome> {
        let _guard = self.inner.rebuild_lock.lock().await;
        self.inner.refresh(true).await
    }

    /// Checks freshness now and then every `interval`
    ///
    /// A tick that finds a rebuild in progress is skipped. Failures are
    /// logged and the previous index stays in service.
    pub fn spawn_periodic(&self, interval: Duration) -> JoinHandle<()> {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let Ok(_guard) = inner.rebuild_lock.try_lock() else {
                    debug!("index rebuild already running, skipping tick");
                    continue;
                };
                // Erreur déjà journalisée par refresh()
                let _ = inner.refresh(false).await;
            }
        })
    }
}

impl MonitorInner {
    async fn is_stale(&self, library_modified: &DateTime<Utc>) -> bool {
        if !tokio::fs::try_exists(self.store.index_path())
            .await
            .unwrap_or(false)
        {
            return true;
        }
        match self.store.read_metadata() {
            Some(meta) => meta.source_library_modified_at != *library_modified,
            None => true,
        }
    }

    /// Must be called with `rebuild_lock` held
    async fn refresh(&self, force: bool) -> Result<RefreshOutcome> {
        let outcome = self.try_refresh(force).await;
        if let Err(e) = &outcome {
            error!(
                dir = %self.store.dir().display(),
                "index rebuild failed, keeping previous index: {}", e
            );
        }
        outcome
    }

    async fn try_refresh(&self, force: bool) -> Result<RefreshOutcome> {
        let library_modified = self.source.last_modified().await?;

        if !force && !self.is_stale(&library_modified).await {
            debug!(library = %self.source.location(), "index is fresh");
            return Ok(RefreshOutcome::Fresh);
        }

        let started = Instant::now();
        info!(library = %self.source.location(), "rebuilding filename index");

        let records = self.source.records().await?;
        let template = self.template.clone();
        let policy = self.policy;
        let store = self.store.clone();

        let built = tokio::task::spawn_blocking(move || -> Result<_> {
            let built = build_index(&records, &template, policy);
            store.install(&built)?;
            store.write_metadata(&IndexMetadata {
                source_library_modified_at: library_modified,
                generated_at: Utc::now(),
            })?;
            Ok(built)
        })
        .await??;

        self.lookup.reload().await;
        self.rebuilds.fetch_add(1, Ordering::SeqCst);

        info!(
            entries = built.index.len(),
            collisions = built.collisions.len(),
            skipped = built.skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "filename index rebuilt"
        );

        Ok(RefreshOutcome::Rebuilt {
            entries: built.index.len(),
            collisions: built.collisions.len(),
            skipped: built.skipped,
        })
    }
}
