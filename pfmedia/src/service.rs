//! Service média : cache d'images exportées à matérialisation paresseuse
//!
//! Un nom canonique est soit déjà présent dans le répertoire de cache (servi
//! tel quel), soit résolu via l'index vers l'identifiant de la photo et
//! exporté en tâche de fond. La fin de l'export est publiée sur le
//! [`NotificationBus`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use pfexport::{ExportRequest, Exporter};
use pfindex::{IndexMetadata, IndexStore, Lookup, LookupCache};
use pfjobs::{JobQueue, JobStats};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bus::NotificationBus;
use crate::error::{MediaError, Result};

pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);

static CANONICAL_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9]{8}T[0-9]{6}[0-9]{6}Z-.+\.jpg$").expect("valid filename regex")
});

/// Vérifie la grammaire des noms canoniques
pub fn is_canonical_filename(name: &str) -> bool {
    CANONICAL_FILENAME.is_match(name) && !name.contains(['/', '\\'])
}

/// Issue de la résolution d'un nom de fichier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Fichier présent dans le cache
    Cached(PathBuf),
    /// Export en cours ; `enqueued` vaut `false` si un export de cette
    /// photo était déjà en attente ou en cours
    Pending { identifier: String, enqueued: bool },
}

/// État exposé par `GET /api/status`
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MediaStatus {
    pub pending: usize,
    pub running: usize,
    pub completed: u64,
    pub failed: u64,
    pub index_entries: usize,
    pub subscribers: usize,
    pub index: Option<IndexMetadata>,
}

struct ServiceInner {
    cache_dir: PathBuf,
    lookup: LookupCache,
    queue: JobQueue,
    exporter: Arc<dyn Exporter>,
    bus: NotificationBus,
    store: Option<IndexStore>,
    keep_alive: Duration,
}

/// Service partagé entre le proxy et l'API (clonage peu coûteux)
#[derive(Clone)]
pub struct MediaService {
    inner: Arc<ServiceInner>,
}

/// Builder pattern
pub struct MediaServiceBuilder {
    cache_dir: PathBuf,
    lookup: LookupCache,
    exporter: Arc<dyn Exporter>,
    concurrency: usize,
    keep_alive: Duration,
    store: Option<IndexStore>,
    bus: Option<NotificationBus>,
}

impl MediaServiceBuilder {
    /// Nombre d'exports simultanés (default: 1)
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Période des commentaires keep-alive du flux SSE (default: 30 s)
    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Stockage de l'index, pour exposer ses métadonnées dans le statut
    pub fn index_store(mut self, store: IndexStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn bus(mut self, bus: NotificationBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn build(self) -> MediaService {
        MediaService {
            inner: Arc::new(ServiceInner {
                cache_dir: self.cache_dir,
                lookup: self.lookup,
                queue: JobQueue::new(self.concurrency),
                exporter: self.exporter,
                bus: self.bus.unwrap_or_default(),
                store: self.store,
                keep_alive: self.keep_alive,
            }),
        }
    }
}

impl MediaService {
    pub fn builder(
        cache_dir: impl Into<PathBuf>,
        lookup: LookupCache,
        exporter: Arc<dyn Exporter>,
    ) -> MediaServiceBuilder {
        MediaServiceBuilder {
            cache_dir: cache_dir.into(),
            lookup,
            exporter,
            concurrency: 1,
            keep_alive: DEFAULT_KEEP_ALIVE,
            store: None,
            bus: None,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.inner.cache_dir
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.inner.bus
    }

    pub fn queue(&self) -> &JobQueue {
        &self.inner.queue
    }

    pub fn lookup(&self) -> &LookupCache {
        &self.inner.lookup
    }

    pub fn keep_alive(&self) -> Duration {
        self.inner.keep_alive
    }

    /// Chemin de l'artefact dans le cache
    pub fn artifact_path(&self, filename: &str) -> PathBuf {
        self.inner.cache_dir.join(filename)
    }

    /// Indique si l'artefact est déjà matérialisé
    pub async fn is_cached(&self, filename: &str) -> Result<bool> {
        match tokio::fs::metadata(self.artifact_path(filename)).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Valide, consulte le cache puis l'index, et lance l'export si besoin
    pub async fn resolve(&self, filename: &str) -> Result<Resolution> {
        if !is_canonical_filename(filename) {
            return Err(MediaError::Validation(filename.to_string()));
        }

        if self.is_cached(filename).await? {
            return Ok(Resolution::Cached(self.artifact_path(filename)));
        }

        let identifier = self.identify(filename).await?;
        let enqueued = self.enqueue_export(&identifier, filename);
        Ok(Resolution::Pending {
            identifier,
            enqueued,
        })
    }

    /// Identifiant de la photo produisant `filename`
    async fn identify(&self, filename: &str) -> Result<String> {
        match self.inner.lookup.lookup(filename).await {
            Lookup::Found(identifier) => Ok(identifier),
            Lookup::NotFound => {
                info!(filename = %filename, "media_miss_unknown");
                Err(MediaError::NotFound(filename.to_string()))
            }
            Lookup::Ambiguous(identifiers) => {
                warn!(filename = %filename, identifiers = %identifiers.join(","), "filename collision");
                Err(MediaError::Ambiguous {
                    filename: filename.to_string(),
                    identifiers,
                })
            }
        }
    }

    /// Met en file l'export de `identifier` sous le nom `filename`
    ///
    /// Retourne `false` si un export de cette photo est déjà en attente ou
    /// en cours.
    pub fn enqueue_export(&self, identifier: &str, filename: &str) -> bool {
        let exporter = self.inner.exporter.clone();
        let bus = self.inner.bus.clone();
        let cache_dir = self.inner.cache_dir.clone();
        let request = ExportRequest::new(identifier, filename);

        let enqueued = self.inner.queue.enqueue(identifier, async move {
            exporter.export(std::slice::from_ref(&request), &cache_dir).await?;
            bus.publish(request.filename);
            Ok::<(), anyhow::Error>(())
        });

        if enqueued {
            info!(
                filename = %filename,
                identifier = %identifier,
                pending = self.inner.queue.pending(),
                "media_miss_enqueued"
            );
        } else {
            debug!(filename = %filename, identifier = %identifier, "export already in flight");
        }
        enqueued
    }

    /// Prépare des artefacts sans les servir
    ///
    /// Les noms invalides, déjà en cache, inconnus ou ambigus sont ignorés.
    /// Retourne le nombre d'exports réellement ajoutés à la file.
    pub async fn prime<S: AsRef<str>>(&self, filenames: &[S]) -> usize {
        let mut enqueued = 0;
        for filename in filenames {
            let filename = filename.as_ref();
            match self.resolve(filename).await {
                Ok(Resolution::Pending { enqueued: true, .. }) => enqueued += 1,
                Ok(_) => {}
                Err(MediaError::Io(e)) => {
                    warn!(filename = %filename, "prime skipped entry: {}", e);
                }
                Err(_) => {}
            }
        }
        debug!(requested = filenames.len(), enqueued, "prime");
        enqueued
    }

    pub async fn status(&self) -> MediaStatus {
        let JobStats {
            pending,
            running,
            completed,
            failed,
        } = self.inner.queue.stats();

        MediaStatus {
            pending,
            running,
            completed,
            failed,
            index_entries: self.inner.lookup.len().await,
            subscribers: self.inner.bus.subscriber_count(),
            index: self.inner.store.as_ref().and_then(|s| s.read_metadata()),
        }
    }
}
