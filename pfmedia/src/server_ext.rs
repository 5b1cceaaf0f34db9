//! Extension pfserver : montage du proxy, de l'API et du moniteur d'index

use std::sync::Arc;

use pfconfig::Config;
use pfexport::ExportConfigExt;
use pfindex::{IndexConfigExt, IndexMonitor, LookupCache};
use pfserver::Server;
use tokio::task::JoinHandle;
use tracing::info;
use utoipa::OpenApi;

use crate::api::{MediaApiDoc, create_api_router};
use crate::config_ext::MediaConfigExt;
use crate::proxy::create_proxy_router;
use crate::service::MediaService;

/// Services démarrés par [`MediaServerExt::init_media_configured`]
pub struct MediaRuntime {
    pub service: MediaService,
    pub monitor: IndexMonitor,
    monitor_task: JoinHandle<()>,
}

impl MediaRuntime {
    /// Arrête la vérification périodique de l'index
    pub fn shutdown(self) {
        self.monitor_task.abort();
        info!("index monitor stopped");
    }
}

/// Trait pour étendre Server avec le cache d'images
#[async_trait::async_trait]
pub trait MediaServerExt {
    /// Monte le proxy sous `route` et l'API sous `/api`
    async fn init_media(&mut self, service: MediaService, route: &str);

    /// Construit tous les services depuis la configuration et les monte
    ///
    /// Le moniteur d'index vérifie la photothèque immédiatement puis
    /// périodiquement ; une reconstruction qui échoue n'empêche pas le
    /// démarrage.
    async fn init_media_configured(&mut self, config: &Config) -> anyhow::Result<MediaRuntime>;
}

#[async_trait::async_trait]
impl MediaServerExt for Server {
    async fn init_media(&mut self, service: MediaService, route: &str) {
        self.add_router(route, create_proxy_router(service.clone()))
            .await;
        self.add_openapi("/", create_api_router(service), MediaApiDoc::openapi(), "media")
            .await;
        info!(route = %route, "media proxy mounted");
    }

    async fn init_media_configured(&mut self, config: &Config) -> anyhow::Result<MediaRuntime> {
        let store = config.create_index_store()?;
        let lookup = LookupCache::new(store.index_path());
        let osxphotos = Arc::new(config.create_osxphotos());

        let monitor = IndexMonitor::new(
            osxphotos.clone(),
            store.clone(),
            config.get_filename_template()?,
            config.get_collision_policy()?,
            lookup.clone(),
        );

        let service = MediaService::builder(config.get_media_cache_dir()?, lookup, osxphotos)
            .concurrency(config.get_export_concurrency())
            .keep_alive(config.get_notifications_keep_alive())
            .index_store(store)
            .build();

        self.init_media(service.clone(), &config.get_media_route())
            .await;

        let monitor_task = monitor.spawn_periodic(config.get_index_refresh_interval());

        Ok(MediaRuntime {
            service,
            monitor,
            monitor_task,
        })
    }
}
