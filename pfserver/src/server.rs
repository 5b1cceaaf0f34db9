//! # Module Server - API de haut niveau pour Axum
//!
//! Ce module fournit une abstraction simple pour créer le serveur HTTP de
//! PhotoFilter avec Axum, en cachant la configuration du routage et du
//! démarrage.
//!
//! ## Fonctionnalités
//!
//! - Routes JSON simples avec `add_route()`
//! - Sous-routers (proxy média, API) avec `add_router()`
//! - Documentation OpenAPI/Swagger avec `add_openapi()`
//! - Arrêt gracieux sur Ctrl+C

use crate::logs::{LogState, LoggingOptions, LogsApiDoc, create_logs_router, init_logging};
use anyhow::{Context, Result};
use axum::routing::get;
use axum::{Json, Router};
use pfconfig::Config;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tokio::{signal, task::JoinHandle};
use tracing::{error, info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

const DEFAULT_SERVER_NAME: &str = "PhotoFilter";
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Info serveur sérialisable
#[derive(Clone, Debug, Serialize, utoipa::ToSchema)]
pub struct ServerInfo {
    pub name: String,
    pub bind_address: String,
    pub http_port: u16,
}

/// Serveur principal
pub struct Server {
    name: String,
    bind_address: String,
    http_port: u16,
    shutdown_grace: Duration,
    local_addr: Option<SocketAddr>,
    router: Arc<RwLock<Router>>,
    join_handle: Option<JoinHandle<()>>,
    log_state: Option<LogState>,
}

impl Server {
    /// Crée une nouvelle instance de serveur
    ///
    /// # Arguments
    ///
    /// * `name` - Nom du serveur (pour les logs)
    /// * `bind_address` - Adresse d'écoute (ex: "127.0.0.1")
    /// * `http_port` - Port HTTP à écouter
    pub fn new(name: impl Into<String>, bind_address: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            bind_address: bind_address.into(),
            http_port,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            local_addr: None,
            router: Arc::new(RwLock::new(Router::new())),
            join_handle: None,
            log_state: None,
        }
    }

    /// Crée un serveur à partir de la section `host` de la configuration
    pub fn new_configured(config: &Config) -> Self {
        Self::new(
            DEFAULT_SERVER_NAME,
            config.get_bind_address(),
            config.get_http_port(),
        )
    }

    /// Ajoute une route JSON dynamique
    ///
    /// La closure fournie est appelée à chaque requête GET sur `path`.
    ///
    /// ```rust,no_run
    /// # use pfserver::Server;
    /// # #[tokio::main]
    /// # async fn main() {
    /// # let mut server = Server::new("Test", "127.0.0.1", 3000);
    /// server.add_route("/api/info", || async {
    ///     serde_json::json!({"version": "1.0.0"})
    /// }).await;
    /// # }
    /// ```
    pub async fn add_route<F, Fut, T>(&mut self, path: &str, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let f = Arc::new(f);
        let handler = move || {
            let f = f.clone();
            async move { Json(f().await) }
        };

        let route = Router::new().route("/", get(handler));
        self.add_router(path, route).await;
    }

    /// Ajoute un sous-router au serveur
    ///
    /// - Si `path` est "/", merge directement au router principal
    /// - Sinon, nest le router sous le chemin donné
    pub async fn add_router(&mut self, path: &str, sub_router: Router) {
        let mut r = self.router.write().await;

        *r = if path.trim_matches('/').is_empty() {
            std::mem::take(&mut *r).merge(sub_router)
        } else {
            let normalized = format!("/{}", path.trim_matches('/'));
            std::mem::take(&mut *r).nest(&normalized, sub_router)
        };
    }

    /// Ajoute une API documentée avec OpenAPI et Swagger UI
    ///
    /// Le `api_router` est monté sous `base_path`; la documentation est
    /// servie sous `/swagger-ui/{name}` et `/api-docs/{name}.json`.
    pub async fn add_openapi(
        &mut self,
        base_path: &str,
        api_router: Router,
        openapi: utoipa::openapi::OpenApi,
        name: &str,
    ) {
        let swagger = SwaggerUi::new(format!("/swagger-ui/{}", name))
            .url(format!("/api-docs/{}.json", name), openapi);

        self.add_router(base_path, api_router).await;

        let mut r = self.router.write().await;
        *r = std::mem::take(&mut *r).merge(swagger);
    }

    /// Retourne une copie du router courant (utile pour les tests in-process)
    pub async fn router(&self) -> Router {
        self.router.read().await.clone()
    }

    /// Démarre le serveur HTTP
    ///
    /// L'écoute TCP est ouverte avant de rendre la main : une erreur de bind
    /// est donc remontée à l'appelant. Le service s'arrête sur Ctrl+C.
    pub async fn start(&mut self) -> Result<()> {
        self.start_with_shutdown(async {
            if let Err(e) = signal::ctrl_c().await {
                error!("failed to listen for ctrl_c: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Ctrl+C reçu, arrêt gracieux");
        })
        .await
    }

    /// Démarre le serveur HTTP et l'arrête quand `shutdown` se termine
    ///
    /// Les connexions en cours disposent du délai de grâce pour se terminer ;
    /// au-delà (flux SSE ouverts) le serveur est interrompu.
    pub async fn start_with_shutdown<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.bind_address, self.http_port)
            .parse()
            .with_context(|| format!("invalid bind address {}", self.bind_address))?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("cannot listen on {}", addr))?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        info!("Server {} running at http://{}", self.name, local_addr);

        let router = self.router.read().await.clone();
        let stop = Arc::new(Notify::new());
        let graceful = stop.clone();

        let mut server_task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router.into_make_service())
                .with_graceful_shutdown(async move { graceful.notified().await })
                .await
            {
                error!("HTTP server error: {}", e);
            }
        });

        let grace = self.shutdown_grace;
        self.join_handle = Some(tokio::spawn(async move {
            tokio::select! {
                _ = &mut server_task => return,
                _ = shutdown => {}
            }

            stop.notify_one();
            if tokio::time::timeout(grace, &mut server_task).await.is_err() {
                warn!("connections still open after {:?}, closing", grace);
                server_task.abort();
            }
        }));

        Ok(())
    }

    /// Adresse effectivement écoutée, une fois le serveur démarré
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Attend la fin du serveur
    pub async fn wait(&mut self) {
        if let Some(h) = self.join_handle.take() {
            let _ = h.await;
        }
    }

    /// Récupère les infos du serveur
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            name: self.name.clone(),
            bind_address: self.bind_address.clone(),
            http_port: self.http_port,
        }
    }

    /// Initialise le système de logging et enregistre les routes `/api/log_setup`
    pub async fn init_logging(&mut self, options: LoggingOptions) {
        let log_state = init_logging(options);

        self.add_openapi(
            "/api",
            create_logs_router(log_state.clone()),
            LogsApiDoc::openapi(),
            "logs",
        )
        .await;

        self.log_state = Some(log_state);
    }

    pub fn log_state(&self) -> Option<&LogState> {
        self.log_state.as_ref()
    }
}

/// Builder pattern
pub struct ServerBuilder {
    name: String,
    bind_address: String,
    http_port: u16,
    shutdown_grace: Duration,
}

impl ServerBuilder {
    pub fn new(name: impl Into<String>, bind_address: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            bind_address: bind_address.into(),
            http_port,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn new_configured(config: &Config) -> Self {
        Self {
            name: DEFAULT_SERVER_NAME.to_string(),
            bind_address: config.get_bind_address(),
            http_port: config.get_http_port(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Délai accordé aux connexions ouvertes à l'arrêt (default: 5 s)
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Construit le serveur
    pub fn build(self) -> Server {
        let mut server = Server::new(self.name, self.bind_address, self.http_port);
        server.shutdown_grace = self.shutdown_grace;
        server
    }
}
