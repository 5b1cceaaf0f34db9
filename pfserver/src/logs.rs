//! Initialisation du logging `tracing` et API de réglage du niveau à chaud.

use std::sync::{Arc, RwLock};

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use pfconfig::Config;
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{
    Registry, filter::LevelFilter, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

const AVAILABLE_LEVELS: [&str; 5] = ["ERROR", "WARN", "INFO", "DEBUG", "TRACE"];

/// Options d'initialisation du système de logging
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Niveau minimum au démarrage
    pub min_level: Level,
    /// Activer la sortie vers stderr/stdout
    pub enable_console: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            min_level: Level::INFO,
            enable_console: true,
        }
    }
}

impl LoggingOptions {
    /// Construit les options depuis la section `host.logger` de la configuration
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            min_level: string_to_level(&config.get_log_min_level()).unwrap_or(defaults.min_level),
            enable_console: config
                .get_log_enable_console()
                .unwrap_or(defaults.enable_console),
        }
    }
}

/// État partagé du logging : niveau courant et handle de rechargement du filtre
#[derive(Clone)]
pub struct LogState {
    max_level: Arc<RwLock<Level>>,
    reload_handle: Option<reload::Handle<LevelFilter, Registry>>,
}

impl LogState {
    fn new(level: Level, reload_handle: Option<reload::Handle<LevelFilter, Registry>>) -> Self {
        Self {
            max_level: Arc::new(RwLock::new(level)),
            reload_handle,
        }
    }

    pub fn set_max_level(&self, level: Level) {
        if let Ok(mut current) = self.max_level.write() {
            *current = level;
        }

        if let Some(handle) = &self.reload_handle {
            if let Err(e) = handle.reload(LevelFilter::from_level(level)) {
                tracing::warn!("Failed to reload log level filter: {}", e);
            }
        }
    }

    pub fn get_max_level(&self) -> Level {
        self.max_level
            .read()
            .map(|level| *level)
            .unwrap_or(Level::INFO)
    }
}

/// Initialise le système de logging avec un filtre rechargeable
///
/// Si un subscriber global est déjà installé (tests, double init), le
/// `LogState` retourné reste utilisable mais ne pilote aucun filtre.
pub fn init_logging(options: LoggingOptions) -> LogState {
    let (filter, reload_handle) = reload::Layer::new(LevelFilter::from_level(options.min_level));

    // L'ordre est important : le filtre doit être appliqué en premier
    let subscriber = Registry::default().with(filter);

    let installed = if options.enable_console {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true),
            )
            .try_init()
            .is_ok()
    } else {
        subscriber.try_init().is_ok()
    };

    LogState::new(options.min_level, installed.then_some(reload_handle))
}

/// Request body pour la configuration du logging
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LogSetupRequest {
    pub level: String,
}

/// Response pour la configuration du logging
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LogSetupResponse {
    pub current_level: String,
    pub available_levels: Vec<String>,
}

impl LogSetupResponse {
    fn new(level: Level) -> Self {
        Self {
            current_level: level.as_str().to_string(),
            available_levels: AVAILABLE_LEVELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// Handler pour GET /api/log_setup - retourne la configuration actuelle
#[utoipa::path(
    get,
    path = "/api/log_setup",
    responses(
        (status = 200, description = "Log configuration retrieved successfully", body = LogSetupResponse)
    ),
    tag = "logs"
)]
pub async fn log_setup_get(State(state): State<LogState>) -> impl IntoResponse {
    Json(LogSetupResponse::new(state.get_max_level()))
}

/// Handler pour POST /api/log_setup - met à jour le niveau de log
#[utoipa::path(
    post,
    path = "/api/log_setup",
    request_body = LogSetupRequest,
    responses(
        (status = 200, description = "Log level updated successfully", body = LogSetupResponse),
        (status = 400, description = "Invalid log level")
    ),
    tag = "logs"
)]
pub async fn log_setup_post(
    State(state): State<LogState>,
    Json(payload): Json<LogSetupRequest>,
) -> impl IntoResponse {
    let Some(level) = string_to_level(&payload.level) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "Invalid log level. Must be one of: ERROR, WARN, INFO, DEBUG, TRACE"
            })),
        )
            .into_response();
    };

    state.set_max_level(level);
    tracing::info!("Log level changed to: {}", level);

    (StatusCode::OK, Json(LogSetupResponse::new(level))).into_response()
}

pub fn string_to_level(s: &str) -> Option<Level> {
    match s.trim().to_uppercase().as_str() {
        "ERROR" => Some(Level::ERROR),
        "WARN" => Some(Level::WARN),
        "INFO" => Some(Level::INFO),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        _ => None,
    }
}

/// Crée le router pour l'API de gestion des logs
pub fn create_logs_router(log_state: LogState) -> axum::Router {
    use axum::routing::get;
    axum::Router::new()
        .route("/log_setup", get(log_setup_get).post(log_setup_post))
        .with_state(log_state)
}

/// API OpenAPI pour la gestion des logs
#[derive(utoipa::OpenApi)]
#[openapi(
    paths(
        log_setup_get,
        log_setup_post,
    ),
    components(
        schemas(LogSetupRequest, LogSetupResponse)
    ),
    tags(
        (name = "logs", description = "Log level configuration endpoints")
    )
)]
pub struct LogsApiDoc;
