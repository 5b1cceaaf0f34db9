//! API REST et SSE du cache d'images
//!
//! - `POST /api/prime` : prépare des images sans les servir
//! - `GET /api/stream` : flux SSE des évènements `image-ready`
//! - `GET /api/status` : état de la file d'export et de l'index

use std::convert::Infallible;

use async_stream::stream;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{OpenApi, ToSchema};

use crate::bus::{IMAGE_READY_EVENT, ImageReady};
use crate::service::{MediaService, MediaStatus};

/// Corps attendu par `POST /api/prime`
#[derive(Debug, Deserialize, ToSchema)]
pub struct PrimeRequest {
    /// Noms canoniques à préparer
    pub filenames: Vec<String>,
}

/// Réponse de `POST /api/prime`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PrimeResponse {
    /// Nombre d'exports nouvellement mis en file
    pub enqueued: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Met en file l'export des images demandées
///
/// Les entrées invalides, déjà en cache, inconnues ou ambiguës sont
/// ignorées silencieusement.
#[utoipa::path(
    post,
    path = "/api/prime",
    request_body = PrimeRequest,
    responses(
        (status = 200, description = "Exports mis en file", body = PrimeResponse),
        (status = 400, description = "`filenames` n'est pas un tableau", body = ErrorResponse)
    ),
    tag = "media"
)]
pub async fn prime(State(service): State<MediaService>, Json(body): Json<Value>) -> Response {
    let Some(filenames) = body.get("filenames").and_then(Value::as_array) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "filenames must be an array".to_string(),
            }),
        )
            .into_response();
    };

    let names: Vec<&str> = filenames.iter().filter_map(Value::as_str).collect();
    let enqueued = service.prime(&names).await;

    Json(PrimeResponse { enqueued }).into_response()
}

/// Flux SSE : un évènement `image-ready` par export terminé
#[utoipa::path(
    get,
    path = "/api/stream",
    responses(
        (status = 200, description = "Flux SSE des évènements image-ready", content_type = "text/event-stream", body = ImageReady)
    ),
    tag = "media"
)]
pub async fn image_events(State(service): State<MediaService>) -> impl IntoResponse {
    let mut subscription = service.bus().subscribe();

    let stream = stream! {
        while let Some(event) = subscription.recv().await {
            if let Ok(json) = serde_json::to_string(&event) {
                yield Ok::<_, Infallible>(Event::default().event(IMAGE_READY_EVENT).data(json));
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(service.keep_alive())
            .text("ka"),
    )
}

/// État de la file d'export et de l'index
#[utoipa::path(
    get,
    path = "/api/status",
    responses(
        (status = 200, description = "État courant", body = MediaStatus)
    ),
    tag = "media"
)]
pub async fn status(State(service): State<MediaService>) -> Json<MediaStatus> {
    Json(service.status().await)
}

/// Crée le router de l'API (chemins complets, à fusionner à la racine)
pub fn create_api_router(service: MediaService) -> Router {
    Router::new()
        .route("/api/prime", post(prime))
        .route("/api/stream", get(image_events))
        .route("/api/status", get(status))
        .with_state(service)
}

/// API OpenAPI du cache d'images
#[derive(OpenApi)]
#[openapi(
    paths(prime, image_events, status),
    components(schemas(
        PrimeRequest,
        PrimeResponse,
        ErrorResponse,
        ImageReady,
        MediaStatus,
        pfindex::IndexMetadata
    )),
    tags(
        (name = "media", description = "Lazy export cache for library photos")
    )
)]
pub struct MediaApiDoc;
