//! Proxy HTTP des images exportées
//!
//! ## Routes
//!
//! - `GET /p/{file}` : sert l'image si elle est en cache
//! - `HEAD /p/{file}` : mêmes statuts et en-têtes, sans corps
//!
//! ## Codes de retour
//!
//! | Cas | Statut |
//! |---|---|
//! | image en cache | 200, `Cache-Control: public, max-age=31536000, immutable` |
//! | nom invalide | 400 |
//! | nom inconnu de l'index | 404, `Retry-After: 4` |
//! | collision de noms | 409 |
//! | export lancé ou déjà en cours | 404, `Retry-After: 2` |

use std::path::Path as FsPath;

use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use pfexport::mime_type_for;
use tokio_util::io::ReaderStream;
use tracing::{debug, error};

use crate::error::{MediaError, RETRY_AFTER_PENDING};
use crate::service::{MediaService, Resolution};

pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Handler commun à GET et HEAD
async fn serve_media(
    State(service): State<MediaService>,
    method: Method,
    Path(file): Path<String>,
) -> Response {
    match service.resolve(&file).await {
        Ok(Resolution::Cached(path)) => {
            debug!(filename = %file, "media_hit");
            match serve_artifact(&path, method == Method::HEAD).await {
                Ok(response) => response,
                Err(e) => {
                    error!(filename = %file, "media proxy error: {}", e);
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
        Ok(Resolution::Pending { .. }) => (
            StatusCode::NOT_FOUND,
            [(header::RETRY_AFTER, RETRY_AFTER_PENDING)],
        )
            .into_response(),
        Err(MediaError::Io(e)) => {
            error!(filename = %file, "media proxy error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Réponse 200 pour un artefact présent, corps streamé sauf pour HEAD
async fn serve_artifact(path: &FsPath, head: bool) -> std::io::Result<Response> {
    let file = tokio::fs::File::open(path).await?;
    let length = file.metadata().await?.len();

    let body = if head {
        Body::empty()
    } else {
        Body::from_stream(ReaderStream::new(file))
    };

    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(IMMUTABLE_CACHE_CONTROL),
    );
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(mime_type_for(path)),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    Ok(response)
}

/// Crée le router du proxy, à monter sous la route configurée (`/p`)
pub fn create_proxy_router(service: MediaService) -> Router {
    Router::new()
        .route("/{file}", get(serve_media).head(serve_media))
        .with_state(service)
}
