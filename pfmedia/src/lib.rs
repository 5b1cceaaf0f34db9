//! # pfmedia - Cache d'images à matérialisation paresseuse
//!
//! Cette crate sert les images exportées de la photothèque sous un nom
//! canonique stable. Une image absente du cache est exportée en tâche de
//! fond ; le client réessaie après `Retry-After` ou attend l'évènement SSE
//! `image-ready`.
//!
//! ## Composants
//!
//! - [`service`] : résolution cache → index → file d'export
//! - [`proxy`] : `GET|HEAD /p/{file}`
//! - [`api`] : `POST /api/prime`, `GET /api/stream`, `GET /api/status`
//! - [`bus`] : diffusion des évènements `image-ready`
//! - [`server_ext`] : montage sur un [`pfserver::Server`]
//!
//! ## Utilisation
//!
//! ```rust,ignore
//! use pfmedia::MediaServerExt;
//!
//! let runtime = server.init_media_configured(&config).await?;
//! server.start().await?;
//! server.wait().await;
//! runtime.shutdown();
//! ```

pub mod api;
pub mod bus;
pub mod config_ext;
pub mod error;
pub mod proxy;
pub mod server_ext;
pub mod service;

pub use api::{MediaApiDoc, create_api_router};
pub use bus::{ImageReady, NotificationBus, Subscription};
pub use config_ext::MediaConfigExt;
pub use error::{MediaError, Result};
pub use proxy::create_proxy_router;
pub use server_ext::{MediaRuntime, MediaServerExt};
pub use service::{MediaService, MediaStatus, Resolution, is_canonical_filename};
