//! # pfserver - Serveur web haut niveau basé sur Axum
//!
//! Cette crate fournit le socle HTTP de PhotoFilter : un [`Server`] qui
//! agrège les routers des autres crates (proxy média, API de priming, flux
//! SSE), publie leur documentation OpenAPI et installe le logging `tracing`.
//!
//! ## Exemple d'utilisation
//!
//! ```rust,no_run
//! use pfserver::{ServerBuilder, logs::LoggingOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = ServerBuilder::new("PhotoFilter", "127.0.0.1", 3000).build();
//!     server.init_logging(LoggingOptions::default()).await;
//!     server.add_route("/api/info", || async {
//!         serde_json::json!({"status": "ok"})
//!     }).await;
//!     server.start().await?;
//!     server.wait().await;
//!     Ok(())
//! }
//! ```

pub mod logs;
pub mod server;

pub use logs::{LogState, LoggingOptions};
pub use server::{Server, ServerBuilder, ServerInfo};
