use pfconfig::get_config;
use pfmedia::MediaServerExt;
use pfserver::{LoggingOptions, ServerBuilder};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_config();

    let mut server = ServerBuilder::new_configured(&config).build();
    server
        .init_logging(LoggingOptions::from_config(&config))
        .await;

    let server_info = server.info();
    server
        .add_route("/api/info", move || {
            let server_info = server_info.clone();
            async move {
                serde_json::json!({
                    "name": server_info.name,
                    "version": env!("CARGO_PKG_VERSION"),
                    "bind_address": server_info.bind_address,
                    "http_port": server_info.http_port,
                })
            }
        })
        .await;

    // ========== Cache d'images ==========
    info!("🖼️ Initializing media cache...");
    let runtime = server.init_media_configured(&config).await?;
    info!(
        cache_dir = %runtime.service.cache_dir().display(),
        index = %runtime.monitor.store().dir().display(),
        "media cache ready"
    );

    // ========== Démarrage du serveur ==========
    server.start().await?;
    info!("✅ PhotoFilter is ready!");
    info!("Press Ctrl+C to stop...");
    server.wait().await;

    runtime.shutdown();
    Ok(())
}
