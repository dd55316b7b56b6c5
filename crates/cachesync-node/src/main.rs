use cachesync_node::bootstrap;
use cachesync_node::config::loader::{CONFIG_PATH_ENV, config_path, load_config};
use cachesync_node::observability::init_tracing;

#[tokio::main]
async fn main() {
    let dotenv = dotenvy::dotenv();

    let (path, origin) = config_path(
        std::env::args().skip(1),
        std::env::var(CONFIG_PATH_ENV).ok(),
    );
    let cfg = match load_config(Some(&path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error ({path}): {e}");
            std::process::exit(2);
        }
    };

    init_tracing(&cfg.logging);
    if let Err(e) = dotenv {
        // A missing .env is fine
        if !e.not_found() {
            tracing::warn!(error = %e, "failed to load .env file");
        }
    }
    tracing::info!(path = %path, origin = %origin, "configuration loaded");

    let node = match bootstrap::start(&cfg).await {
        Ok(node) => node,
        Err(e) => {
            let error = format!("{e:#}");
            tracing::error!(error = %error, "startup failed");
            std::process::exit(1);
        }
    };

    match serde_json::to_string(&node.admin().info()) {
        Ok(info) => tracing::info!(info = %info, "cache sync status"),
        Err(e) => tracing::warn!(error = %e, "failed to render cache sync status"),
    }

    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
    node.shutdown();
}
