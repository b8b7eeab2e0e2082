use silo_offline_worker::cache::sqlite::SqliteCacheStore;
use silo_offline_worker::push::LogNotifier;
use silo_offline_worker::{HttpFetcher, OfflineWorker, WorkerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use url::Url;

/// Cache priming entry point: boots the worker against the configured
/// application origin, runs install and activate, and leaves the SQLite
/// cache ready for offline use.
#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Storage layout:
    //   - offline_cache.db (SQLite database with both cache generations)
    let app_origin = std::env::var("SILO_APP_ORIGIN")
        .unwrap_or_else(|_| "http://localhost:5173".to_string());
    let app_origin = Url::parse(&app_origin).expect("SILO_APP_ORIGIN must be a valid URL");

    let storage_dir = std::env::var("SILO_STORAGE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./silo-offline-storage"));
    std::fs::create_dir_all(&storage_dir).expect("Failed to create storage directory");

    let caches = Arc::new(
        SqliteCacheStore::new(storage_dir.join("offline_cache.db"))
            .expect("Failed to initialize offline cache store"),
    );
    let fetcher = Arc::new(
        HttpFetcher::new(Some("silo-offline-worker/0.1"))
            .expect("Failed to build HTTP client"),
    );

    let worker = OfflineWorker::new(
        WorkerConfig::new(app_origin.clone()),
        caches,
        fetcher,
        Arc::new(LogNotifier),
    );

    info!("Priming offline caches for {}", app_origin);

    if let Err(e) = worker.handle_install().await {
        error!("Install failed: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = worker.handle_activate().await {
        error!("Activation failed: {}", e);
        std::process::exit(1);
    }

    info!(
        "Offline worker {} ({}); caches stored under {}",
        worker.config().static_cache_name,
        worker.state(),
        storage_dir.display()
    );
}
