//! Steward Service - Main entry point
//!
//! Starts the background service tasks and runs until the host process is
//! asked to stop.

use std::sync::Arc;

use steward_core::{
    cache::{CacheMaintenance, CacheStore},
    config::Config,
    control::{PauseGate, ShutdownController},
    observability,
    remote::HttpSyncService,
    settings::Settings,
    tasks::{
        BootstrapProfileTask, InitCachesTask, MaintenanceTask, PurgeSubtitlesTask, Supervisor,
        SyncMonitorTask, ViewRefresher,
    },
};

/// View plumbing for the headless service binary: list invalidation hits the
/// cache store directly, widget refreshes are surfaced to the host log.
struct HostViews {
    store: Arc<CacheStore>,
}

impl ViewRefresher for HostViews {
    fn invalidate_lists(&self) {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(error) = store.clear_lists() {
                tracing::warn!(error = %error, "List cache invalidation failed");
            }
        });
    }

    fn refresh_widgets(&self) {
        tracing::info!("Widget refresh requested");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config: {}. Using defaults.", e);
        Config::default()
    });

    // Initialize logging
    observability::init(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Steward Service"
    );

    // Profile settings document (created on first start)
    let settings = Arc::new(Settings::bootstrap(&config.service.data_dir)?);

    // Cache database
    let cache_path = config.service.data_dir.join("cache.db");
    let store = tokio::task::spawn_blocking(move || CacheStore::open(&cache_path)).await??;
    let store = Arc::new(store);

    // Collaborators
    let sync_service = Arc::new(HttpSyncService::new(config.sync.clone()));
    let maintenance = Arc::new(CacheMaintenance::new(store.clone()));
    let views = Arc::new(HostViews {
        store: store.clone(),
    });

    // Shared control primitives
    let controller = ShutdownController::new();
    let pause = Arc::new(PauseGate::new());

    // Register and start the background tasks
    let mut supervisor = Supervisor::new(pause.clone(), settings.clone());
    supervisor
        .register(Arc::new(BootstrapProfileTask::new(env!("CARGO_PKG_VERSION"))))
        .register(Arc::new(PurgeSubtitlesTask::new(
            config.service.temp_dir.clone(),
        )))
        .register(Arc::new(InitCachesTask::new(store.clone())))
        .register(Arc::new(MaintenanceTask::new(
            maintenance,
            config.scheduling.maintenance_interval,
            config.scheduling.grace_delay,
        )))
        .register(Arc::new(SyncMonitorTask::new(
            sync_service,
            views,
            config.scheduling.pause_tick,
            config.scheduling.settle_delay,
        )));

    let handle = supervisor.start(&controller.signal());
    tracing::info!("Background tasks started");

    // Run until asked to stop
    shutdown_signal().await;
    controller.shutdown();

    let stats = handle.join().await;
    tracing::info!(
        completed = stats.completed(),
        failed = stats.failed(),
        "Service shutdown complete"
    );

    Ok(())
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
