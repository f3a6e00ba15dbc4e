// src/main.rs
use anyhow::{Context, Result};
use pingtray::{
    bridge::TrayBridge,
    config::{self, ConfigStore, SettingsFile},
    metrics::MetricsRegistry,
    probe::PingProbe,
    scheduler::{Scheduler, SchedulerSettings},
    status::{Status, StatusObserver, StatusPublisher},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{debug, error, info, warn};

/// Stands in for the tray icon: renders each status change as a log line.
struct LogObserver;

impl StatusObserver for LogObserver {
    fn on_status_changed(&self, status: &Status) {
        info!(level = status.level.as_str(), "Status: {}", status);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load application settings before tracing so the filter can come from them
    let settings_path = std::env::args().nth(1).map(PathBuf::from);
    let app = config::load_app_settings(settings_path.as_deref())?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&app.log_filter))
                .context("Invalid log filter")?,
        )
        .init();

    match &settings_path {
        Some(path) => info!("Loaded application settings from: {}", path.display()),
        None => info!("Using built-in application settings"),
    }

    // Load persisted thresholds
    let settings_file = SettingsFile::new(app.settings_path.clone());
    info!("Loading thresholds from: {}", settings_file.path().display());
    let initial = settings_file.load().await?;
    if let Err(e) = initial.validate() {
        warn!("Persisted configuration is invalid: {}", e);
    }

    // Initialize metrics
    let metrics_registry = MetricsRegistry::new()?;
    let metrics = metrics_registry.collector();

    let store = Arc::new(ConfigStore::new(initial));
    let publisher = StatusPublisher::new();
    let probe = Arc::new(PingProbe::new(app.ping_count).with_program(app.ping_program.clone()));

    let scheduler = Arc::new(Scheduler::with_metrics(
        store.clone(),
        probe,
        publisher.clone(),
        SchedulerSettings {
            period: app.tick_period(),
            probe_timeout: app.probe_timeout(),
        },
        metrics,
    ));

    let bridge = TrayBridge::new(store, scheduler.clone(), publisher)
        .with_settings_file(settings_file.clone());
    let _tray = bridge.subscribe_status(Arc::new(LogObserver));

    bridge.start();

    run_until_shutdown(&bridge, &settings_file).await;

    scheduler.shutdown().await;
    match metrics_registry.gather() {
        Ok(text) => debug!("Final metrics:\n{}", text),
        Err(e) => error!("Failed to encode metrics: {}", e),
    }

    Ok(())
}

/// Wait for Ctrl+C / SIGTERM. On unix, SIGHUP re-reads the thresholds file,
/// which is how an external settings editor pushes changes in.
async fn run_until_shutdown(bridge: &TrayBridge, settings_file: &SettingsFile) {
    #[cfg(unix)]
    {
        let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
            Ok(hangup) => hangup,
            Err(e) => {
                warn!("Failed to install SIGHUP handler, reload disabled: {}", e);
                shutdown_signal().await;
                return;
            }
        };

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => return,
                _ = hangup.recv() => {
                    info!("SIGHUP received, reloading {}", settings_file.path().display());
                    match settings_file.load().await {
                        Ok(cfg) => bridge.reload_config(cfg),
                        Err(e) => error!("Failed to reload settings: {}", e),
                    }
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = (bridge, settings_file);
        shutdown_signal().await;
    }
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
