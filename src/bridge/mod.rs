// src/bridge/mod.rs
//
// Surface the tray/settings UI talks to: configuration in, status out.
//
use crate::config::{ConfigStore, Configuration, SettingsError, SettingsFile};
use crate::scheduler::Scheduler;
use crate::status::{Status, StatusObserver, StatusPublisher, Subscription};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Configuration applied but could not be persisted: {0}")]
    Persist(#[from] SettingsError),
}

pub struct TrayBridge {
    store: Arc<ConfigStore>,
    scheduler: Arc<Scheduler>,
    publisher: StatusPublisher,
    settings_file: Option<SettingsFile>,
}

impl TrayBridge {
    pub fn new(
        store: Arc<ConfigStore>,
        scheduler: Arc<Scheduler>,
        publisher: StatusPublisher,
    ) -> Self {
        Self {
            store,
            scheduler,
            publisher,
            settings_file: None,
        }
    }

    pub fn with_settings_file(mut self, file: SettingsFile) -> Self {
        self.settings_file = Some(file);
        self
    }

    /// The settings form committed new values. The in-memory swap always
    /// happens, even for invalid values, which the classifier degrades to
    /// `Poor`; persistence failures are reported afterwards.
    pub async fn on_config_changed(&self, cfg: Configuration) -> Result<(), BridgeError> {
        self.apply(cfg.clone());

        if let Some(file) = &self.settings_file {
            if let Err(e) = file.save(&cfg).await {
                error!("Failed to persist settings to {}: {}", file.path().display(), e);
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Apply a configuration that was just read from the settings file, so
    /// nothing is written back.
    pub fn reload_config(&self, cfg: Configuration) {
        self.apply(cfg);
    }

    fn apply(&self, cfg: Configuration) {
        if let Err(e) = cfg.validate() {
            warn!("Accepted invalid configuration: {}", e);
        }

        info!(
            target_host = %cfg.target,
            "Configuration changed: thresholds {}/{}/{} ms",
            cfg.low_ms, cfg.mid_ms, cfg.high_ms
        );
        self.store.replace(cfg);
    }

    /// Prefill for the settings form.
    pub fn request_current_config(&self) -> Configuration {
        (*self.store.get()).clone()
    }

    pub fn subscribe_status(&self, observer: Arc<dyn StatusObserver>) -> Subscription {
        self.publisher.subscribe(observer)
    }

    pub fn current_status(&self) -> Status {
        self.publisher.current()
    }

    pub fn start(&self) -> bool {
        self.scheduler.start()
    }

    pub fn stop(&self) -> bool {
        self.scheduler.stop()
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }
}
