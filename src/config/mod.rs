// src/config/mod.rs
mod models;
mod store;

pub use models::*;
pub use store::ConfigStore;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON settings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse YAML settings: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Load application settings: built-in defaults, then the optional file,
/// then `PINGTRAY_*` environment variables.
pub fn load_app_settings(path: Option<&Path>) -> Result<AppSettings> {
    let mut builder = ::config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(::config::File::from(path).required(true));
    }

    let settings: AppSettings = builder
        .add_source(::config::Environment::with_prefix("PINGTRAY").try_parsing(true))
        .build()
        .context("Failed to build application settings")?
        .try_deserialize()
        .context("Failed to deserialize application settings")?;

    settings.validate()?;
    Ok(settings)
}

/// The persisted thresholds record (`time2`, `time3`, `time4`, `ip`).
#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_yaml(&self) -> bool {
        matches!(
            self.path.extension().and_then(|s| s.to_str()),
            Some("yaml") | Some("yml")
        )
    }

    /// Missing file means the built-in defaults; a malformed one is an error.
    pub async fn load(&self) -> Result<Configuration, SettingsError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "No persisted settings at {}, using defaults",
                    self.path.display()
                );
                return Ok(Configuration::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let persisted: PersistedSettings = if self.is_yaml() {
            serde_yaml::from_str(&contents)?
        } else {
            serde_json::from_str(&contents)?
        };

        Ok(persisted.into())
    }

    /// Written to a sibling temp file first, then renamed over the target.
    pub async fn save(&self, cfg: &Configuration) -> Result<(), SettingsError> {
        let persisted = PersistedSettings::from(cfg.clone());
        let contents = if self.is_yaml() {
            serde_yaml::to_string(&persisted)?
        } else {
            serde_json::to_string_pretty(&persisted)?
        };

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let io_err = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };
        tokio::fs::write(&tmp, contents).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;

        debug!("Persisted settings to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file = SettingsFile::new(dir.path().join("absent.json"));
        assert_eq!(file.load().await.unwrap(), Configuration::default());
    }

    #[tokio::test]
    async fn test_save_then_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let file = SettingsFile::new(dir.path().join("time-settings.json"));
        let cfg = Configuration::new(20.0, 80.0, 200.0, "1.1.1.1");

        file.save(&cfg).await.unwrap();
        assert_eq!(file.load().await.unwrap(), cfg);

        let raw = std::fs::read_to_string(file.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["time2"], 20.0);
        assert_eq!(value["time3"], 80.0);
        assert_eq!(value["time4"], 200.0);
        assert_eq!(value["ip"], "1.1.1.1");
    }

    #[tokio::test]
    async fn test_reads_record_written_by_settings_form() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("time-settings.json");
        std::fs::write(&path, r#"{"time2": 40, "time3": 90, "time4": 300, "ip": "9.9.9.9"}"#)
            .unwrap();

        let cfg = SettingsFile::new(path).load().await.unwrap();
        assert_eq!(cfg, Configuration::new(40.0, 90.0, 300.0, "9.9.9.9"));
    }

    #[tokio::test]
    async fn test_yaml_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let file = SettingsFile::new(dir.path().join("time-settings.yaml"));
        let cfg = Configuration::new(5.0, 10.0, 15.0, "localhost");

        file.save(&cfg).await.unwrap();
        let raw = std::fs::read_to_string(file.path()).unwrap();
        assert!(raw.contains("time2:"));
        assert_eq!(file.load().await.unwrap(), cfg);
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("time-settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = SettingsFile::new(path).load().await.unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn test_app_settings_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pingtray.yaml");
        std::fs::write(&path, "tick_period_ms: 250\nping_count: 2\n").unwrap();

        let settings = load_app_settings(Some(&path)).unwrap();
        assert_eq!(settings.tick_period_ms, 250);
        assert_eq!(settings.ping_count, 2);
        assert_eq!(settings.probe_timeout_ms, 5000);
        assert_eq!(settings.ping_program, "ping");
    }

    #[derive(Clone, Default)]
    struct CapturedLog(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    // Runs before the subscriber exists in the binary, so it must stay silent.
    #[test]
    fn test_app_settings_load_emits_no_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pingtray.yaml");
        std::fs::write(&path, "tick_period_ms: 250\n").unwrap();

        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_writer(move || writer.clone())
            .finish();

        let settings = tracing::subscriber::with_default(subscriber, || {
            load_app_settings(Some(&path)).unwrap()
        });

        assert_eq!(settings.tick_period_ms, 250);
        assert!(log.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_app_settings_rejects_zero_period() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pingtray.yaml");
        std::fs::write(&path, "tick_period_ms: 0\n").unwrap();

        assert!(load_app_settings(Some(&path)).is_err());
    }
}
