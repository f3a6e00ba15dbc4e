// src/config/models.rs
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LOW_MS: f64 = 51.0;
pub const DEFAULT_MID_MS: f64 = 151.0;
pub const DEFAULT_HIGH_MS: f64 = 351.0;
pub const DEFAULT_TARGET: &str = "8.8.8.8";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Thresholds must be finite and ascending (0 <= low < mid < high), got {low}/{mid}/{high}")]
    InvalidThresholds { low: f64, mid: f64, high: f64 },

    #[error("Invalid probe target: {0:?}")]
    InvalidTarget(String),

    #[error("Invalid application setting: {0}")]
    InvalidSetting(String),
}

/// Thresholds and target the sampler works against.
///
/// Always replaced as a whole; the sampler only ever reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub low_ms: f64,
    pub mid_ms: f64,
    pub high_ms: f64,
    pub target: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            low_ms: DEFAULT_LOW_MS,
            mid_ms: DEFAULT_MID_MS,
            high_ms: DEFAULT_HIGH_MS,
            target: DEFAULT_TARGET.to_string(),
        }
    }
}

impl Configuration {
    pub fn new(low_ms: f64, mid_ms: f64, high_ms: f64, target: impl Into<String>) -> Self {
        Self {
            low_ms,
            mid_ms,
            high_ms,
            target: target.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [self.low_ms, self.mid_ms, self.high_ms];
        let ascending =
            self.low_ms >= 0.0 && self.low_ms < self.mid_ms && self.mid_ms < self.high_ms;
        if thresholds.iter().any(|t| !t.is_finite()) || !ascending {
            return Err(ConfigError::InvalidThresholds {
                low: self.low_ms,
                mid: self.mid_ms,
                high: self.high_ms,
            });
        }

        if !is_valid_target(&self.target) {
            return Err(ConfigError::InvalidTarget(self.target.clone()));
        }

        Ok(())
    }
}

/// A target is handed to `ping` as a single argument, so it must not look
/// like an option or contain whitespace.
pub fn is_valid_target(target: &str) -> bool {
    !target.is_empty()
        && !target.starts_with('-')
        && !target.chars().any(char::is_whitespace)
}

/// On-disk record of the thresholds, field names kept compatible with the
/// settings form (`time2..time4`, `ip`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSettings {
    pub time2: f64,
    pub time3: f64,
    pub time4: f64,
    pub ip: String,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Configuration::default().into()
    }
}

impl From<PersistedSettings> for Configuration {
    fn from(p: PersistedSettings) -> Self {
        Configuration::new(p.time2, p.time3, p.time4, p.ip)
    }
}

impl From<Configuration> for PersistedSettings {
    fn from(c: Configuration) -> Self {
        Self {
            time2: c.low_ms,
            time3: c.mid_ms,
            time4: c.high_ms,
            ip: c.target,
        }
    }
}

/// Process-level settings: cadence, probe command and where the thresholds
/// record lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_ping_count")]
    pub ping_count: u32,
    #[serde(default = "default_ping_program")]
    pub ping_program: String,
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_tick_period_ms() -> u64 {
    1000
}

fn default_probe_timeout_ms() -> u64 {
    5000
}

fn default_ping_count() -> u32 {
    4
}

fn default_ping_program() -> String {
    "ping".to_string()
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("time-settings.json")
}

fn default_log_filter() -> String {
    "pingtray=debug".to_string()
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            tick_period_ms: default_tick_period_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            ping_count: default_ping_count(),
            ping_program: default_ping_program(),
            settings_path: default_settings_path(),
            log_filter: default_log_filter(),
        }
    }
}

impl AppSettings {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_period_ms == 0 {
            return Err(ConfigError::InvalidSetting(
                "tick_period_ms must be greater than 0".to_string(),
            ));
        }
        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::InvalidSetting(
                "probe_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.ping_count == 0 {
            return Err(ConfigError::InvalidSetting(
                "ping_count must be greater than 0".to_string(),
            ));
        }
        if self.ping_program.trim().is_empty() {
            return Err(ConfigError::InvalidSetting(
                "ping_program must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_builtin_thresholds() {
        let cfg = Configuration::default();
        assert_eq!(cfg.low_ms, 51.0);
        assert_eq!(cfg.mid_ms, 151.0);
        assert_eq!(cfg.high_ms, 351.0);
        assert_eq!(cfg.target, "8.8.8.8");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_order_thresholds() {
        let cfg = Configuration::new(150.0, 50.0, 350.0, "1.1.1.1");
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidThresholds { .. })
        ));

        let equal = Configuration::new(50.0, 50.0, 350.0, "1.1.1.1");
        assert!(equal.validate().is_err());

        let negative = Configuration::new(-1.0, 50.0, 350.0, "1.1.1.1");
        assert!(negative.validate().is_err());

        let nan = Configuration::new(f64::NAN, 50.0, 350.0, "1.1.1.1");
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_targets() {
        for target in ["", "-f", "8.8.8.8 -c 1000", "host\tname"] {
            let cfg = Configuration::new(50.0, 150.0, 350.0, target);
            assert_eq!(
                cfg.validate(),
                Err(ConfigError::InvalidTarget(target.to_string()))
            );
        }
    }

    #[test]
    fn test_persisted_field_mapping() {
        let cfg = Configuration::new(10.0, 20.0, 30.0, "example.org");
        let persisted: PersistedSettings = cfg.clone().into();
        assert_eq!(persisted.time2, 10.0);
        assert_eq!(persisted.time3, 20.0);
        assert_eq!(persisted.time4, 30.0);
        assert_eq!(persisted.ip, "example.org");
        assert_eq!(Configuration::from(persisted), cfg);
    }

    #[test]
    fn test_app_settings_validation() {
        assert!(AppSettings::default().validate().is_ok());

        let settings = AppSettings {
            tick_period_ms: 0,
            ..AppSettings::default()
        };
        assert!(settings.validate().is_err());

        let settings = AppSettings {
            ping_count: 0,
            ..AppSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
