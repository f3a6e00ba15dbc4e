// src/status/model.rs
use chrono::{DateTime, Utc};
use std::fmt;

/// Latency buckets, ordered from "nothing known" to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum StatusLevel {
    #[default]
    Unknown,
    Excellent,
    Good,
    Fair,
    Poor,
}

impl StatusLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusLevel::Unknown => "unknown",
            StatusLevel::Excellent => "excellent",
            StatusLevel::Good => "good",
            StatusLevel::Fair => "fair",
            StatusLevel::Poor => "poor",
        }
    }

    pub fn ordinal(&self) -> i64 {
        *self as i64
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Status {
    pub level: StatusLevel,
    pub latency_ms: Option<f64>,
    pub observed_at: Option<DateTime<Utc>>,
}

impl Status {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn new(level: StatusLevel, latency_ms: Option<f64>) -> Self {
        Self {
            level,
            latency_ms,
            observed_at: None,
        }
    }

    pub fn observed_now(mut self) -> Self {
        self.observed_at = Some(Utc::now());
        self
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.level, self.latency_ms) {
            (StatusLevel::Unknown, _) => f.write_str("Unknown"),
            (_, Some(ms)) => write!(f, "{:.2} ms", ms),
            (_, None) => f.write_str("Error"),
        }
    }
}
