// src/probe/executor.rs
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// One successful round-trip sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub elapsed_ms: f64,
}

impl Measurement {
    pub fn new(elapsed_ms: f64) -> Self {
        Self { elapsed_ms }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ProbeFailure {
    #[error("Probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("Probe execution failed: {0}")]
    ExecError(String),

    #[error("No round-trip time found in probe output")]
    Unparseable,
}

/// Fieldless tag of a [`ProbeFailure`], used for log fields and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    Timeout,
    ExecError,
    Unparseable,
}

impl ProbeFailure {
    pub fn reason(&self) -> FailureReason {
        match self {
            ProbeFailure::Timeout(_) => FailureReason::Timeout,
            ProbeFailure::ExecError(_) => FailureReason::ExecError,
            ProbeFailure::Unparseable => FailureReason::Unparseable,
        }
    }
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Timeout => "timeout",
            FailureReason::ExecError => "exec_error",
            FailureReason::Unparseable => "unparseable",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type ProbeResult = Result<Measurement, ProbeFailure>;

/// Runs a single latency measurement.
///
/// Implementations must resolve within `timeout` (returning
/// [`ProbeFailure::Timeout`] otherwise) and must release whatever they
/// started when the returned future is dropped early.
#[async_trait]
pub trait ProbeExecutor: Send + Sync {
    async fn probe(&self, target: &str, timeout: Duration) -> ProbeResult;

    fn name(&self) -> &'static str;
}
