// src/probe/ping.rs
use super::executor::{Measurement, ProbeExecutor, ProbeFailure, ProbeResult};
use crate::config::is_valid_target;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

static ROUND_TRIP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"time[=<]\s*(\d+(?:\.\d+)?)").expect("round-trip pattern is valid")
});

/// Extract the first `time=<ms>` value from ping output.
pub fn parse_round_trip(output: &str) -> Option<f64> {
    ROUND_TRIP
        .captures(output)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Probes a host with the system `ping` utility.
#[derive(Debug, Clone)]
pub struct PingProbe {
    program: String,
    count: u32,
}

impl PingProbe {
    pub fn new(count: u32) -> Self {
        Self {
            program: "ping".to_string(),
            count,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, target: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-c")
            .arg(self.count.to_string())
            .arg(target)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A timed-out probe is dropped mid-wait; take the process with it.
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, target: &str) -> ProbeResult {
        let child = self
            .command(target)
            .spawn()
            .map_err(|e| ProbeFailure::ExecError(format!("{}: {}", self.program, e)))?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ProbeFailure::ExecError(e.to_string()))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() || !stderr.trim().is_empty() {
            return Err(ProbeFailure::ExecError(format!(
                "{} ({})",
                stderr.trim(),
                output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_round_trip(&stdout)
            .map(Measurement::new)
            .ok_or(ProbeFailure::Unparseable)
    }
}

impl Default for PingProbe {
    fn default() -> Self {
        Self::new(4)
    }
}

#[async_trait]
impl ProbeExecutor for PingProbe {
    async fn probe(&self, target: &str, limit: Duration) -> ProbeResult {
        if !is_valid_target(target) {
            return Err(ProbeFailure::ExecError(format!(
                "refusing to probe invalid target {:?}",
                target
            )));
        }

        let start = Instant::now();
        let result = match timeout(limit, self.run(target)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeFailure::Timeout(limit)),
        };

        debug!(
            host = target,
            elapsed = ?start.elapsed(),
            ok = result.is_ok(),
            "ping finished"
        );
        result
    }

    fn name(&self) -> &'static str {
        "ping"
    }
}
