// src/status/classifier.rs
use super::{Status, StatusLevel};
use crate::config::Configuration;
use crate::probe::ProbeResult;

/// Map a probe result onto a status bucket.
///
/// Pure: no clock, no I/O. A failure of any kind is `Poor` with no latency.
/// A measurement equal to a threshold lands in the higher bucket. An invalid
/// configuration classifies everything as `Poor` until it is replaced.
pub fn classify(result: &ProbeResult, cfg: &Configuration) -> Status {
    let elapsed = match result {
        Ok(m) => m.elapsed_ms,
        Err(_) => return Status::new(StatusLevel::Poor, None),
    };

    if cfg.validate().is_err() {
        return Status::new(StatusLevel::Poor, Some(elapsed));
    }

    let level = if elapsed < cfg.low_ms {
        StatusLevel::Excellent
    } else if elapsed < cfg.mid_ms {
        StatusLevel::Good
    } else if elapsed < cfg.high_ms {
        StatusLevel::Fair
    } else {
        // Also covers NaN, which fails every comparison.
        StatusLevel::Poor
    };

    Status::new(level, Some(elapsed))
}
