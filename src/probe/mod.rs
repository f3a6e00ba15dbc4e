// src/probe/mod.rs
mod executor;
mod ping;

pub use executor::{FailureReason, Measurement, ProbeExecutor, ProbeFailure, ProbeResult};
pub use ping::{parse_round_trip, PingProbe};
