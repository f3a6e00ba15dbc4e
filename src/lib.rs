// src/lib.rs
pub mod bridge;
pub mod config;
pub mod metrics;
pub mod probe;
pub mod scheduler;
pub mod status;
