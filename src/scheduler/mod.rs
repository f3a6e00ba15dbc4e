// src/scheduler/mod.rs
mod sampler;

pub use sampler::{Scheduler, SchedulerSettings};
