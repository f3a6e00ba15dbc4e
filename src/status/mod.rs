// src/status/mod.rs
mod classifier;
mod model;
mod publisher;

pub use classifier::classify;
pub use model::{Status, StatusLevel};
pub use publisher::{StatusObserver, StatusPublisher, Subscription};
