// src/config/store.rs
use super::Configuration;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// Holds the live configuration.
///
/// Readers get a whole `Arc<Configuration>` snapshot, so a concurrent
/// `replace` can never be observed half-applied. No validation happens here.
#[derive(Debug)]
pub struct ConfigStore {
    current: ArcSwap<Configuration>,
}

impl ConfigStore {
    pub fn new(initial: Configuration) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    pub fn get(&self) -> Arc<Configuration> {
        self.current.load_full()
    }

    pub fn replace(&self, new: Configuration) {
        self.current.store(Arc::new(new));
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(Configuration::default())
    }
}
