//! # Resource Loading
//!
//! Tracks outstanding asynchronous asset loads. Network operations are
//! deferred while anything is still loading; the session wires the
//! became-ready transition to the queued-operation flush.

use std::collections::HashSet;

use log::{info, warn};

/// Reports back when all geometries, textures, etc. have been loaded.
pub struct LoadingManager {
    loading: HashSet<String>,
    total: usize,
    ready: bool,
}

impl Default for LoadingManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadingManager {
    pub fn new() -> Self {
        Self {
            loading: HashSet::new(),
            total: 0,
            ready: true,
        }
    }

    /// Whether every requested resource has finished loading.
    pub fn ready(&self) -> bool {
        self.ready
    }

    /// Number of loads still in flight.
    pub fn outstanding(&self) -> usize {
        self.loading.len()
    }

    /// Begin tracking a slow asynchronous load.
    pub fn add_resource(&mut self, key: &str) {
        self.loading.insert(key.to_string());
        self.total += 1;
        self.ready = false;
    }

    /// Record a finished load. Returns true when this completion crossed the
    /// outstanding count to zero, which happens at most once per crossing no
    /// matter how many resources were in flight.
    pub fn done_resource(&mut self, key: &str) -> bool {
        if !self.loading.remove(key) {
            warn!("finished loading unknown resource '{}'", key);
        }

        info!("loaded {} / {}", self.total - self.loading.len(), self.total);

        if self.loading.is_empty() && !self.ready {
            self.ready = true;
            info!("all resources loaded");
            return true;
        }
        false
    }
}
