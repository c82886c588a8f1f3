//! # Identifier Allocation
//!
//! Deterministic assignment of identifiers to created entities, one counter
//! per token. Convergence across participants depends on every participant
//! executing the same creation sequence.

use std::collections::HashMap;

use tabletop_shared::ObjectId;

/// Hands out `"{token}_{n}"` identifiers with a monotonic counter per token.
#[derive(Debug, Default)]
pub struct IdAllocator {
    counters: HashMap<String, u64>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the next automatically assigned identifier for `token`.
    pub fn next(&mut self, token: &str) -> ObjectId {
        let counter = self.counters.entry(token.to_string()).or_insert(0);
        let id = format!("{}_{}", token, counter);
        *counter += 1;
        id
    }

    /// Reset every counter. Invoked on scene teardown; identifiers are only
    /// unique within one active session.
    pub fn reset(&mut self) {
        self.counters.clear();
    }
}
