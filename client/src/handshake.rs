//! # Join Handshake
//!
//! When the relay accepts a join mid-session, the host compiles the
//! compacted replication log of the room into one fast-forward snapshot so
//! the new participant never replays the full message history.

use tabletop_shared::{Creation, Destruction, FastForwardSnapshot, FullState};

use crate::session::Session;

/// Append-only record of every creation and destruction this session has
/// applied, scene setup included. Creations of later-destroyed entities are
/// retained alongside their destructions: replaying the whole log drives the
/// joiner's identifier allocation through the same sequence the room saw.
#[derive(Default)]
pub struct ReplicationLog {
    creations: Vec<Creation>,
    destructions: Vec<Destruction>,
}

impl ReplicationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_creation(&mut self, creation: Creation) {
        self.creations.push(creation);
    }

    pub fn record_destruction(&mut self, destruction: Destruction) {
        self.destructions.push(destruction);
    }

    pub fn creations(&self) -> &[Creation] {
        &self.creations
    }

    pub fn destructions(&self) -> &[Destruction] {
        &self.destructions
    }

    pub fn clear(&mut self) {
        self.creations.clear();
        self.destructions.clear();
    }
}

impl Session {
    /// Compile the catch-up bundle for a newly accepted participant:
    /// outstanding creations, outstanding destructions, and the current
    /// value of every live property.
    pub fn snapshot(&self) -> FastForwardSnapshot {
        let log = self.inner.log.borrow();
        let registry = self.inner.registry.borrow();

        let mut full_state = FullState::new();
        for (identifier, entity) in registry.iter() {
            full_state.insert(identifier.clone(), entity.state().full_state());
        }

        FastForwardSnapshot {
            creations: log.creations().to_vec(),
            destructions: log.destructions().to_vec(),
            full_state,
        }
    }
}
