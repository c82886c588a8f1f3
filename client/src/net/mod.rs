//! # Transport Gateway
//!
//! Routes outbound mutations and inbound replication messages over one
//! ordered, reliable channel to the room's relay, and owns the
//! queued-operation buffer that defers inbound processing while resources
//! are still loading.

use std::mem;

use log::{debug, error, info, warn};
use tabletop_shared::{
    ConnectionState, Creation, Destruction, FastForwardSnapshot, ObjectId, ReplicationMessage,
    StateUpdate,
};

use crate::error::{EngineError, TransportError};
use crate::session::{Session, SessionInner};

/// Whether local mutations are broadcast to the relay.
///
/// `Local` suppresses all outbound creation/destruction/state traffic. It is
/// used while constructing a scene and while replaying a fast-forward
/// snapshot, so known facts are not rebroadcast. `Global` is normal
/// operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMode {
    Local,
    Global,
}

/// Delivery guarantees a transport provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrdering {
    /// Exactly-once, in-order delivery per room.
    OrderedReliable,
    /// Anything weaker: may drop, duplicate, or reorder.
    Unordered,
}

/// One bidirectional channel to the per-room relay.
///
/// Inbound traffic does not flow through this trait; the embedder drains its
/// socket and hands each message to [`Session::receive`].
pub trait Transport {
    /// The delivery guarantees this channel provides.
    fn ordering(&self) -> ChannelOrdering;

    /// Queue a message for the relay.
    fn send(&mut self, message: &ReplicationMessage) -> Result<(), TransportError>;
}

/// Owns the transport, the connection state, and the pending-operation
/// lists populated while the loading manager is not ready.
pub(crate) struct Gateway {
    transport: Box<dyn Transport>,
    pub(crate) state: ConnectionState,
    pub(crate) create_queue: Vec<Creation>,
    pub(crate) destroy_queue: Vec<Destruction>,
    pub(crate) state_queue: Vec<StateUpdate>,
}

impl Gateway {
    /// Wrap a transport. A channel that can reorder messages silently breaks
    /// last-write-wins convergence, so it is rejected outright rather than
    /// degraded.
    pub(crate) fn new(transport: Box<dyn Transport>) -> Result<Self, EngineError> {
        if transport.ordering() != ChannelOrdering::OrderedReliable {
            return Err(EngineError::UnorderedTransport);
        }
        Ok(Self {
            transport,
            state: ConnectionState::Connected,
            create_queue: Vec::new(),
            destroy_queue: Vec::new(),
            state_queue: Vec::new(),
        })
    }

    pub(crate) fn send(&mut self, message: &ReplicationMessage) {
        if let Err(err) = self.transport.send(message) {
            error!("failed to send to relay: {}", err);
            self.state = ConnectionState::Failed;
        }
    }
}

impl SessionInner {
    pub(crate) fn send_creation(&self, creation: Creation) {
        if self.mode.get() != StateMode::Global {
            return;
        }
        self.gateway
            .borrow_mut()
            .send(&ReplicationMessage::Create(creation));
    }

    pub(crate) fn send_destruction(&self, destruction: Destruction) {
        if self.mode.get() != StateMode::Global {
            return;
        }
        self.gateway
            .borrow_mut()
            .send(&ReplicationMessage::Destroy(destruction));
    }

    pub(crate) fn send_state_update(&self, update: StateUpdate) {
        if self.mode.get() != StateMode::Global {
            return;
        }
        self.gateway
            .borrow_mut()
            .send(&ReplicationMessage::State(update));
    }

    /// Authoritative calls are requests, not replication; they go out in
    /// every mode.
    pub(crate) fn send_authoritative(
        &self,
        action: tabletop_shared::AuthoritativeAction,
    ) {
        self.gateway
            .borrow_mut()
            .send(&ReplicationMessage::Authority(action));
    }
}

impl Session {
    /// Drain point for every inbound relay message. Called once per message,
    /// each processed to completion before the next.
    pub fn receive(&self, message: ReplicationMessage) {
        match message {
            ReplicationMessage::Create(creation) => self.receive_creation(creation),
            ReplicationMessage::Destroy(destruction) => self.receive_destruction(destruction),
            ReplicationMessage::State(update) => self.receive_state_update(update),
            ReplicationMessage::Authority(action) => self.receive_authoritative_action(action),
            ReplicationMessage::FastForward(snapshot) => self.fast_forward(snapshot),
            ReplicationMessage::SetHost { host_id } => self.receive_set_host(&host_id),
            ReplicationMessage::Players { roster } => self.receive_roster(roster),
        }
    }

    fn receive_creation(&self, creation: Creation) {
        if !self.ready() {
            self.inner.gateway.borrow_mut().create_queue.push(creation);
            return;
        }
        self.apply_creation(creation);
    }

    fn apply_creation(&self, creation: Creation) {
        debug!("CREATE {} ({:?})", creation.class_name, creation.params);
        // Construction side effects must not be rebroadcast.
        let prior = self.inner.mode.replace(StateMode::Local);
        if let Err(err) = self.create(&creation.class_name, creation.params) {
            warn!("could not apply creation of '{}': {}", creation.identifier, err);
        }
        self.inner.mode.set(prior);
    }

    fn receive_destruction(&self, destruction: Destruction) {
        if !self.ready() {
            self.inner.gateway.borrow_mut().destroy_queue.push(destruction);
            return;
        }
        self.apply_destruction(destruction);
    }

    fn apply_destruction(&self, destruction: Destruction) {
        let prior = self.inner.mode.replace(StateMode::Local);
        self.destroy(&destruction.identifier);
        self.inner.mode.set(prior);
    }

    fn receive_state_update(&self, update: StateUpdate) {
        if !self.ready() {
            self.inner.gateway.borrow_mut().state_queue.push(update);
            return;
        }
        self.apply_state_update(update);
    }

    fn apply_state_update(&self, update: StateUpdate) {
        match self.get_object(&update.identifier) {
            Some(entity) => entity.state().update_state(&update.property, update.value),
            None => warn!(
                "state update for unknown identifier '{}' ({})",
                update.identifier, update.property
            ),
        }
    }

    /// Replay everything that queued up behind the loading manager. State
    /// updates collapse to the most recently queued value per (identifier,
    /// property); replay order is all creations, then all destructions, then
    /// the collapsed updates.
    pub(crate) fn apply_queued_operations(&self) {
        let (creations, destructions, updates) = {
            let mut gateway = self.inner.gateway.borrow_mut();
            (
                mem::take(&mut gateway.create_queue),
                mem::take(&mut gateway.destroy_queue),
                mem::take(&mut gateway.state_queue),
            )
        };

        // Compile all state changes down to only the last one per property,
        // keeping the position of the first write.
        let mut collapsed: Vec<StateUpdate> = Vec::new();
        let mut slots: std::collections::HashMap<(ObjectId, String), usize> =
            std::collections::HashMap::new();
        for update in updates {
            let key = (update.identifier.clone(), update.property.clone());
            match slots.get(&key) {
                Some(&slot) => collapsed[slot] = update,
                None => {
                    slots.insert(key, collapsed.len());
                    collapsed.push(update);
                }
            }
        }

        // Do not propagate changes made while replaying. Each receive
        // re-checks the loading manager, so an operation that kicks off new
        // loads re-queues whatever follows it.
        self.inner.mode.set(StateMode::Local);

        for creation in creations {
            self.receive_creation(creation);
        }
        for destruction in destructions {
            self.receive_destruction(destruction);
        }
        for update in collapsed {
            self.receive_state_update(update);
        }

        self.inner.mode.set(StateMode::Global);
    }

    /// Bring this late-joining participant to parity. Invoked once, right
    /// after the handshake: rebuild the local scene, then seed the pending
    /// lists with the snapshot backlog and let the normal flush path run.
    pub fn fast_forward(&self, snapshot: FastForwardSnapshot) {
        info!(
            "fast-forwarding: {} creations, {} destructions, {} entities of state",
            snapshot.creations.len(),
            snapshot.destructions.len(),
            snapshot.full_state.len()
        );

        let loader = self.inner.scene_loader.borrow_mut().take();
        if let Some(load) = &loader {
            let prior = self.inner.mode.replace(StateMode::Local);
            load(self);
            self.inner.mode.set(prior);
        }
        {
            let mut slot = self.inner.scene_loader.borrow_mut();
            if slot.is_none() {
                *slot = loader;
            }
        }

        // The creation log replays from the top; identifiers converge
        // because allocation is deterministic.
        self.inner.allocator.borrow_mut().reset();

        {
            let mut gateway = self.inner.gateway.borrow_mut();

            // The backlog goes ahead of any live traffic that raced in.
            let live = mem::take(&mut gateway.create_queue);
            gateway.create_queue = snapshot.creations;
            gateway.create_queue.extend(live);

            let live = mem::take(&mut gateway.destroy_queue);
            gateway.destroy_queue = snapshot.destructions;
            gateway.destroy_queue.extend(live);

            let live = mem::take(&mut gateway.state_queue);
            gateway.state_queue = snapshot
                .full_state
                .into_iter()
                .flat_map(|(identifier, properties)| {
                    properties.into_iter().map(move |(property, value)| StateUpdate {
                        identifier: identifier.clone(),
                        property,
                        value,
                    })
                })
                .collect();
            gateway.state_queue.extend(live);
        }

        self.apply_queued_operations();
    }
}
