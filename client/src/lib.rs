//! # Tabletop Replication Client
//!
//! The per-participant engine of a multiplayer tabletop room: every
//! participant observes a converging, causally consistent view of the shared
//! entities, with one host executing gated mutations and late joiners caught
//! up from a compacted snapshot instead of the full message history.
//!
//! The system is organized into several sub-modules:
//! - `session`: the per-process service bundle everything hangs off
//! - `object`: tracked entities, reactive state containers, the registry
//! - `net`: the transport gateway, propagation modes, queued operations
//! - `authority`: host-gated execution of named functions
//! - `class`: class-tag factories and action tables
//! - `loading`: deferral of network operations behind asset loads
//! - `handshake`: the fast-forward catch-up bundle for late joiners
//! - `id`: deterministic identifier allocation
//! - `event`: typed publish/subscribe channels with guards
//!
//! Processes are single-threaded and cooperative: work happens only on
//! message arrival or local input, each handled to completion. The relay
//! provides total order per room; nothing here locks.

pub mod authority;
pub mod class;
pub mod error;
pub mod event;
pub mod handshake;
pub mod id;
pub mod loading;
pub mod net;
pub mod object;
pub mod property;
pub mod session;

// Re-export commonly used items
pub use authority::DESTROY_ACTION;
pub use class::{ActionFn, ClassRegistry, Factory};
pub use error::{EngineError, TransportError};
pub use event::{EventChannel, Subscription};
pub use handshake::ReplicationLog;
pub use id::IdAllocator;
pub use loading::LoadingManager;
pub use net::{ChannelOrdering, StateMode, Transport};
pub use object::{BasicEntity, Entity, ObjectState, Registry};
pub use property::HookId;
pub use session::Session;

pub use tabletop_shared as shared;
pub use tabletop_shared::{
    AuthoritativeAction, ConnectionState, Creation, Destruction, FastForwardSnapshot,
    ObjectId, ParticipantInfo, PropertyValue, ReplicationMessage, StateUpdate,
};
