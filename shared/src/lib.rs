//! # Shared Tabletop Types
//!
//! Common types used by every participant process of a tabletop session and
//! by the room relay: replication messages, property values, and
//! connection/participant records.
//!
//! Everything here is plain data. All behavior (registries, queues, the
//! authority model) lives in the `tabletop_client` crate.

pub mod connection;
pub mod message;
pub mod object;
pub mod property;

// Re-export commonly used items
pub use connection::{ConnectionState, DisconnectReason, ParticipantInfo};
pub use message::{
    AuthoritativeAction, Creation, Destruction, FastForwardSnapshot, FullState,
    ReplicationMessage, StateUpdate,
};
pub use object::ObjectId;
pub use property::{PropertyType, PropertyValue, Quat, Vec3};
