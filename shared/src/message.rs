//! # Replication Messages
//!
//! The wire records a room relay broadcasts between participants. Every
//! record references a target identifier except the fast-forward snapshot,
//! which carries the compacted state of the whole room.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::connection::ParticipantInfo;
use crate::object::ObjectId;
use crate::property::PropertyValue;

/// Dynamic construction of a tracked entity by class tag.
///
/// `params` are the positional constructor arguments handed to the factory
/// registered for `class_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creation {
    pub identifier: ObjectId,
    pub class_name: String,
    pub params: Vec<Value>,
}

/// Removal of a tracked entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destruction {
    pub identifier: ObjectId,
}

/// A single property mutation on a tracked entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub identifier: ObjectId,
    pub property: String,
    pub value: PropertyValue,
}

/// A request that the host execute a named function on a tracked entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthoritativeAction {
    pub identifier: ObjectId,
    pub function_name: String,
    pub param: Value,
}

/// The current value of every live property, keyed by identifier.
pub type FullState = HashMap<ObjectId, HashMap<String, PropertyValue>>;

/// The compacted catch-up bundle delivered to a newly joined participant.
///
/// Creations of later-destroyed entities are retained alongside their
/// destructions so that identifier allocation replays identically on the
/// joiner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastForwardSnapshot {
    pub creations: Vec<Creation>,
    pub destructions: Vec<Destruction>,
    pub full_state: FullState,
}

/// Envelope for everything that travels through a room's relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplicationMessage {
    Create(Creation),
    Destroy(Destruction),
    State(StateUpdate),
    Authority(AuthoritativeAction),
    FastForward(FastForwardSnapshot),
    SetHost { host_id: String },
    Players { roster: Vec<ParticipantInfo> },
}
