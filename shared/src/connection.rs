//! # Connection Types
//!
//! Participant identity and connection-state records shared between the
//! engine and whatever owns the concrete socket.

use serde::{Deserialize, Serialize};

/// State of the channel to the room relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected to the relay
    Disconnected,

    /// Attempting to connect to the relay
    Connecting,

    /// Connected to the relay
    Connected,

    /// Connection failed
    Failed,
}

/// Basic participant identification information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    /// Unique participant identifier, assigned by the relay
    pub uid: String,

    /// Display name
    pub name: String,
}

impl ParticipantInfo {
    pub fn new(uid: &str, name: &str) -> Self {
        Self { uid: uid.to_string(), name: name.to_string() }
    }
}

/// The reason for a disconnection.
///
/// Reconnect policy is the embedder's business; the engine only needs to
/// survive an arbitrarily long gap without losing queued operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// Normal disconnection by participant request
    ClientRequest,

    /// Relay shutting down
    ServerShutdown,

    /// Connection timeout
    Timeout,

    /// Network error
    NetworkError(String),

    /// Removed by the host
    Kicked(String),

    /// Unknown reason
    Unknown,
}
