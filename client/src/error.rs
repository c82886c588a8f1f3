//! # Engine Errors
//!
//! Typed errors for the engine's fallible seams. Tolerated anomalies
//! (unknown identifiers, reentrant setters, missing authority) are warnings,
//! not errors; see the individual modules.

use thiserror::Error;

/// Failure reported by a concrete transport implementation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Errors surfaced by the replication engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No factory has been registered for the requested class tag.
    #[error("no class registered for tag '{0}'")]
    UnknownClass(String),

    /// Constructor parameters did not match what the factory expects.
    #[error("bad constructor parameters for '{class}': {reason}")]
    BadParams { class: String, reason: String },

    /// The transport cannot guarantee in-order, exactly-once delivery.
    /// Anything weaker silently breaks last-write-wins convergence, so the
    /// gateway refuses it outright instead of degrading.
    #[error("transport does not guarantee ordered reliable delivery")]
    UnorderedTransport,
}
