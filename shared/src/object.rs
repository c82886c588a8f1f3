//! # Shared Object Types
//!
//! Identifiers for tracked entities.

/// Unique identifier for a tracked entity within one session, formatted as
/// `"{token}_{n}"`. The token is usually the entity's class tag; entities
/// that must exist exactly once per participant fold the owning participant's
/// id into the token instead.
///
/// Identifiers are only unique within one active session, never across
/// sessions.
pub type ObjectId = String;
