//! Identifier generation for aggregate roots and repository contexts.
//!
//! # Responsibility
//! - Produce globally unique, time-ordered 128-bit identifiers.
//! - Keep the bit layout explicit so storage engines can rely on it.
//!
//! # Invariants
//! - The nil UUID is the distinguished empty identifier and is never generated.
//! - Identifiers generated in later 0.1 ms ticks sort after earlier ones under
//!   the ordering their layout targets.

pub mod sequential;

/// Stable identifier carried by every entity.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type EntityId = uuid::Uuid;

/// Returns the distinguished empty identifier.
pub fn empty_id() -> EntityId {
    EntityId::nil()
}
