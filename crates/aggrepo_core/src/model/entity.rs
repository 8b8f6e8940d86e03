//! Entity and aggregate-root contracts.
//!
//! # Responsibility
//! - Define identity for every persisted object.
//! - Describe how an aggregate root is partitioned and which of its fields
//!   are relations that storage keeps apart from the root document.
//!
//! # Invariants
//! - Equality is identity: same reference, or equal non-empty identifiers.
//! - An entity with an empty identifier never takes part in a unit of work.

use crate::id::EntityId;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Identity contract shared by all domain objects.
pub trait Entity {
    /// Returns the stable identifier. `EntityId::nil()` means "not assigned".
    fn id(&self) -> EntityId;

    /// Returns whether this entity carries a usable (non-empty) identifier.
    fn has_identity(&self) -> bool {
        !self.id().is_nil()
    }

    /// Identity comparison.
    ///
    /// The same reference is always equal to itself. Otherwise two entities
    /// are equal iff their identifiers match and are non-empty.
    fn same_identity(&self, other: &dyn Entity) -> bool {
        let this = (self as *const Self).cast::<()>();
        let that = (other as *const dyn Entity).cast::<()>();
        if std::ptr::eq(this, that) {
            return true;
        }
        self.has_identity() && self.id() == other.id()
    }
}

/// Entity that is the single entry point into a consistency boundary.
///
/// Aggregates are persisted as serialized documents. Fields named in
/// [`AggregateRoot::RELATIONS`] are stored separately and materialized only
/// when a query asks for them; such fields should be `Option<_>` with
/// `#[serde(default)]` so that "not loaded" (`None`) stays distinguishable
/// from an empty relation.
pub trait AggregateRoot: Entity + Serialize + DeserializeOwned {
    /// Storage partition name for this aggregate type.
    const KIND: &'static str;

    /// Relation fields kept apart from the root document.
    const RELATIONS: &'static [&'static str] = &[];
}

/// Implements `PartialEq` and `Hash` for an [`Entity`] by identity.
///
/// `Eq` is intentionally left out: two distinct values without identifiers
/// are not equal to each other.
#[macro_export]
macro_rules! entity_identity {
    ($ty:ty) => {
        impl ::core::cmp::PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                $crate::model::entity::Entity::same_identity(self, other)
            }
        }

        impl ::core::hash::Hash for $ty {
            fn hash<H: ::core::hash::Hasher>(&self, state: &mut H) {
                ::core::hash::Hash::hash(&$crate::model::entity::Entity::id(self), state);
            }
        }
    };
}
