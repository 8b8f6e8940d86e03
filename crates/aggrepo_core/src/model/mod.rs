//! Domain model contracts shared by every aggregate type.
//!
//! # Responsibility
//! - Define identity (`Entity`) and persistence shape (`AggregateRoot`).
//!
//! # Invariants
//! - Every persisted object is identified by a stable `EntityId`.

pub mod entity;
