//! Storage adapter contract.
//!
//! # Responsibility
//! - Define what a concrete store must provide to back repositories and
//!   units of work: point lookup, filtered/sorted/windowed queries,
//!   counting, and flushing pending changes.
//!
//! # Invariants
//! - `flush` applies a whole change set or nothing.
//! - Queries without a sort key return rows in an adapter-stable order.
//! - Relations are materialized only when named in `StoreQuery::eager_load`.

use super::error::RepoResult;
use crate::id::EntityId;
use crate::model::entity::AggregateRoot;
use crate::query::options::{Sort, Window};
use crate::specification::Specification;
use serde_json::Value;

/// Serialized snapshot of an aggregate registered with a unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntity {
    pub kind: &'static str,
    pub id: EntityId,
    pub relations: &'static [&'static str],
    pub document: Value,
}

impl PendingEntity {
    pub fn capture<T: AggregateRoot>(entity: &T) -> RepoResult<Self> {
        Ok(Self {
            kind: T::KIND,
            id: entity.id(),
            relations: T::RELATIONS,
            document: serde_json::to_value(entity)?,
        })
    }
}

/// Read-only view of the three pending mappings handed to `Store::flush`.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet<'a> {
    pub inserted: Vec<&'a PendingEntity>,
    pub updated: Vec<&'a PendingEntity>,
    pub deleted: Vec<&'a PendingEntity>,
}

impl ChangeSet<'_> {
    pub fn len(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One query request as the adapter sees it.
#[derive(Debug)]
pub struct StoreQuery<'a, T> {
    pub specification: &'a Specification<T>,
    pub sort: Option<&'a Sort>,
    pub window: Option<Window>,
    pub eager_load: &'a [String],
}

impl<'a, T> StoreQuery<'a, T> {
    pub fn new(specification: &'a Specification<T>) -> Self {
        Self {
            specification,
            sort: None,
            window: None,
            eager_load: &[],
        }
    }
}

/// Backend that executes queries and flushes pending changes.
///
/// All methods take `&self`; adapters that need mutation use interior
/// mutability or a transactional handle of their backend.
pub trait Store {
    /// Direct lookup by identifier, without relations.
    fn load<T: AggregateRoot>(&self, id: EntityId) -> RepoResult<Option<T>>;

    /// Filtered, sorted and windowed query.
    fn query<T: AggregateRoot>(&self, request: &StoreQuery<'_, T>) -> RepoResult<Vec<T>>;

    /// Counts entities matching the specification.
    fn count<T: AggregateRoot>(&self, specification: &Specification<T>) -> RepoResult<u64>;

    /// Returns whether at least one entity matches, without materializing rows
    /// where the backend allows it.
    fn exists<T: AggregateRoot>(&self, specification: &Specification<T>) -> RepoResult<bool> {
        Ok(self.count(specification)? > 0)
    }

    /// Persists inserts, updates and deletes atomically.
    fn flush(&self, changes: &ChangeSet<'_>) -> RepoResult<()>;

    /// Discards backend-side uncommitted work. No-op by default.
    fn rollback(&self) -> RepoResult<()> {
        Ok(())
    }

    /// Releases backend resources at the end of a unit of work.
    fn release(&self) -> RepoResult<()> {
        Ok(())
    }

    fn distributed_transaction_supported(&self) -> bool {
        false
    }
}
