//! Repository context: the unit of work behind every repository.
//!
//! # Responsibility
//! - Track pending new/modified/deleted aggregates for one execution context.
//! - Flush them through the owned store on commit.
//! - Commit implicitly and release the store on disposal.
//!
//! # Invariants
//! - An identifier sits in at most one of the three pending mappings.
//! - Registrations check the identifier before the state machine.
//! - A failed commit leaves every mapping intact.
//! - The context is `!Sync`: each execution context owns its own instance,
//!   so no pending state is shared between contexts.

use super::error::{PendingState, RepoError, RepoResult};
use super::repository::ContextRepository;
use super::store::{ChangeSet, PendingEntity, Store};
use crate::id::sequential::{new_sequential_id, TimestampLayout};
use crate::id::EntityId;
use crate::logging::log_value;
use crate::model::entity::AggregateRoot;
use crate::transaction::UnitOfWork;
use log::{debug, error, info};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::time::Instant;

/// The three pending mappings of a unit of work.
#[derive(Debug, Default)]
struct PendingChanges {
    new: BTreeMap<EntityId, PendingEntity>,
    modified: BTreeMap<EntityId, PendingEntity>,
    deleted: BTreeMap<EntityId, PendingEntity>,
}

impl PendingChanges {
    fn state_of(&self, id: EntityId) -> Option<PendingState> {
        if self.new.contains_key(&id) {
            Some(PendingState::New)
        } else if self.modified.contains_key(&id) {
            Some(PendingState::Modified)
        } else if self.deleted.contains_key(&id) {
            Some(PendingState::Deleted)
        } else {
            None
        }
    }

    fn len(&self) -> usize {
        self.new.len() + self.modified.len() + self.deleted.len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn change_set(&self) -> ChangeSet<'_> {
        ChangeSet {
            inserted: self.new.values().collect(),
            updated: self.modified.values().collect(),
            deleted: self.deleted.values().collect(),
        }
    }

    fn clear(&mut self) {
        self.new.clear();
        self.modified.clear();
        self.deleted.clear();
    }
}

/// Unit of work owning one store and one set of pending mappings.
///
/// Dropping a context that still holds pending changes commits them and logs
/// any failure; call [`RepositoryContext::close`] to get that error back
/// instead.
pub struct RepositoryContext<S: Store> {
    id: EntityId,
    store: S,
    pending: RefCell<PendingChanges>,
    closed: Cell<bool>,
}

impl<S: Store> RepositoryContext<S> {
    pub fn new(store: S) -> Self {
        let id = new_sequential_id(TimestampLayout::TimeFirst);
        debug!("event=uow_open module=uow status=ok context={id}");
        Self {
            id,
            store,
            pending: RefCell::new(PendingChanges::default()),
            closed: Cell::new(false),
        }
    }

    /// Identifier used to correlate this context in log events.
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Repository for one aggregate type bound to this context.
    pub fn repository<T: AggregateRoot>(&self) -> ContextRepository<'_, T, S> {
        ContextRepository::new(self)
    }

    /// Registers an aggregate to be inserted on commit.
    ///
    /// # Errors
    /// - `EmptyIdentifier` when the aggregate has no identifier.
    /// - `DuplicateRegistration` when it is already pending as new.
    /// - `InvalidStateTransition` when it is pending as modified or deleted.
    pub fn register_new<T: AggregateRoot>(&self, entity: &T) -> RepoResult<()> {
        let id = ensure_identity(entity)?;
        let mut pending = self.pending.borrow_mut();
        match pending.state_of(id) {
            None => {}
            Some(PendingState::New) => return Err(RepoError::DuplicateRegistration(id)),
            Some(from) => {
                return Err(RepoError::InvalidStateTransition {
                    id,
                    from,
                    to: PendingState::New,
                })
            }
        }

        pending.new.insert(id, PendingEntity::capture(entity)?);
        self.log_register(T::KIND, id, None, PendingState::New, "ok");
        Ok(())
    }

    /// Registers an aggregate to be updated on commit.
    ///
    /// Re-registering an aggregate pending as new or modified keeps its state
    /// and refreshes the stored snapshot.
    ///
    /// # Errors
    /// - `EmptyIdentifier` when the aggregate has no identifier.
    /// - `InvalidStateTransition` when it is pending as deleted.
    pub fn register_modified<T: AggregateRoot>(&self, entity: &T) -> RepoResult<()> {
        let id = ensure_identity(entity)?;
        let mut pending = self.pending.borrow_mut();
        let from = pending.state_of(id);
        let snapshot = match from {
            Some(PendingState::Deleted) => {
                return Err(RepoError::InvalidStateTransition {
                    id,
                    from: PendingState::Deleted,
                    to: PendingState::Modified,
                })
            }
            _ => PendingEntity::capture(entity)?,
        };

        match from {
            Some(PendingState::New) => {
                pending.new.insert(id, snapshot);
                self.log_register(T::KIND, id, from, PendingState::New, "noop");
            }
            Some(PendingState::Modified) => {
                pending.modified.insert(id, snapshot);
                self.log_register(T::KIND, id, from, PendingState::Modified, "noop");
            }
            _ => {
                pending.modified.insert(id, snapshot);
                self.log_register(T::KIND, id, from, PendingState::Modified, "ok");
            }
        }
        Ok(())
    }

    /// Registers an aggregate to be deleted on commit.
    ///
    /// An aggregate pending as new is dropped entirely: it was never stored.
    ///
    /// # Errors
    /// - `EmptyIdentifier` when the aggregate has no identifier.
    pub fn register_deleted<T: AggregateRoot>(&self, entity: &T) -> RepoResult<()> {
        let id = ensure_identity(entity)?;
        let mut pending = self.pending.borrow_mut();
        let from = pending.state_of(id);
        match from {
            Some(PendingState::New) => {
                pending.new.remove(&id);
                debug!(
                    "event=uow_register module=uow status=ok context={} kind={} id={} from=new to=none",
                    self.id,
                    T::KIND,
                    id
                );
            }
            Some(PendingState::Deleted) => {
                self.log_register(T::KIND, id, from, PendingState::Deleted, "noop");
            }
            Some(PendingState::Modified) | None => {
                let snapshot = match pending.modified.remove(&id) {
                    Some(snapshot) => snapshot,
                    None => PendingEntity::capture(entity)?,
                };
                pending.deleted.insert(id, snapshot);
                self.log_register(T::KIND, id, from, PendingState::Deleted, "ok");
            }
        }
        Ok(())
    }

    /// Pending state of an identifier, or `None` when it is not tracked.
    pub fn pending_state(&self, id: EntityId) -> Option<PendingState> {
        self.pending.borrow().state_of(id)
    }

    /// Number of tracked identifiers across all three mappings.
    pub fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }

    /// True when no registration is waiting to be flushed.
    pub fn is_committed(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    /// Flushes all pending registrations through the store.
    ///
    /// Mappings are cleared only after the store accepted the whole change
    /// set.
    pub fn commit(&self) -> RepoResult<()> {
        let started_at = Instant::now();
        let (inserted, updated, deleted) = {
            let pending = self.pending.borrow();
            if pending.is_empty() {
                debug!("event=uow_commit module=uow status=noop context={}", self.id);
                return Ok(());
            }

            let changes = pending.change_set();
            let counts = (
                changes.inserted.len(),
                changes.updated.len(),
                changes.deleted.len(),
            );
            if let Err(err) = self.store.flush(&changes) {
                error!(
                    "event=uow_commit module=uow status=error context={} duration_ms={} error_code=flush_failed error={}",
                    self.id,
                    started_at.elapsed().as_millis(),
                    log_value(&err)
                );
                return Err(err);
            }
            counts
        };

        self.pending.borrow_mut().clear();
        info!(
            "event=uow_commit module=uow status=ok context={} inserted={} updated={} deleted={} duration_ms={}",
            self.id,
            inserted,
            updated,
            deleted,
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Discards all pending registrations, then rolls back the store.
    pub fn rollback(&self) -> RepoResult<()> {
        let discarded = {
            let mut pending = self.pending.borrow_mut();
            let discarded = pending.len();
            pending.clear();
            discarded
        };

        let result = self.store.rollback();
        match &result {
            Ok(()) => info!(
                "event=uow_rollback module=uow status=ok context={} discarded={}",
                self.id, discarded
            ),
            Err(err) => error!(
                "event=uow_rollback module=uow status=error context={} discarded={} error={}",
                self.id,
                discarded,
                log_value(err)
            ),
        }
        result
    }

    /// Disposes the context, returning any implicit-commit or release error.
    ///
    /// The store is released even when the implicit commit fails.
    pub fn close(self) -> RepoResult<()> {
        self.dispose()
    }

    fn dispose(&self) -> RepoResult<()> {
        if self.closed.replace(true) {
            return Ok(());
        }

        let commit = if self.is_committed() {
            Ok(())
        } else {
            self.commit()
        };
        let release = self.store.release();

        let status = if commit.is_ok() && release.is_ok() {
            "ok"
        } else {
            "error"
        };
        info!(
            "event=uow_close module=uow status={} context={} pending={}",
            status,
            self.id,
            self.pending_len()
        );

        commit.and(release)
    }

    fn log_register(
        &self,
        kind: &str,
        id: EntityId,
        from: Option<PendingState>,
        to: PendingState,
        status: &str,
    ) {
        debug!(
            "event=uow_register module=uow status={} context={} kind={} id={} from={} to={}",
            status,
            self.id,
            kind,
            id,
            from.map_or("none", PendingState::as_str),
            to.as_str()
        );
    }
}

impl<S: Store> UnitOfWork for RepositoryContext<S> {
    fn distributed_transaction_supported(&self) -> bool {
        self.store.distributed_transaction_supported()
    }

    fn is_committed(&self) -> bool {
        RepositoryContext::is_committed(self)
    }

    fn commit(&self) -> RepoResult<()> {
        RepositoryContext::commit(self)
    }

    fn rollback(&self) -> RepoResult<()> {
        RepositoryContext::rollback(self)
    }
}

impl<S: Store> Drop for RepositoryContext<S> {
    fn drop(&mut self) {
        if let Err(err) = self.dispose() {
            error!(
                "event=uow_close module=uow status=error context={} error_code=implicit_commit_failed error={}",
                self.id,
                log_value(&err)
            );
        }
    }
}

fn ensure_identity<T: AggregateRoot>(entity: &T) -> RepoResult<EntityId> {
    if entity.has_identity() {
        Ok(entity.id())
    } else {
        Err(RepoError::EmptyIdentifier { kind: T::KIND })
    }
}
