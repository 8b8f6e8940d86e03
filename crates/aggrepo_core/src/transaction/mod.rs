//! Unit-of-work contract and grouped commit coordination.
//!
//! # Responsibility
//! - Define the surface a coordinator needs from a unit of work.
//! - Commit or roll back several units of work as one group.
//!
//! # Invariants
//! - Members are driven in the order they were handed to the coordinator.
//! - Atomicity across members is only attempted when every member supports
//!   distributed transactions.

pub mod coordinator;

pub use coordinator::{CoordinationMode, TransactionCoordinator};

use crate::repo::error::RepoResult;

/// A scope that tracks pending changes and flushes them together.
pub trait UnitOfWork {
    /// Whether the backing store can take part in a distributed transaction.
    fn distributed_transaction_supported(&self) -> bool;

    /// True when nothing is pending.
    fn is_committed(&self) -> bool;

    /// Flushes every pending change. Pending changes survive a failed commit.
    fn commit(&self) -> RepoResult<()>;

    /// Discards pending changes.
    fn rollback(&self) -> RepoResult<()>;

    /// Checks that `commit` can go through. Only called by a distributed
    /// coordinator, before any member commits.
    fn prepare(&self) -> RepoResult<()> {
        Ok(())
    }

    /// Releases whatever `prepare` reserved after the group failed to
    /// prepare. Pending changes stay, so the caller may retry the commit.
    fn abort(&self) -> RepoResult<()> {
        Ok(())
    }
}
