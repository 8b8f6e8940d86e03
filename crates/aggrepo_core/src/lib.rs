//! Aggregate persistence core.
//! Identifiers, specifications, repositories and units of work over a
//! pluggable store, with a SQLite store included.

pub mod db;
pub mod id;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod specification;
pub mod transaction;

pub use db::{open_db, open_db_in_memory, open_db_with, DbError, DbOptions};
pub use id::sequential::{new_sequential_id, TimestampLayout};
pub use id::{empty_id, EntityId};
pub use logging::{
    default_log_level, init_logging, log_value, logging_status, LoggingConfig, LoggingError,
};
pub use model::entity::{AggregateRoot, Entity};
pub use query::options::{Page, Query, QueryResult, Sort, SortOrder};
pub use query::paged::PagedResult;
pub use repo::{
    ContextRepository, PendingState, RepoError, RepoResult, Repository, RepositoryContext,
    SqliteStore, Store,
};
pub use specification::{CompareOp, FieldPath, Specification};
pub use transaction::{CoordinationMode, TransactionCoordinator, UnitOfWork};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
