//! Repository layer: contracts, unit of work and the SQLite storage adapter.
//!
//! # Responsibility
//! - Define the repository and storage-adapter contracts.
//! - Track pending changes per unit of work and flush them on commit.
//! - Keep SQL details inside the storage adapter.
//!
//! # Invariants
//! - Repository writes only register changes; nothing reaches storage before
//!   the owning context commits.
//! - Repository APIs return semantic errors (`NotFound`, `OutOfRange`,
//!   `InvalidOperation`, registration errors) in addition to storage errors.

pub mod context;
pub mod error;
pub mod repository;
pub mod sql_filter;
pub mod sqlite_store;
pub mod store;

pub use context::RepositoryContext;
pub use error::{PendingState, RepoError, RepoResult};
pub use repository::{ContextRepository, Repository};
pub use sqlite_store::SqliteStore;
pub use store::{ChangeSet, PendingEntity, Store, StoreQuery};
