//! Repository and unit-of-work error model.

use crate::db::DbError;
use crate::id::EntityId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Pending state of an identifier inside a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingState {
    New,
    Modified,
    Deleted,
}

impl PendingState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

/// Error for repository reads, registrations and commits.
#[derive(Debug)]
pub enum RepoError {
    /// Entity lacks a valid (non-nil) identifier.
    EmptyIdentifier { kind: &'static str },
    /// Entity is already registered as new.
    DuplicateRegistration(EntityId),
    /// Registration is not allowed from the current pending state.
    InvalidStateTransition {
        id: EntityId,
        from: PendingState,
        to: PendingState,
    },
    /// A must-exist lookup or query found nothing.
    NotFound {
        kind: &'static str,
        id: Option<EntityId>,
    },
    /// Page number or page size below 1.
    OutOfRange { parameter: &'static str, value: u32 },
    /// Request is structurally invalid (e.g. paging without a sort order).
    InvalidOperation(String),
    Db(DbError),
    Serialization(serde_json::Error),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyIdentifier { kind } => write!(f, "{kind} entity has an empty identifier"),
            Self::DuplicateRegistration(id) => {
                write!(f, "entity {id} is already registered as new")
            }
            Self::InvalidStateTransition { id, from, to } => write!(
                f,
                "entity {id} is registered as {}; cannot register it as {}",
                from.as_str(),
                to.as_str()
            ),
            Self::NotFound { kind, id: Some(id) } => write!(f, "{kind} not found: {id}"),
            Self::NotFound { kind, id: None } => {
                write!(f, "no {kind} matches the specification")
            }
            Self::OutOfRange { parameter, value } => {
                write!(f, "{parameter} must be >= 1, got {value}")
            }
            Self::InvalidOperation(message) => write!(f, "invalid operation: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "aggregate serialization failed: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}
