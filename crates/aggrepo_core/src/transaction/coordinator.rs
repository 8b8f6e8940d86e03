//! Grouped commit over several units of work.

use super::UnitOfWork;
use crate::logging::log_value;
use crate::repo::error::{RepoError, RepoResult};
use log::{error, info};
use std::time::Instant;

/// How a coordinator drives its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinationMode {
    /// Commit members one after another; earlier commits stay on failure.
    Sequential,
    /// Prepare every member first, then commit; a failed prepare aborts the
    /// whole group before anything is committed.
    Distributed,
}

impl CoordinationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Distributed => "distributed",
        }
    }
}

/// Commits a fixed group of units of work together.
pub struct TransactionCoordinator<'a> {
    members: Vec<&'a dyn UnitOfWork>,
    mode: CoordinationMode,
}

impl<'a> TransactionCoordinator<'a> {
    /// Builds a coordinator; the mode is `Distributed` only when the group is
    /// non-empty and every member supports distributed transactions.
    pub fn new(members: Vec<&'a dyn UnitOfWork>) -> Self {
        let distributed = !members.is_empty()
            && members
                .iter()
                .all(|member| member.distributed_transaction_supported());
        let mode = if distributed {
            CoordinationMode::Distributed
        } else {
            CoordinationMode::Sequential
        };

        Self { members, mode }
    }

    pub fn mode(&self) -> CoordinationMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Commits every member in order.
    ///
    /// # Errors
    /// - Sequential: the first failing member's error; later members are not
    ///   committed and earlier ones are not rolled back.
    /// - Distributed: the first failing `prepare` error after every member
    ///   was aborted, or the first failing `commit` error.
    ///
    /// Pending changes of members that did not commit are kept either way.
    pub fn commit(&self) -> RepoResult<()> {
        let started_at = Instant::now();

        if self.mode == CoordinationMode::Distributed {
            if let Err(err) = self.prepare_all() {
                self.log_failure("prepare_failed", &err, started_at);
                return Err(err);
            }
        }

        for (position, member) in self.members.iter().enumerate() {
            if let Err(err) = member.commit() {
                error!(
                    "event=coordinator_commit module=transaction status=error mode={} member={} duration_ms={} error_code=member_commit_failed error={}",
                    self.mode.as_str(),
                    position,
                    started_at.elapsed().as_millis(),
                    log_value(&err)
                );
                return Err(err);
            }
        }

        info!(
            "event=coordinator_commit module=transaction status=ok mode={} members={} duration_ms={}",
            self.mode.as_str(),
            self.members.len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Rolls the group back. A no-op for sequential groups.
    pub fn rollback(&self) -> RepoResult<()> {
        if self.mode == CoordinationMode::Sequential {
            info!(
                "event=coordinator_rollback module=transaction status=noop mode={} members={}",
                self.mode.as_str(),
                self.members.len()
            );
            return Ok(());
        }

        let result = self.rollback_all();
        match &result {
            Ok(()) => info!(
                "event=coordinator_rollback module=transaction status=ok mode={} members={}",
                self.mode.as_str(),
                self.members.len()
            ),
            Err(err) => error!(
                "event=coordinator_rollback module=transaction status=error mode={} error={}",
                self.mode.as_str(),
                log_value(err)
            ),
        }
        result
    }

    fn prepare_all(&self) -> RepoResult<()> {
        for member in &self.members {
            if let Err(err) = member.prepare() {
                // The prepare error is the one reported; abort errors are logged.
                for (position, member) in self.members.iter().enumerate() {
                    if let Err(abort_err) = member.abort() {
                        error!(
                            "event=coordinator_abort module=transaction status=error mode={} member={} error={}",
                            self.mode.as_str(),
                            position,
                            log_value(&abort_err)
                        );
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Rolls back every member, returning the first error seen.
    fn rollback_all(&self) -> RepoResult<()> {
        let mut first_error = None;
        for member in &self.members {
            if let Err(err) = member.rollback() {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn log_failure(&self, error_code: &str, err: &RepoError, started_at: Instant) {
        error!(
            "event=coordinator_commit module=transaction status=error mode={} duration_ms={} error_code={} error={}",
            self.mode.as_str(),
            started_at.elapsed().as_millis(),
            error_code,
            log_value(err)
        );
    }
}
