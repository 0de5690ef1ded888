//! Transaction runner for use-case code.
//!
//! # Invariants
//! - Every closure runs inside one repository transaction.
//! - `execute_or_log` never returns an error; failures are logged once.

use crate::error::NodResult;
use crate::repo::repository::Repository;
use log::error;

/// Runs closures against a repository inside one atomic scope each.
#[derive(Clone)]
pub struct Manager<'conn> {
    repository: Repository<'conn>,
}

impl<'conn> Manager<'conn> {
    pub fn new(repository: Repository<'conn>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Repository<'conn> {
        &self.repository
    }

    /// Runs `f` in a transaction and returns its result.
    pub fn execute<R>(&self, f: impl FnOnce(&Repository<'conn>) -> NodResult<R>) -> NodResult<R> {
        self.repository.transaction(f)
    }

    /// Runs `f` in a transaction; a failure is rolled back, logged and
    /// reported as `None`.
    pub fn execute_or_log<R>(
        &self,
        f: impl FnOnce(&Repository<'conn>) -> NodResult<R>,
    ) -> Option<R> {
        match self.execute(f) {
            Ok(value) => Some(value),
            Err(err) => {
                error!("event=manager_execute module=manager status=error error={err}");
                None
            }
        }
    }
}
