use async_trait::async_trait;
use mprec_core::{CaseId, CaseInformationFields};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Another unit of work committed a case with this name first.
    #[error("case name {name:?} already exists")]
    NameConflict { name: String },
    /// The database aborted the transaction (deadlock or serialization
    /// failure); running the whole unit of work again may succeed.
    #[error("transaction aborted by the database: {0}")]
    Transient(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// SQLSTATE codes for `deadlock_detected` and `serialization_failure`.
const TRANSIENT_SQLSTATES: [&str; 2] = ["40P01", "40001"];

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db
                .code()
                .is_some_and(|code| TRANSIENT_SQLSTATES.contains(&code.as_ref()))
            {
                return StoreError::Transient(db.message().to_string());
            }
        }
        StoreError::Database(err)
    }
}

/// One row of a platform's current view: the information row joined to its case name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformCaseRow {
    pub case_id: CaseId,
    pub name: String,
    pub fields: CaseInformationFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Persistent home of cases and per-platform case information.
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// Open an all-or-nothing unit of work.
    async fn begin(&self) -> Result<Box<dyn CaseUnitOfWork>, StoreError>;
}

/// Operations of one reconciliation pass; nothing is visible to others until `commit`.
#[async_trait]
pub trait CaseUnitOfWork: Send {
    async fn platform_rows(&mut self, platform: &str) -> Result<Vec<PlatformCaseRow>, StoreError>;

    async fn find_case_by_name(&mut self, name: &str) -> Result<Option<CaseId>, StoreError>;

    /// Fails with [`StoreError::NameConflict`] when the name is already taken.
    async fn create_case(&mut self, name: &str) -> Result<CaseId, StoreError>;

    /// Insert the row, or rewrite it when at least one field differs.
    async fn upsert_case_information(
        &mut self,
        case_id: CaseId,
        platform: &str,
        fields: &CaseInformationFields,
    ) -> Result<UpsertOutcome, StoreError>;

    async fn delete_case_information(
        &mut self,
        case_id: CaseId,
        platform: &str,
    ) -> Result<bool, StoreError>;

    /// Delete those candidates that no longer have any information row; returns how many.
    async fn delete_orphan_cases(&mut self, candidates: &[CaseId]) -> Result<usize, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_aborted_transactions_are_transient() {
        assert!(StoreError::Transient("deadlock detected".into()).is_transient());
        assert!(!StoreError::from(sqlx::Error::RowNotFound).is_transient());
        assert!(!StoreError::NameConflict { name: "x".into() }.is_transient());
        assert!(!StoreError::Unavailable("down".into()).is_transient());
    }
}
