//! The migration ledger: the durable record of applied steps.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::catalog::BoxError;
use crate::step::MigrationStep;

/// Record of a step that has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// The id of the applied step.
    pub step_id: String,
    /// When the step was applied.
    pub applied_at: chrono::DateTime<chrono::Utc>,
    /// The checksum recorded when the step was applied.
    pub checksum: String,
}

/// Errors raised by a ledger backend.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The ledger storage could not be read or written.
    #[error("ledger storage error: {0}")]
    Storage(#[source] BoxError),
}

impl LedgerError {
    /// Wraps a backend error.
    pub fn storage(source: impl Into<BoxError>) -> Self {
        LedgerError::Storage(source.into())
    }
}

/// Durable, ordered record of applied steps.
///
/// At most one entry exists per step id. Each `record` or `erase` is its own unit of
/// durability; there is no transaction spanning a step's DDL and its ledger write.
#[async_trait]
pub trait MigrationLedger: Send + Sync {
    /// Provisions the ledger storage if needed.
    async fn ensure(&self) -> Result<(), LedgerError>;

    /// Applied entries, ordered by step id. Unprovisioned storage has no entries and is
    /// left untouched.
    async fn executed(&self) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// Records a step as applied. Recording an already recorded id is a no-op.
    async fn record(&self, step_id: &str, checksum: &str) -> Result<(), LedgerError>;

    /// Removes a step's entry. Erasing an absent id is a no-op.
    async fn erase(&self, step_id: &str) -> Result<(), LedgerError>;

    /// The steps of `all` that have no entry, ordered by id.
    async fn pending<'s>(
        &self,
        all: &[&'s dyn MigrationStep],
    ) -> Result<Vec<&'s dyn MigrationStep>, LedgerError> {
        let executed = self.executed().await?;
        Ok(unrecorded(all, &executed))
    }
}

/// The steps of `all` with no entry in `executed`, ordered by id.
pub(crate) fn unrecorded<'s>(
    all: &[&'s dyn MigrationStep],
    executed: &[LedgerEntry],
) -> Vec<&'s dyn MigrationStep> {
    let applied: HashSet<&str> = executed.iter().map(|e| e.step_id.as_str()).collect();
    let mut pending: Vec<&'s dyn MigrationStep> = all
        .iter()
        .copied()
        .filter(|step| !applied.contains(step.id()))
        .collect();
    pending.sort_by_key(|step| step.id());
    pending
}
