//! The migration runner.
//!
//! # Usage
//!
//! ```rust,ignore
//! use rapport_core::migrator::Migrator;
//! use rapport_pg::{PgLedger, PgSchema};
//!
//! let migrator = Migrator::new(PgSchema::new(pool.clone()), PgLedger::new(pool));
//!
//! // Apply everything that is pending
//! let applied = migrator.up().await?;
//! println!("Applied {} steps", applied.len());
//!
//! // Revert the most recent step
//! migrator.down(1).await?;
//! ```
//!
//! Steps run strictly one after another. A step is recorded in the ledger only after
//! every one of its sub-operations succeeded, and the run stops at the first failure,
//! leaving the ledger at the last good state. Re-running `up` after fixing the cause
//! is always safe because every step is idempotent.

use log::{debug, error, info, warn};
use std::collections::HashSet;

use crate::catalog::SchemaHandle;
use crate::ledger::{LedgerEntry, LedgerError, MigrationLedger, unrecorded};
use crate::step::{Direction, MigrationStep, StepError};
use crate::steps;

/// Errors that can occur during migration operations.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// The ledger could not be read or provisioned.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A step failed; the ledger was left untouched for it.
    #[error("step {step_id} failed ({direction}): {source}")]
    StepFailed {
        /// The failing step.
        step_id: String,
        /// The direction it was executed in.
        direction: Direction,
        /// The underlying failure.
        #[source]
        source: StepError,
    },

    /// A step's schema change succeeded but its ledger write did not.
    ///
    /// After `up`, the next `up` re-runs the step; its existence checks skip the already
    /// applied changes and the entry is recorded then. After `down`, the step's `up` is
    /// re-run straight away so the kept entry still matches the schema.
    #[error("step {step_id} ({direction}) completed but the ledger was not updated: {source}")]
    RecordFailed {
        /// The step whose entry could not be written.
        step_id: String,
        /// The direction it was executed in.
        direction: Direction,
        /// The ledger failure.
        #[source]
        source: LedgerError,
    },

    /// A recorded step no longer has the checksum it was applied with.
    #[error("step {step_id} checksum mismatch: expected {expected}, found {found}")]
    ChecksumMismatch {
        /// The step id.
        step_id: String,
        /// The checksum stored in the ledger.
        expected: String,
        /// The checksum computed from the code.
        found: String,
    },

    /// The ledger records a step this build does not know how to revert.
    #[error("step {step_id} is recorded in the ledger but is not defined")]
    UnknownStep {
        /// The unknown step id.
        step_id: String,
    },
}

impl MigrationError {
    /// The id of the step the error is about, if any.
    pub fn step_id(&self) -> Option<&str> {
        match self {
            MigrationError::Ledger(_) => None,
            MigrationError::StepFailed { step_id, .. }
            | MigrationError::RecordFailed { step_id, .. }
            | MigrationError::ChecksumMismatch { step_id, .. }
            | MigrationError::UnknownStep { step_id } => Some(step_id),
        }
    }
}

/// Applies and reverts steps against a schema handle, tracking them in a ledger.
pub struct Migrator<S, L> {
    schema: S,
    ledger: L,
    steps: Vec<&'static dyn MigrationStep>,
}

impl<S, L> Migrator<S, L>
where
    S: SchemaHandle,
    L: MigrationLedger,
{
    /// Creates a migrator over the built-in [`steps::ALL`].
    pub fn new(schema: S, ledger: L) -> Self {
        Self::with_steps(schema, ledger, steps::ALL.to_vec())
    }

    /// Creates a migrator over an explicit step list. Steps are ordered by id.
    pub fn with_steps(schema: S, ledger: L, mut steps: Vec<&'static dyn MigrationStep>) -> Self {
        steps.sort_by_key(|step| step.id());
        Self {
            schema,
            ledger,
            steps,
        }
    }

    /// The known steps, in application order.
    pub fn steps(&self) -> &[&'static dyn MigrationStep] {
        &self.steps
    }

    /// The schema handle.
    pub fn schema(&self) -> &S {
        &self.schema
    }

    /// The ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    fn find(&self, step_id: &str) -> Option<&'static dyn MigrationStep> {
        self.steps.iter().copied().find(|step| step.id() == step_id)
    }

    fn verify_checksums(&self, executed: &[LedgerEntry]) -> Result<(), MigrationError> {
        for entry in executed {
            match self.find(&entry.step_id) {
                Some(step) => {
                    let found = step.checksum();
                    if found != entry.checksum {
                        return Err(MigrationError::ChecksumMismatch {
                            step_id: entry.step_id.clone(),
                            expected: entry.checksum.clone(),
                            found,
                        });
                    }
                }
                None => warn!(
                    "Ledger records step {} which is not defined in this build",
                    entry.step_id
                ),
            }
        }
        Ok(())
    }

    /// Applies every pending step in order, returning the ids applied by this call.
    pub async fn up(&self) -> Result<Vec<&'static str>, MigrationError> {
        self.ledger.ensure().await?;

        let executed = self.ledger.executed().await?;
        self.verify_checksums(&executed)?;

        let pending = unrecorded(&self.steps, &executed);
        if pending.is_empty() {
            debug!("No pending steps");
        }

        let mut applied = Vec::with_capacity(pending.len());
        for step in pending {
            info!("Applying step {}...", step.id());

            step.up(&self.schema)
                .await
                .map_err(|source| MigrationError::StepFailed {
                    step_id: step.id().to_string(),
                    direction: Direction::Up,
                    source,
                })?;

            self.ledger
                .record(step.id(), &step.checksum())
                .await
                .map_err(|source| MigrationError::RecordFailed {
                    step_id: step.id().to_string(),
                    direction: Direction::Up,
                    source,
                })?;

            info!("Step {} applied successfully", step.id());
            applied.push(step.id());
        }

        Ok(applied)
    }

    /// Reverts the `count` most recently applied steps, newest first.
    pub async fn down(&self, count: usize) -> Result<Vec<&'static str>, MigrationError> {
        self.ledger.ensure().await?;

        let mut executed = self.ledger.executed().await?;
        executed.sort_by(|a, b| a.step_id.cmp(&b.step_id));

        let mut reverted = Vec::with_capacity(count);
        for entry in executed.iter().rev().take(count) {
            let step = self
                .find(&entry.step_id)
                .ok_or_else(|| MigrationError::UnknownStep {
                    step_id: entry.step_id.clone(),
                })?;

            info!("Reverting step {}...", step.id());

            step.down(&self.schema)
                .await
                .map_err(|source| MigrationError::StepFailed {
                    step_id: step.id().to_string(),
                    direction: Direction::Down,
                    source,
                })?;

            if let Err(source) = self.ledger.erase(step.id()).await {
                warn!(
                    "Step {} reverted but its ledger entry was kept, restoring its objects",
                    step.id()
                );
                if let Err(e) = step.up(&self.schema).await {
                    error!("Failed to restore step {}: {}", step.id(), e);
                }
                return Err(MigrationError::RecordFailed {
                    step_id: step.id().to_string(),
                    direction: Direction::Down,
                    source,
                });
            }

            info!("Step {} reverted successfully", step.id());
            reverted.push(step.id());
        }

        if reverted.is_empty() {
            debug!("Nothing to revert");
        }

        Ok(reverted)
    }

    /// Steps not yet recorded in the ledger, in application order.
    ///
    /// Read only: an unprovisioned ledger reports every step as pending.
    pub async fn pending(&self) -> Result<Vec<&'static dyn MigrationStep>, MigrationError> {
        Ok(self.ledger.pending(&self.steps).await?)
    }

    /// Ledger entries, ordered by step id.
    pub async fn executed(&self) -> Result<Vec<LedgerEntry>, MigrationError> {
        let mut executed = self.ledger.executed().await?;
        executed.sort_by(|a, b| a.step_id.cmp(&b.step_id));
        Ok(executed)
    }

    /// Ids of steps defined in this build that the ledger records as applied.
    pub async fn applied_ids(&self) -> Result<HashSet<&'static str>, MigrationError> {
        let executed = self.executed().await?;
        Ok(executed
            .iter()
            .filter_map(|entry| self.find(&entry.step_id))
            .map(|step| step.id())
            .collect())
    }
}
