//! Migration steps and the idempotent DDL helpers they are built from.
//!
//! Every helper follows the same protocol: introspect, resolve logical columns, check
//! for the named object, and only then mutate. "Already there" on the way up and
//! "already gone" on the way down are successes.

use async_trait::async_trait;
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::catalog::{ConstraintSpec, IndexSpec, SchemaError, SchemaHandle};
use crate::column::{LogicalColumn, Unresolved, resolve_all};

/// Direction a step is executed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Apply.
    Up,
    /// Revert.
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Up => "up",
            Direction::Down => "down",
        })
    }
}

/// A single named sub-operation that failed.
#[derive(Debug)]
pub struct SubOperationFailure {
    /// What was attempted, e.g. `ensure index idx_sessions_therapist_date`.
    pub label: String,
    /// Why it failed.
    pub error: SchemaError,
}

/// Errors returned by a step's `up` or `down`.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// A single schema operation failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// One or more independent sub-operations failed; the others were still attempted.
    #[error("{} of {attempted} sub-operations failed: {}", failures.len(), summarize(failures))]
    SubOperations {
        /// Number of sub-operations attempted.
        attempted: usize,
        /// Every failure, in attempt order.
        failures: Vec<SubOperationFailure>,
    },
}

fn summarize(failures: &[SubOperationFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{}: {}", failure.label, failure.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Represents a single, versioned schema change.
///
/// Identifiers are compared lexically, so they carry a timestamp prefix
/// (`20250114090000-add-tenant-composite-indexes`). Both directions must be safe to
/// invoke when their target state already exists.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use rapport_core::prelude::*;
///
/// pub struct AddNoteIndex;
///
/// const INDEX: CompositeIndex = CompositeIndex::new(
///     "notes",
///     "idx_notes_client",
///     &[columns::CLIENT],
/// );
///
/// #[async_trait]
/// impl MigrationStep for AddNoteIndex {
///     fn id(&self) -> &'static str { "20250301090000-add-note-index" }
///
///     async fn up(&self, schema: &dyn SchemaHandle) -> Result<(), StepError> {
///         ensure_index(schema, &INDEX).await?;
///         Ok(())
///     }
///
///     async fn down(&self, schema: &dyn SchemaHandle) -> Result<(), StepError> {
///         drop_index_if_present(schema, INDEX.table, INDEX.name).await?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait MigrationStep: Send + Sync {
    /// Sequence-ordered identifier.
    fn id(&self) -> &'static str;

    /// Applies the change.
    async fn up(&self, schema: &dyn SchemaHandle) -> Result<(), StepError>;

    /// Reverts the change.
    async fn down(&self, schema: &dyn SchemaHandle) -> Result<(), StepError>;

    /// Checksum recorded in the ledger and compared on every `up`.
    ///
    /// The default is the SHA-256 of the id, so editing a step's body leaves it
    /// unchanged. Override if you want to include the step's content.
    fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.id().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Debug for dyn MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MigrationStep").field(&self.id()).finish()
    }
}

/// A named composite index (or unique constraint) over logical columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeIndex {
    /// Table name.
    pub table: &'static str,
    /// Deterministic object name.
    pub name: &'static str,
    /// Logical columns, in index order.
    pub columns: &'static [LogicalColumn],
}

impl CompositeIndex {
    /// Declares a composite index.
    pub const fn new(
        table: &'static str,
        name: &'static str,
        columns: &'static [LogicalColumn],
    ) -> Self {
        Self {
            table,
            name,
            columns,
        }
    }
}

/// Result of an `ensure_*` helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The object was created by this call.
    Created,
    /// The object already existed; nothing was changed.
    AlreadyPresent,
    /// A logical column could not be resolved on this environment; nothing was changed.
    Skipped(Unresolved),
}

impl EnsureOutcome {
    /// True if the object exists after the call.
    pub fn is_present(&self) -> bool {
        !matches!(self, EnsureOutcome::Skipped(_))
    }
}

/// Result of a `drop_*_if_present` helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// The object was dropped by this call.
    Dropped,
    /// The object did not exist.
    Absent,
}

/// Resolves the index's columns on the live table.
///
/// `Ok(Err(_))` means the table exists in a shape none of the candidates match.
async fn resolve_columns(
    schema: &dyn SchemaHandle,
    index: &CompositeIndex,
) -> Result<Result<Vec<String>, Unresolved>, SchemaError> {
    let columns = schema.columns_of(index.table).await?;
    Ok(resolve_all(index.columns, &columns))
}

fn log_skip(index: &CompositeIndex, unresolved: &Unresolved) {
    warn!(
        "Skipping `{}` on `{}`: {}. The object will not exist on this environment.",
        index.name, index.table, unresolved
    );
}

/// Creates a non-unique composite index unless an index with that name exists.
pub async fn ensure_index(
    schema: &dyn SchemaHandle,
    index: &CompositeIndex,
) -> Result<EnsureOutcome, SchemaError> {
    if schema.index_exists(index.table, index.name).await? {
        debug!("Index {} already present on {}", index.name, index.table);
        return Ok(EnsureOutcome::AlreadyPresent);
    }

    let columns = match resolve_columns(schema, index).await? {
        Ok(columns) => columns,
        Err(unresolved) => {
            log_skip(index, &unresolved);
            return Ok(EnsureOutcome::Skipped(unresolved));
        }
    };

    schema
        .create_index(&IndexSpec {
            table: index.table.to_string(),
            name: index.name.to_string(),
            columns: columns.clone(),
            unique: false,
        })
        .await?;

    info!(
        "Created index {} on {}({})",
        index.name,
        index.table,
        columns.join(", ")
    );
    Ok(EnsureOutcome::Created)
}

/// Adds a unique constraint unless a constraint with that name exists.
pub async fn ensure_unique_constraint(
    schema: &dyn SchemaHandle,
    constraint: &CompositeIndex,
) -> Result<EnsureOutcome, SchemaError> {
    if schema
        .constraint_exists(constraint.table, constraint.name)
        .await?
    {
        debug!(
            "Constraint {} already present on {}",
            constraint.name, constraint.table
        );
        return Ok(EnsureOutcome::AlreadyPresent);
    }

    let columns = match resolve_columns(schema, constraint).await? {
        Ok(columns) => columns,
        Err(unresolved) => {
            log_skip(constraint, &unresolved);
            return Ok(EnsureOutcome::Skipped(unresolved));
        }
    };

    schema
        .add_unique_constraint(&ConstraintSpec {
            table: constraint.table.to_string(),
            name: constraint.name.to_string(),
            columns: columns.clone(),
        })
        .await?;

    info!(
        "Added unique constraint {} on {}({})",
        constraint.name,
        constraint.table,
        columns.join(", ")
    );
    Ok(EnsureOutcome::Created)
}

/// Drops the index if it exists.
pub async fn drop_index_if_present(
    schema: &dyn SchemaHandle,
    table: &str,
    name: &str,
) -> Result<DropOutcome, SchemaError> {
    if !schema.index_exists(table, name).await? {
        debug!("Index {} already absent from {}", name, table);
        return Ok(DropOutcome::Absent);
    }
    schema.drop_index(table, name).await?;
    info!("Dropped index {} from {}", name, table);
    Ok(DropOutcome::Dropped)
}

/// Drops the constraint if it exists.
pub async fn drop_constraint_if_present(
    schema: &dyn SchemaHandle,
    table: &str,
    name: &str,
) -> Result<DropOutcome, SchemaError> {
    if !schema.constraint_exists(table, name).await? {
        debug!("Constraint {} already absent from {}", name, table);
        return Ok(DropOutcome::Absent);
    }
    schema.drop_constraint(table, name).await?;
    info!("Dropped constraint {} from {}", name, table);
    Ok(DropOutcome::Dropped)
}

/// Collects the results of independent sub-operations within one step.
///
/// Each sub-operation is attempted regardless of earlier failures; [`finish`]
/// reports the step as failed if any of them failed.
///
/// [`finish`]: SubOperations::finish
#[derive(Debug, Default)]
pub struct SubOperations {
    attempted: usize,
    failures: Vec<SubOperationFailure>,
}

impl SubOperations {
    /// Starts an empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one sub-operation's result, returning its value on success.
    pub fn record<T>(
        &mut self,
        label: impl Into<String>,
        result: Result<T, SchemaError>,
    ) -> Option<T> {
        self.attempted += 1;
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                let label = label.into();
                warn!("Sub-operation `{}` failed: {}", label, error);
                self.failures.push(SubOperationFailure { label, error });
                None
            }
        }
    }

    /// Ok if every recorded sub-operation succeeded.
    pub fn finish(self) -> Result<(), StepError> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(StepError::SubOperations {
                attempted: self.attempted,
                failures: self.failures,
            })
        }
    }
}
