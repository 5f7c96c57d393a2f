//! Schema catalog access.
//!
//! [`SchemaIntrospector`] answers read-only questions about the live schema and
//! [`SchemaHandle`] adds the raw DDL operations used by migration steps. Handles never
//! check for existence on their own: the step helpers in [`crate::step`] perform the
//! check-then-create and check-then-drop protocol on top of them.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;

/// Boxed error carried from a storage backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The physical column names present on a table at introspection time.
///
/// A table that does not exist introspects as an empty set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSet(BTreeSet<String>);

impl ColumnSet {
    /// Creates an empty column set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a column with exactly this physical name is present.
    pub fn contains(&self, column: &str) -> bool {
        self.0.contains(column)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the table has no columns (or does not exist).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the column names in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ColumnSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// A fully resolved index definition, expressed in physical column names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// Table the index belongs to.
    pub table: String,
    /// Deterministic index name.
    pub name: String,
    /// Physical column names, in index order.
    pub columns: Vec<String>,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
}

/// A fully resolved unique constraint definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintSpec {
    /// Table the constraint belongs to.
    pub table: String,
    /// Deterministic constraint name.
    pub name: String,
    /// Physical column names covered by the constraint.
    pub columns: Vec<String>,
}

/// The DDL operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlOperation {
    /// `CREATE INDEX`
    CreateIndex,
    /// `DROP INDEX`
    DropIndex,
    /// `ALTER TABLE .. ADD CONSTRAINT .. UNIQUE`
    AddConstraint,
    /// `ALTER TABLE .. DROP CONSTRAINT`
    DropConstraint,
}

impl fmt::Display for DdlOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DdlOperation::CreateIndex => "create index",
            DdlOperation::DropIndex => "drop index",
            DdlOperation::AddConstraint => "add constraint",
            DdlOperation::DropConstraint => "drop constraint",
        })
    }
}

/// Errors surfaced by introspection and DDL.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The catalog could not be queried. Never to be read as "object does not exist".
    #[error("catalog query on `{table}` failed: {source}")]
    Catalog {
        /// The table being introspected.
        table: String,
        /// The backend error.
        #[source]
        source: BoxError,
    },

    /// The datastore rejected a schema modification.
    #[error("{operation} `{object}` on `{table}` failed: {source}")]
    Ddl {
        /// What was attempted.
        operation: DdlOperation,
        /// The table the object belongs to.
        table: String,
        /// The index or constraint name.
        object: String,
        /// The backend error.
        #[source]
        source: BoxError,
    },
}

impl SchemaError {
    /// Wraps a backend error raised while querying the catalog for `table`.
    pub fn catalog(table: &str, source: impl Into<BoxError>) -> Self {
        SchemaError::Catalog {
            table: table.to_string(),
            source: source.into(),
        }
    }

    /// Wraps a backend error raised by a DDL statement.
    pub fn ddl(
        operation: DdlOperation,
        table: &str,
        object: &str,
        source: impl Into<BoxError>,
    ) -> Self {
        SchemaError::Ddl {
            operation,
            table: table.to_string(),
            object: object.to_string(),
            source: source.into(),
        }
    }
}

/// Read-only catalog queries scoped to the current database schema.
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Physical column names of `table`.
    async fn columns_of(&self, table: &str) -> Result<ColumnSet, SchemaError>;

    /// Whether an index called `name` exists on `table`.
    async fn index_exists(&self, table: &str, name: &str) -> Result<bool, SchemaError>;

    /// Whether a constraint called `name` exists on `table`.
    async fn constraint_exists(&self, table: &str, name: &str) -> Result<bool, SchemaError>;
}

/// Schema-modification handle passed to migration steps.
#[async_trait]
pub trait SchemaHandle: SchemaIntrospector {
    /// Creates the index. Fails if an object with the same name already exists.
    async fn create_index(&self, index: &IndexSpec) -> Result<(), SchemaError>;

    /// Drops the index. Fails if it does not exist.
    async fn drop_index(&self, table: &str, name: &str) -> Result<(), SchemaError>;

    /// Adds a unique constraint. Fails if an object with the same name already exists.
    async fn add_unique_constraint(&self, constraint: &ConstraintSpec) -> Result<(), SchemaError>;

    /// Drops the constraint. Fails if it does not exist.
    async fn drop_constraint(&self, table: &str, name: &str) -> Result<(), SchemaError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_set_is_exact_match() {
        let columns: ColumnSet = ["id", "therapist_id"].into_iter().collect();
        assert!(columns.contains("therapist_id"));
        assert!(!columns.contains("therapistId"));
        assert_eq!(columns.len(), 2);
    }

    #[test]
    fn ddl_error_names_the_object() {
        let err = SchemaError::ddl(
            DdlOperation::CreateIndex,
            "clients",
            "idx_clients_therapist_email",
            "permission denied",
        );
        assert_eq!(
            err.to_string(),
            "create index `idx_clients_therapist_email` on `clients` failed: permission denied"
        );
    }
}
