//! Logical-to-physical column resolution.
//!
//! Environments with different histories store the same logical column under
//! different physical names (`therapistId` in one, `therapist_id` in another). Each
//! [`LogicalColumn`] lists the acceptable physical names in priority order and
//! [`LogicalColumn::resolve`] picks the first one present in a [`ColumnSet`].

use crate::catalog::ColumnSet;
use std::fmt;

/// A logical column and its acceptable physical names, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalColumn {
    /// Name used in logs and errors.
    pub name: &'static str,
    /// Physical candidates, probed in order.
    pub candidates: &'static [&'static str],
}

impl LogicalColumn {
    /// Declares a logical column.
    pub const fn new(name: &'static str, candidates: &'static [&'static str]) -> Self {
        Self { name, candidates }
    }

    /// Returns the first candidate present in `columns`.
    pub fn resolve(&self, columns: &ColumnSet) -> Option<&'static str> {
        self.candidates
            .iter()
            .copied()
            .find(|candidate| columns.contains(candidate))
    }
}

impl fmt::Display for LogicalColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.candidates.join(" | "))
    }
}

/// None of a logical column's candidates exist on the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unresolved {
    /// The column that could not be resolved.
    pub column: LogicalColumn,
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no physical column for {}", self.column)
    }
}

/// Resolves every logical column, failing on the first one with no candidate present.
pub fn resolve_all(
    logical: &[LogicalColumn],
    columns: &ColumnSet,
) -> Result<Vec<String>, Unresolved> {
    logical
        .iter()
        .map(|column| {
            column
                .resolve(columns)
                .map(str::to_string)
                .ok_or(Unresolved { column: *column })
        })
        .collect()
}

/// Candidate table for the practice-management schema.
pub mod columns {
    use super::LogicalColumn;

    /// Tenant-scoping column.
    pub const THERAPIST: LogicalColumn = LogicalColumn::new(
        "therapist",
        &["therapistId", "therapist_id", "userId", "user_id"],
    );

    /// Owning client of a note or reflection.
    pub const CLIENT: LogicalColumn = LogicalColumn::new("client", &["clientId", "client_id"]);

    /// Date of a session.
    pub const SESSION_DATE: LogicalColumn = LogicalColumn::new(
        "session date",
        &["date", "sessionDate", "session_date", "scheduledAt", "scheduled_at"],
    );

    /// Client email address.
    pub const EMAIL: LogicalColumn =
        LogicalColumn::new("email", &["email", "emailAddress", "email_address"]);

    /// Row creation timestamp.
    pub const CREATED_AT: LogicalColumn =
        LogicalColumn::new("created at", &["createdAt", "created_at"]);
}
