//! Step 20250114090000: composite indexes on the tenant-scoping column.
//!
//! Nearly every query of the API filters by therapist first, then by the session
//! date (calendar views) or the client email (lookups during intake).

use async_trait::async_trait;

use crate::catalog::SchemaHandle;
use crate::column::columns::{EMAIL, SESSION_DATE, THERAPIST};
use crate::step::{
    CompositeIndex, MigrationStep, StepError, SubOperations, drop_index_if_present, ensure_index,
};

/// `sessions(therapist, date)`
pub const SESSIONS_BY_THERAPIST_DATE: CompositeIndex = CompositeIndex::new(
    "sessions",
    "idx_sessions_therapist_date",
    &[THERAPIST, SESSION_DATE],
);

/// `clients(therapist, email)`; promoted to a unique constraint by the next step.
pub const CLIENTS_BY_THERAPIST_EMAIL: CompositeIndex = CompositeIndex::new(
    "clients",
    "idx_clients_therapist_email",
    &[THERAPIST, EMAIL],
);

const TENANT_INDEXES: [CompositeIndex; 2] =
    [SESSIONS_BY_THERAPIST_DATE, CLIENTS_BY_THERAPIST_EMAIL];

/// Adds owner+date and owner+email composite indexes.
pub struct AddTenantCompositeIndexes;

impl AddTenantCompositeIndexes {
    /// The indexes this step maintains.
    pub const INDEXES: &'static [CompositeIndex] = &TENANT_INDEXES;
}

#[async_trait]
impl MigrationStep for AddTenantCompositeIndexes {
    fn id(&self) -> &'static str {
        "20250114090000-add-tenant-composite-indexes"
    }

    async fn up(&self, schema: &dyn SchemaHandle) -> Result<(), StepError> {
        let mut ops = SubOperations::new();
        for index in &TENANT_INDEXES {
            let result = ensure_index(schema, index).await;
            ops.record(format!("ensure index {}", index.name), result);
        }
        ops.finish()
    }

    async fn down(&self, schema: &dyn SchemaHandle) -> Result<(), StepError> {
        let mut ops = SubOperations::new();
        for index in TENANT_INDEXES.iter().rev() {
            let result = drop_index_if_present(schema, index.table, index.name).await;
            ops.record(format!("drop index {}", index.name), result);
        }
        ops.finish()
    }
}
