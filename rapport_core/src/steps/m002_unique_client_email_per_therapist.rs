//! Step 20250128090000: one client email per therapist.
//!
//! Promotes the non-unique `idx_clients_therapist_email` into the unique constraint
//! `uq_clients_therapist_email`. The legacy index is only dropped once the constraint
//! is confirmed, so a failed promotion never leaves the lookup unindexed.

use async_trait::async_trait;

use super::m001_add_tenant_composite_indexes::CLIENTS_BY_THERAPIST_EMAIL;
use crate::catalog::SchemaHandle;
use crate::column::columns::{EMAIL, THERAPIST};
use crate::step::{
    CompositeIndex, MigrationStep, StepError, SubOperations, drop_constraint_if_present,
    drop_index_if_present, ensure_index, ensure_unique_constraint,
};

/// `UNIQUE clients(therapist, email)`
pub const UNIQUE_CLIENT_EMAIL: CompositeIndex = CompositeIndex::new(
    "clients",
    "uq_clients_therapist_email",
    &[THERAPIST, EMAIL],
);

/// Replaces the owner+email index with a uniqueness constraint.
pub struct UniqueClientEmailPerTherapist;

impl UniqueClientEmailPerTherapist {
    /// The constraint this step adds.
    pub const CONSTRAINT: CompositeIndex = UNIQUE_CLIENT_EMAIL;
    /// The index it supersedes.
    pub const LEGACY_INDEX: CompositeIndex = CLIENTS_BY_THERAPIST_EMAIL;
}

#[async_trait]
impl MigrationStep for UniqueClientEmailPerTherapist {
    fn id(&self) -> &'static str {
        "20250128090000-unique-client-email-per-therapist"
    }

    async fn up(&self, schema: &dyn SchemaHandle) -> Result<(), StepError> {
        let mut ops = SubOperations::new();

        let constraint = ensure_unique_constraint(schema, &UNIQUE_CLIENT_EMAIL).await;
        let confirmed = ops
            .record(
                format!("ensure constraint {}", UNIQUE_CLIENT_EMAIL.name),
                constraint,
            )
            .is_some_and(|outcome| outcome.is_present());

        if confirmed {
            let legacy = CLIENTS_BY_THERAPIST_EMAIL;
            let result = drop_index_if_present(schema, legacy.table, legacy.name).await;
            ops.record(format!("drop index {}", legacy.name), result);
        }

        ops.finish()
    }

    async fn down(&self, schema: &dyn SchemaHandle) -> Result<(), StepError> {
        let mut ops = SubOperations::new();

        let legacy = ensure_index(schema, &CLIENTS_BY_THERAPIST_EMAIL).await;
        let restored = ops
            .record(
                format!("ensure index {}", CLIENTS_BY_THERAPIST_EMAIL.name),
                legacy,
            )
            .is_some();

        if restored {
            let result = drop_constraint_if_present(
                schema,
                UNIQUE_CLIENT_EMAIL.table,
                UNIQUE_CLIENT_EMAIL.name,
            )
            .await;
            ops.record(format!("drop constraint {}", UNIQUE_CLIENT_EMAIL.name), result);
        }

        ops.finish()
    }
}
