//! Step 20250211090000: per-client timeline indexes for notes and reflections.

use async_trait::async_trait;

use crate::catalog::SchemaHandle;
use crate::column::columns::{CLIENT, CREATED_AT};
use crate::step::{
    CompositeIndex, MigrationStep, StepError, SubOperations, drop_index_if_present, ensure_index,
};

const TIMELINE_INDEXES: [CompositeIndex; 2] = [
    CompositeIndex::new("notes", "idx_notes_client_created", &[CLIENT, CREATED_AT]),
    CompositeIndex::new(
        "reflections",
        "idx_reflections_client_created",
        &[CLIENT, CREATED_AT],
    ),
];

/// Adds client+created_at indexes on notes and reflections.
pub struct AddClientTimelineIndexes;

impl AddClientTimelineIndexes {
    /// The indexes this step maintains.
    pub const INDEXES: &'static [CompositeIndex] = &TIMELINE_INDEXES;
}

#[async_trait]
impl MigrationStep for AddClientTimelineIndexes {
    fn id(&self) -> &'static str {
        "20250211090000-add-client-timeline-indexes"
    }

    async fn up(&self, schema: &dyn SchemaHandle) -> Result<(), StepError> {
        let mut ops = SubOperations::new();
        for index in &TIMELINE_INDEXES {
            let result = ensure_index(schema, index).await;
            ops.record(format!("ensure index {}", index.name), result);
        }
        ops.finish()
    }

    async fn down(&self, schema: &dyn SchemaHandle) -> Result<(), StepError> {
        let mut ops = SubOperations::new();
        for index in TIMELINE_INDEXES.iter().rev() {
            let result = drop_index_if_present(schema, index.table, index.name).await;
            ops.record(format!("drop index {}", index.name), result);
        }
        ops.finish()
    }
}
