use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use rapport_core::prelude::*;

/// Errors returned by the in-memory ledger.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct InMemoryLedgerError(String);

#[derive(Debug, Default)]
struct LedgerData {
    entries: BTreeMap<String, LedgerEntry>,
    provisioned: bool,
    record_failure: Option<String>,
    erase_failure: Option<String>,
}

/// An in-memory migration ledger.
///
/// Entries are keyed by step id, so recording twice keeps the first entry. Failures of
/// the next `record` or `erase` can be scheduled to simulate a crash between a step's
/// schema change and its ledger write.
#[derive(Clone, Debug, Default)]
pub struct InMemoryLedger {
    data: Arc<Mutex<LedgerData>>,
}

impl InMemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        log::debug!("Creating a new InMemoryLedger");
        Self::default()
    }

    /// Inserts an entry directly, bypassing the migrator.
    pub async fn insert(&self, step_id: &str, checksum: &str) {
        let mut data = self.data.lock().await;
        data.entries.insert(
            step_id.to_string(),
            LedgerEntry {
                step_id: step_id.to_string(),
                applied_at: chrono::Utc::now(),
                checksum: checksum.to_string(),
            },
        );
    }

    /// Makes the next `record` fail with `message`.
    pub async fn fail_next_record(&self, message: &str) {
        self.data.lock().await.record_failure = Some(message.to_string());
    }

    /// Makes the next `erase` fail with `message`.
    pub async fn fail_next_erase(&self, message: &str) {
        self.data.lock().await.erase_failure = Some(message.to_string());
    }

    /// Whether `ensure` has been called.
    pub async fn is_provisioned(&self) -> bool {
        self.data.lock().await.provisioned
    }

    /// Recorded step ids, in order.
    pub async fn step_ids(&self) -> Vec<String> {
        self.data.lock().await.entries.keys().cloned().collect()
    }
}

#[async_trait]
impl MigrationLedger for InMemoryLedger {
    async fn ensure(&self) -> Result<(), LedgerError> {
        self.data.lock().await.provisioned = true;
        Ok(())
    }

    async fn executed(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.data.lock().await.entries.values().cloned().collect())
    }

    async fn record(&self, step_id: &str, checksum: &str) -> Result<(), LedgerError> {
        let mut data = self.data.lock().await;
        if let Some(message) = data.record_failure.take() {
            return Err(LedgerError::storage(InMemoryLedgerError(message)));
        }
        data.entries
            .entry(step_id.to_string())
            .or_insert_with(|| LedgerEntry {
                step_id: step_id.to_string(),
                applied_at: chrono::Utc::now(),
                checksum: checksum.to_string(),
            });
        Ok(())
    }

    async fn erase(&self, step_id: &str) -> Result<(), LedgerError> {
        let mut data = self.data.lock().await;
        if let Some(message) = data.erase_failure.take() {
            return Err(LedgerError::storage(InMemoryLedgerError(message)));
        }
        data.entries.remove(step_id);
        Ok(())
    }
}
