use async_trait::async_trait;
use rapport_core::ledger::{LedgerEntry, LedgerError, MigrationLedger};
use sqlx::{PgPool, Row};

/// Name of the ledger table.
pub const LEDGER_TABLE: &str = "_rapport_migrations";

/// Tracks applied steps in the `_rapport_migrations` table.
///
/// Each write is a single autocommitted statement; the table shares the pool with the
/// schema handle.
#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    /// Creates a ledger over the pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MigrationLedger for PgLedger {
    async fn ensure(&self) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _rapport_migrations (
                step_id VARCHAR(255) PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                checksum VARCHAR(64) NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(LedgerError::storage)?;

        Ok(())
    }

    async fn executed(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let (provisioned,): (bool,) =
            sqlx::query_as("SELECT to_regclass('_rapport_migrations') IS NOT NULL")
                .fetch_one(&self.pool)
                .await
                .map_err(LedgerError::storage)?;
        if !provisioned {
            log::debug!("Ledger table {} does not exist yet", LEDGER_TABLE);
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT step_id, applied_at, checksum
            FROM _rapport_migrations
            ORDER BY step_id COLLATE "C" ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(LedgerError::storage)?;

        Ok(rows
            .into_iter()
            .map(|row| LedgerEntry {
                step_id: row.get("step_id"),
                applied_at: row.get("applied_at"),
                checksum: row.get("checksum"),
            })
            .collect())
    }

    async fn record(&self, step_id: &str, checksum: &str) -> Result<(), LedgerError> {
        let result = sqlx::query(
            r#"
            INSERT INTO _rapport_migrations (step_id, checksum)
            VALUES ($1, $2)
            ON CONFLICT (step_id) DO NOTHING
            "#,
        )
        .bind(step_id)
        .bind(checksum)
        .execute(&self.pool)
        .await
        .map_err(LedgerError::storage)?;

        if result.rows_affected() == 0 {
            log::debug!("Step {} was already recorded", step_id);
        }
        Ok(())
    }

    async fn erase(&self, step_id: &str) -> Result<(), LedgerError> {
        sqlx::query("DELETE FROM _rapport_migrations WHERE step_id = $1")
            .bind(step_id)
            .execute(&self.pool)
            .await
            .map_err(LedgerError::storage)?;

        Ok(())
    }
}
