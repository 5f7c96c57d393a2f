use async_trait::async_trait;
use rapport_core::bootstrap::DatastoreProbe;
use rapport_core::catalog::BoxError;
use sqlx::{Connection, PgPool};

/// Checks liveness by acquiring a pooled connection and pinging it.
#[derive(Debug, Clone)]
pub struct PgProbe {
    pool: PgPool,
}

impl PgProbe {
    /// Creates a probe over the pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatastoreProbe for PgProbe {
    async fn ping(&self) -> Result<(), BoxError> {
        let mut conn = self.pool.acquire().await?;
        conn.ping().await?;
        Ok(())
    }
}
