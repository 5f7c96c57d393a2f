//! Catalog introspection and DDL against the current schema.
//!
//! Every statement runs in autocommit on its own pooled connection, so one rejected
//! statement never aborts the sub-operations that follow it.

use async_trait::async_trait;
use log::{debug, warn};
use rapport_core::catalog::{
    ColumnSet, ConstraintSpec, DdlOperation, IndexSpec, SchemaError, SchemaHandle,
    SchemaIntrospector,
};
use sqlx::PgPool;

/// A postgres implementation of [`SchemaHandle`].
#[derive(Debug, Clone)]
pub struct PgSchema {
    pool: PgPool,
}

impl PgSchema {
    /// Creates a schema handle over the pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn execute_ddl(
        &self,
        operation: DdlOperation,
        table: &str,
        object: &str,
        sql: String,
    ) -> Result<(), SchemaError> {
        debug!("Executing: {}", sql);
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| SchemaError::ddl(operation, table, object, e))?;
        Ok(())
    }
}

/// Quotes an identifier, preserving case.
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl SchemaIntrospector for PgSchema {
    async fn columns_of(&self, table: &str) -> Result<ColumnSet, SchemaError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT column_name::text
            FROM information_schema.columns
            WHERE table_schema = current_schema()
              AND table_name = $1
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SchemaError::catalog(table, e))?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn index_exists(&self, table: &str, name: &str) -> Result<bool, SchemaError> {
        // Index names are unique per schema, not per table.
        let owner: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT tablename::text
            FROM pg_indexes
            WHERE schemaname = current_schema()
              AND indexname = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SchemaError::catalog(table, e))?;

        match owner {
            Some((owner,)) if owner != table => {
                warn!("Index {} exists on {}, not on {}", name, owner, table);
                Ok(true)
            }
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    async fn constraint_exists(&self, table: &str, name: &str) -> Result<bool, SchemaError> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM information_schema.table_constraints
                WHERE constraint_schema = current_schema()
                  AND table_name = $1
                  AND constraint_name = $2
            )
            "#,
        )
        .bind(table)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SchemaError::catalog(table, e))?;

        Ok(exists)
    }
}

#[async_trait]
impl SchemaHandle for PgSchema {
    async fn create_index(&self, index: &IndexSpec) -> Result<(), SchemaError> {
        let sql = format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            quote_ident(&index.name),
            quote_ident(&index.table),
            column_list(&index.columns)
        );
        self.execute_ddl(DdlOperation::CreateIndex, &index.table, &index.name, sql)
            .await
    }

    async fn drop_index(&self, table: &str, name: &str) -> Result<(), SchemaError> {
        let sql = format!("DROP INDEX {}", quote_ident(name));
        self.execute_ddl(DdlOperation::DropIndex, table, name, sql)
            .await
    }

    async fn add_unique_constraint(&self, constraint: &ConstraintSpec) -> Result<(), SchemaError> {
        let sql = format!(
            "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
            quote_ident(&constraint.table),
            quote_ident(&constraint.name),
            column_list(&constraint.columns)
        );
        self.execute_ddl(
            DdlOperation::AddConstraint,
            &constraint.table,
            &constraint.name,
            sql,
        )
        .await
    }

    async fn drop_constraint(&self, table: &str, name: &str) -> Result<(), SchemaError> {
        let sql = format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            quote_ident(table),
            quote_ident(name)
        );
        self.execute_ddl(DdlOperation::DropConstraint, table, name, sql)
            .await
    }
}
