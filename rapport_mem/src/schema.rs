use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

use rapport_core::prelude::*;

/// A successfully executed DDL statement, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlRecord {
    /// `CREATE INDEX`
    CreateIndex {
        /// Table name.
        table: String,
        /// Index name.
        name: String,
        /// Physical columns.
        columns: Vec<String>,
    },
    /// `DROP INDEX`
    DropIndex {
        /// Table name.
        table: String,
        /// Index name.
        name: String,
    },
    /// `ADD CONSTRAINT .. UNIQUE`
    AddConstraint {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
        /// Physical columns.
        columns: Vec<String>,
    },
    /// `DROP CONSTRAINT`
    DropConstraint {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
    },
}

impl DdlRecord {
    /// The index or constraint the statement touched.
    pub fn object(&self) -> &str {
        match self {
            DdlRecord::CreateIndex { name, .. }
            | DdlRecord::DropIndex { name, .. }
            | DdlRecord::AddConstraint { name, .. }
            | DdlRecord::DropConstraint { name, .. } => name,
        }
    }
}

/// Errors returned by the in-memory schema, mirroring what a real catalog rejects.
#[derive(Debug, thiserror::Error)]
pub enum InMemorySchemaError {
    /// The table does not exist.
    #[error("relation \"{0}\" does not exist")]
    UnknownTable(String),
    /// A referenced column does not exist.
    #[error("column \"{column}\" of relation \"{table}\" does not exist")]
    UnknownColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// An index or constraint with this name already exists.
    #[error("relation \"{0}\" already exists")]
    DuplicateObject(String),
    /// The index or constraint does not exist.
    #[error("object \"{0}\" does not exist")]
    UnknownObject(String),
    /// A failure scheduled by the test.
    #[error("{0}")]
    Injected(String),
}

#[derive(Debug, Default)]
struct TableData {
    columns: BTreeSet<String>,
    indexes: BTreeMap<String, IndexSpec>,
    constraints: BTreeMap<String, ConstraintSpec>,
}

#[derive(Debug, Default)]
struct SchemaData {
    tables: HashMap<String, TableData>,
    ddl_failures: HashMap<String, String>,
    catalog_failures: HashMap<String, String>,
    ddl_log: Vec<DdlRecord>,
}

impl SchemaData {
    fn name_taken(&self, name: &str) -> bool {
        self.tables
            .values()
            .any(|t| t.indexes.contains_key(name) || t.constraints.contains_key(name))
    }

    fn take_ddl_failure(&mut self, object: &str) -> Result<(), InMemorySchemaError> {
        match self.ddl_failures.remove(object) {
            Some(message) => Err(InMemorySchemaError::Injected(message)),
            None => Ok(()),
        }
    }

    fn take_catalog_failure(&mut self, table: &str) -> Result<(), SchemaError> {
        match self.catalog_failures.remove(table) {
            Some(message) => Err(SchemaError::catalog(
                table,
                InMemorySchemaError::Injected(message),
            )),
            None => Ok(()),
        }
    }

    fn table_with_columns(
        &mut self,
        table: &str,
        columns: &[String],
    ) -> Result<&mut TableData, InMemorySchemaError> {
        let data = self
            .tables
            .get_mut(table)
            .ok_or_else(|| InMemorySchemaError::UnknownTable(table.to_string()))?;
        if let Some(missing) = columns.iter().find(|c| !data.columns.contains(*c)) {
            return Err(InMemorySchemaError::UnknownColumn {
                table: table.to_string(),
                column: missing.clone(),
            });
        }
        Ok(data)
    }
}

/// An in-memory schema catalog.
///
/// Behaves like a strict catalog: creating an object whose name is taken, dropping a
/// missing one, or indexing a missing column is an error. This is useful for testing
/// that migration steps check before they mutate. Failures can be scheduled per object
/// or per table to simulate rejected DDL and dropped catalog connections.
#[derive(Clone, Debug, Default)]
pub struct InMemorySchema {
    data: Arc<Mutex<SchemaData>>,
}

/// Builds an [`InMemorySchema`] with its initial tables.
#[derive(Debug, Default)]
pub struct InMemorySchemaBuilder {
    data: SchemaData,
}

impl InMemorySchemaBuilder {
    /// Adds a table with the given physical columns.
    pub fn table(mut self, name: &str, columns: &[&str]) -> Self {
        self.data.tables.insert(
            name.to_string(),
            TableData {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                ..Default::default()
            },
        );
        self
    }

    /// Adds a pre-existing index, as found on a drifted environment.
    pub fn index(mut self, table: &str, name: &str, columns: &[&str]) -> Self {
        let spec = IndexSpec {
            table: table.to_string(),
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        };
        self.data
            .tables
            .entry(table.to_string())
            .or_default()
            .indexes
            .insert(name.to_string(), spec);
        self
    }

    /// Finishes the schema.
    pub fn build(self) -> InMemorySchema {
        InMemorySchema {
            data: Arc::new(Mutex::new(self.data)),
        }
    }
}

impl InMemorySchema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        log::debug!("Creating a new InMemorySchema");
        Self::default()
    }

    /// Starts building a schema.
    pub fn builder() -> InMemorySchemaBuilder {
        InMemorySchemaBuilder::default()
    }

    /// The practice schema with camelCase columns, as created by the ORM.
    pub fn practice_camel_case() -> Self {
        Self::builder()
            .table("sessions", &["id", "therapistId", "clientId", "date", "createdAt"])
            .table("clients", &["id", "therapistId", "email", "name", "createdAt"])
            .table("notes", &["id", "therapistId", "clientId", "body", "createdAt"])
            .table("reflections", &["id", "clientId", "prompt", "createdAt"])
            .build()
    }

    /// The practice schema with snake_case columns, as found on older environments.
    pub fn practice_snake_case() -> Self {
        Self::builder()
            .table(
                "sessions",
                &["id", "therapist_id", "client_id", "date", "created_at"],
            )
            .table("clients", &["id", "therapist_id", "email", "name", "created_at"])
            .table("notes", &["id", "therapist_id", "client_id", "body", "created_at"])
            .table("reflections", &["id", "client_id", "prompt", "created_at"])
            .build()
    }

    /// Makes the next DDL statement touching `object` fail with `message`.
    pub async fn fail_next_ddl(&self, object: &str, message: &str) {
        let mut data = self.data.lock().await;
        data.ddl_failures
            .insert(object.to_string(), message.to_string());
    }

    /// Makes the next catalog query on `table` fail with `message`.
    pub async fn fail_next_catalog_query(&self, table: &str, message: &str) {
        let mut data = self.data.lock().await;
        data.catalog_failures
            .insert(table.to_string(), message.to_string());
    }

    /// Successful DDL statements since creation or the last [`clear_ddl_log`].
    ///
    /// [`clear_ddl_log`]: InMemorySchema::clear_ddl_log
    pub async fn ddl_log(&self) -> Vec<DdlRecord> {
        self.data.lock().await.ddl_log.clone()
    }

    /// Clears the DDL log.
    pub async fn clear_ddl_log(&self) {
        self.data.lock().await.ddl_log.clear();
    }

    /// The index definition, if present.
    pub async fn index(&self, table: &str, name: &str) -> Option<IndexSpec> {
        let data = self.data.lock().await;
        data.tables.get(table)?.indexes.get(name).cloned()
    }

    /// The constraint definition, if present.
    pub async fn constraint(&self, table: &str, name: &str) -> Option<ConstraintSpec> {
        let data = self.data.lock().await;
        data.tables.get(table)?.constraints.get(name).cloned()
    }

    /// Every index and constraint name in the schema, sorted.
    pub async fn object_names(&self) -> BTreeSet<String> {
        let data = self.data.lock().await;
        data.tables
            .values()
            .flat_map(|t| t.indexes.keys().chain(t.constraints.keys()))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SchemaIntrospector for InMemorySchema {
    async fn columns_of(&self, table: &str) -> Result<ColumnSet, SchemaError> {
        let mut data = self.data.lock().await;
        data.take_catalog_failure(table)?;
        Ok(data
            .tables
            .get(table)
            .map(|t| t.columns.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn index_exists(&self, table: &str, name: &str) -> Result<bool, SchemaError> {
        let mut data = self.data.lock().await;
        data.take_catalog_failure(table)?;
        let owner = data
            .tables
            .iter()
            .find(|(_, t)| t.indexes.contains_key(name))
            .map(|(owner, _)| owner.as_str());
        match owner {
            Some(owner) if owner != table => {
                log::warn!("Index {} exists on {}, not on {}", name, owner, table);
                Ok(true)
            }
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    async fn constraint_exists(&self, table: &str, name: &str) -> Result<bool, SchemaError> {
        let mut data = self.data.lock().await;
        data.take_catalog_failure(table)?;
        Ok(data
            .tables
            .get(table)
            .is_some_and(|t| t.constraints.contains_key(name)))
    }
}

#[async_trait]
impl SchemaHandle for InMemorySchema {
    async fn create_index(&self, index: &IndexSpec) -> Result<(), SchemaError> {
        let ddl = |e: InMemorySchemaError| {
            SchemaError::ddl(DdlOperation::CreateIndex, &index.table, &index.name, e)
        };
        let mut data = self.data.lock().await;

        data.take_ddl_failure(&index.name).map_err(ddl)?;
        if data.name_taken(&index.name) {
            return Err(ddl(InMemorySchemaError::DuplicateObject(index.name.clone())));
        }
        data.table_with_columns(&index.table, &index.columns)
            .map_err(ddl)?
            .indexes
            .insert(index.name.clone(), index.clone());

        data.ddl_log.push(DdlRecord::CreateIndex {
            table: index.table.clone(),
            name: index.name.clone(),
            columns: index.columns.clone(),
        });
        Ok(())
    }

    async fn drop_index(&self, table: &str, name: &str) -> Result<(), SchemaError> {
        let ddl =
            |e: InMemorySchemaError| SchemaError::ddl(DdlOperation::DropIndex, table, name, e);
        let mut data = self.data.lock().await;

        data.take_ddl_failure(name).map_err(ddl)?;
        let removed = data
            .tables
            .get_mut(table)
            .and_then(|t| t.indexes.remove(name));
        if removed.is_none() {
            return Err(ddl(InMemorySchemaError::UnknownObject(name.to_string())));
        }

        data.ddl_log.push(DdlRecord::DropIndex {
            table: table.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }

    async fn add_unique_constraint(&self, constraint: &ConstraintSpec) -> Result<(), SchemaError> {
        let ddl = |e: InMemorySchemaError| {
            SchemaError::ddl(
                DdlOperation::AddConstraint,
                &constraint.table,
                &constraint.name,
                e,
            )
        };
        let mut data = self.data.lock().await;

        data.take_ddl_failure(&constraint.name).map_err(ddl)?;
        if data.name_taken(&constraint.name) {
            return Err(ddl(InMemorySchemaError::DuplicateObject(
                constraint.name.clone(),
            )));
        }
        data.table_with_columns(&constraint.table, &constraint.columns)
            .map_err(ddl)?
            .constraints
            .insert(constraint.name.clone(), constraint.clone());

        data.ddl_log.push(DdlRecord::AddConstraint {
            table: constraint.table.clone(),
            name: constraint.name.clone(),
            columns: constraint.columns.clone(),
        });
        Ok(())
    }

    async fn drop_constraint(&self, table: &str, name: &str) -> Result<(), SchemaError> {
        let ddl = |e: InMemorySchemaError| {
            SchemaError::ddl(DdlOperation::DropConstraint, table, name, e)
        };
        let mut data = self.data.lock().await;

        data.take_ddl_failure(name).map_err(ddl)?;
        let removed = data
            .tables
            .get_mut(table)
            .and_then(|t| t.constraints.remove(name));
        if removed.is_none() {
            return Err(ddl(InMemorySchemaError::UnknownObject(name.to_string())));
        }

        data.ddl_log.push(DdlRecord::DropConstraint {
            table: table.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }
}
