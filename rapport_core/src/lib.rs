//! # Rapport core
//!
//! Schema-migration and startup-bootstrap core of the rapport practice-management
//! backend: the catalog and ledger abstractions, the idempotent migration steps and
//! their runner, and the connection bootstrapper with its readiness cell. Storage
//! backends live in `rapport_pg` (PostgreSQL) and `rapport_mem` (in-memory, for tests).

#![deny(missing_docs)]

/// Connection bootstrap with bounded retry
pub mod bootstrap;

/// Schema introspection and modification handles
pub mod catalog;

/// Logical-to-physical column resolution
pub mod column;

/// Durable record of applied steps
pub mod ledger;

/// The migration runner
pub mod migrator;

/// Shared readiness state of the datastore
pub mod readiness;

/// The migration step trait and idempotent DDL helpers
pub mod step;

/// The concrete steps, in application order
pub mod steps;

pub mod prelude {
    //! The prelude module for the `rapport_core` crate.
    pub use super::bootstrap::{
        BootstrapConfig, BootstrapOutcome, ConnectionBootstrapper, DatastoreProbe,
    };
    pub use super::catalog::{
        BoxError, ColumnSet, ConstraintSpec, DdlOperation, IndexSpec, SchemaError, SchemaHandle,
        SchemaIntrospector,
    };
    pub use super::column::{LogicalColumn, Unresolved, columns};
    pub use super::ledger::{LedgerEntry, LedgerError, MigrationLedger};
    pub use super::migrator::{MigrationError, Migrator};
    pub use super::readiness::{
        ConnectionPhase, ReadinessReader, ReadinessState, ReadinessWriter,
    };
    pub use super::step::{
        CompositeIndex, Direction, DropOutcome, EnsureOutcome, MigrationStep, StepError,
        SubOperationFailure, SubOperations, drop_constraint_if_present, drop_index_if_present,
        ensure_index, ensure_unique_constraint,
    };
}
