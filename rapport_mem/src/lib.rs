//! # Rapport memory backends
//!
//! In-memory implementations of rapport's schema catalog, migration ledger and
//! datastore probes, primarily for testing.
//!
//! The schema is strict in the way a real catalog is (duplicate names and missing
//! objects are errors), and every backend can schedule failures, so tests can drive the
//! migrator and bootstrapper through partial application, crashes between a schema
//! change and its ledger write, and flaky connections:
//!
//! ```ignore
//! use rapport_core::migrator::Migrator;
//! use rapport_mem::{InMemoryLedger, InMemorySchema};
//!
//! let schema = InMemorySchema::practice_snake_case();
//! let migrator = Migrator::new(schema.clone(), InMemoryLedger::new());
//!
//! schema.fail_next_ddl("idx_clients_therapist_email", "lock timeout").await;
//! assert!(migrator.up().await.is_err());
//! assert!(migrator.up().await.is_ok());
//! ```

#![deny(missing_docs)]

mod ledger;
mod probe;
mod schema;

pub use ledger::*;
pub use probe::*;
pub use schema::*;
