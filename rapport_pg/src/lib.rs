//! # Rapport postgres backends
//!
//! [`PgSchema`], [`PgLedger`] and [`PgProbe`] implement the `rapport_core` catalog,
//! ledger and liveness traits on top of a `sqlx` pool.

#![deny(missing_docs)]

/// Catalog introspection and DDL for postgres
pub mod catalog;

/// The `_rapport_migrations` ledger table
pub mod ledger;

/// Pool construction
pub mod pool;

/// Liveness probe
pub mod probe;

pub use catalog::PgSchema;
pub use ledger::{LEDGER_TABLE, PgLedger};
pub use pool::PoolConfig;
pub use probe::PgProbe;
