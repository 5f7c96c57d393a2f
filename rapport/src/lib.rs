//! # Rapport
//!
//! Service entry points of the rapport backend: the `rapport-server` startup sequence
//! with its health endpoint, and the `rapport-migrate` operator CLI.

#![deny(missing_docs)]

/// The `rapport-migrate` directive runner
pub mod cli;

/// Environment configuration
pub mod config;

/// The `/api/health` endpoint
pub mod health;

/// Listener-first startup with background datastore bootstrap
pub mod supervisor;

/// Postgres backends.
pub mod pg {
    //! Re-exports `rapport_pg`.
    pub use rapport_pg::*;
}

pub mod prelude {
    //! The prelude module for the `rapport` crate.
    pub use rapport_core::prelude::*;

    pub use super::cli::{Command, Directive, Exit};
    pub use super::config::{ConfigError, EnvironmentTag, ServiceConfig};
    pub use super::health::{DbStatus, HealthBody, HealthState};
    pub use super::supervisor::{RunningService, ServiceError, Supervisor};
}
