//! The composite health endpoint.
//!
//! `GET /api/health` answers as soon as the listener is up. The status code tracks the
//! datastore: `200` once the bootstrapper connected, `503` before that and forever
//! after an exhausted retry budget.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use rapport_core::readiness::ReadinessReader;
use serde::Serialize;

use crate::config::EnvironmentTag;

/// Path of the health route.
pub const HEALTH_PATH: &str = "/api/health";

/// Shared state of the health handler.
#[derive(Debug, Clone)]
pub struct HealthState {
    readiness: ReadinessReader,
    environment: EnvironmentTag,
}

impl HealthState {
    /// Creates the handler state.
    pub fn new(readiness: ReadinessReader, environment: EnvironmentTag) -> Self {
        Self {
            readiness,
            environment,
        }
    }
}

/// Datastore status as reported to load balancers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DbStatus {
    /// Connected.
    Up,
    /// Not connected (yet).
    Down,
}

/// Body of the health response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthBody {
    /// Always `true`: the process is serving.
    pub ok: bool,
    /// Datastore status.
    pub db: DbStatus,
    /// Message of the most recent failed connection attempt.
    pub last_db_error: Option<String>,
    /// Deployment environment.
    pub env: EnvironmentTag,
}

/// Builds the router serving [`HEALTH_PATH`].
pub fn router(state: HealthState) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health))
        .with_state(state)
}

/// Reports liveness and datastore readiness.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthBody>) {
    let snapshot = state.readiness.snapshot();
    let (status, db) = if snapshot.ready() {
        (StatusCode::OK, DbStatus::Up)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, DbStatus::Down)
    };

    (
        status,
        Json(HealthBody {
            ok: true,
            db,
            last_db_error: snapshot.last_error,
            env: state.environment,
        }),
    )
}
