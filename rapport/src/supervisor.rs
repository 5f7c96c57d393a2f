//! Listener-first startup.
//!
//! The listener is bound before the datastore is contacted, so health probes get an
//! answer from the first moment: `503` while the bootstrapper retries, `200` once it
//! connected. A datastore that never comes up leaves the process serving `503`.

use log::info;
use rapport_core::bootstrap::{
    BootstrapConfig, BootstrapOutcome, ConnectionBootstrapper, DatastoreProbe,
};
use rapport_core::catalog::BoxError;
use rapport_core::readiness::{self, ReadinessReader};
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::{ConfigError, EnvironmentTag, ServiceConfig};
use crate::health::{self, HealthState};

/// Errors that stop the service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Binding or serving the listener failed.
    #[error("listener error: {0}")]
    Io(#[from] io::Error),

    /// A background task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// The configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The database pool could not be created.
    #[error("invalid database pool configuration: {0}")]
    Pool(#[source] BoxError),
}

/// Starts the HTTP listener and the connection bootstrapper.
pub struct Supervisor<P> {
    bind_addr: String,
    environment: EnvironmentTag,
    bootstrap: BootstrapConfig,
    probe: P,
}

/// Handles of a started service.
#[derive(Debug)]
pub struct RunningService {
    /// The bound address.
    pub local_addr: SocketAddr,
    /// Reader of the datastore readiness.
    pub readiness: ReadinessReader,
    /// The HTTP server task.
    pub server: JoinHandle<io::Result<()>>,
    /// The bootstrap task.
    pub bootstrap: JoinHandle<BootstrapOutcome>,
}

impl RunningService {
    /// Serves until the listener fails. The bootstrap task keeps running detached.
    pub async fn serve(self) -> Result<(), ServiceError> {
        self.server.await??;
        Ok(())
    }

    /// Stops both tasks.
    pub fn shutdown(self) {
        self.bootstrap.abort();
        self.server.abort();
    }
}

impl<P> Supervisor<P>
where
    P: DatastoreProbe + 'static,
{
    /// Creates a supervisor for `config`, probing the datastore with `probe`.
    pub fn new(config: &ServiceConfig, probe: P) -> Self {
        Self {
            bind_addr: config.bind_addr(),
            environment: config.environment,
            bootstrap: config.bootstrap.clone(),
            probe,
        }
    }

    /// Binds the listener, starts serving and spawns the bootstrapper.
    ///
    /// Returns as soon as the listener is bound; the datastore is contacted in the
    /// background.
    pub async fn start(self) -> Result<RunningService, ServiceError> {
        let listener = TcpListener::bind(&self.bind_addr).await?;
        let local_addr = listener.local_addr()?;

        let (writer, reader) = readiness::channel();
        let app = health::router(HealthState::new(reader.clone(), self.environment));
        let server = tokio::spawn(async move { axum::serve(listener, app).await });
        info!("Listening on {} (env: {})", local_addr, self.environment);

        let bootstrap = ConnectionBootstrapper::new(self.probe, self.bootstrap, writer).spawn();

        Ok(RunningService {
            local_addr,
            readiness: reader,
            server,
            bootstrap,
        })
    }

    /// Starts the service and serves until the listener fails.
    pub async fn run(self) -> Result<(), ServiceError> {
        self.start().await?.serve().await
    }
}

/// Builds the postgres-backed supervisor from the process environment and runs it.
pub async fn run_from_env() -> Result<(), ServiceError> {
    let config = ServiceConfig::from_env()?;
    let pool = config
        .pool
        .connect_lazy()
        .map_err(|e| ServiceError::Pool(e.into()))?;
    Supervisor::new(&config, rapport_pg::PgProbe::new(pool))
        .run()
        .await
}
