//! Connection bootstrap with bounded retry.

use async_trait::async_trait;
use log::{error, info, warn};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use crate::catalog::BoxError;
use crate::readiness::{ReadinessReader, ReadinessWriter};

/// A lightweight liveness check against the datastore.
#[async_trait]
pub trait DatastoreProbe: Send + Sync {
    /// Succeeds if the datastore accepts connections.
    async fn ping(&self) -> Result<(), BoxError>;
}

/// Retry policy for the connection bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Maximum number of attempts. At least one attempt is always made.
    pub max_attempts: u32,

    /// Fixed delay between attempts.
    pub retry_delay: Duration,

    /// Upper bound for a single attempt; a probe that takes longer counts as failed.
    pub attempt_timeout: Duration,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            retry_delay: Duration::from_secs(3),
            attempt_timeout: Duration::from_secs(5),
        }
    }
}

/// How the bootstrap ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The datastore answered on the given attempt.
    Connected {
        /// Attempts made, including the successful one.
        attempts: u32,
    },
    /// Every attempt failed; the service keeps running degraded.
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Error of the final attempt.
        last_error: String,
    },
}

/// Drives a [`DatastoreProbe`] until it succeeds or the attempt budget runs out,
/// publishing every transition to the readiness cell.
pub struct ConnectionBootstrapper<P> {
    probe: P,
    config: BootstrapConfig,
    readiness: ReadinessWriter,
}

impl<P> ConnectionBootstrapper<P>
where
    P: DatastoreProbe + 'static,
{
    /// Creates a bootstrapper that owns the readiness writer.
    pub fn new(probe: P, config: BootstrapConfig, readiness: ReadinessWriter) -> Self {
        Self {
            probe,
            config,
            readiness,
        }
    }

    /// A reader of the readiness cell this bootstrapper writes to.
    pub fn readiness(&self) -> ReadinessReader {
        self.readiness.reader()
    }

    async fn attempt(&self) -> Result<(), BoxError> {
        match timeout(self.config.attempt_timeout, self.probe.ping()).await {
            Ok(result) => result,
            Err(_) => Err(format!(
                "liveness check timed out after {:?}",
                self.config.attempt_timeout
            )
            .into()),
        }
    }

    /// Runs the retry loop to completion.
    pub async fn run(self) -> BootstrapOutcome {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            self.readiness.begin_attempt(attempt);

            match self.attempt().await {
                Ok(()) => {
                    self.readiness.mark_connected();
                    info!(
                        "Datastore connection established (attempt {}/{})",
                        attempt, max_attempts
                    );
                    return BootstrapOutcome::Connected { attempts: attempt };
                }
                Err(e) => {
                    last_error = e.to_string();
                    self.readiness.record_failure(attempt, &last_error);
                    if attempt < max_attempts {
                        warn!(
                            "Datastore connection failed (attempt {}/{}): {}. Retrying in {:?}",
                            attempt, max_attempts, last_error, self.config.retry_delay
                        );
                        sleep(self.config.retry_delay).await;
                    }
                }
            }
        }

        error!(
            "Datastore unreachable after {} attempts: {}. Serving degraded.",
            max_attempts, last_error
        );
        self.readiness.mark_exhausted(max_attempts);
        BootstrapOutcome::Exhausted {
            attempts: max_attempts,
            last_error,
        }
    }

    /// Runs the retry loop as a background task.
    pub fn spawn(self) -> JoinHandle<BootstrapOutcome> {
        tokio::spawn(self.run())
    }
}
