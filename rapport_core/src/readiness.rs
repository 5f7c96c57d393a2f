//! Readiness of the datastore dependency.
//!
//! The state lives in a `tokio::sync::watch` channel: the single [`ReadinessWriter`]
//! is moved into the connection bootstrapper and any number of [`ReadinessReader`]s
//! are handed to request handlers. Readers always observe the whole
//! [`ReadinessState`] at once, never a ready flag from one update paired with an
//! error from another.

use log::debug;
use std::fmt;
use tokio::sync::watch;

/// Connection lifecycle of the datastore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// No attempt has been made yet.
    #[default]
    Disconnected,
    /// An attempt is in flight or scheduled.
    Connecting {
        /// 1-based attempt number.
        attempt: u32,
    },
    /// A liveness check succeeded. Terminal.
    Connected,
    /// The retry budget was exhausted. Terminal for the process lifetime.
    Failed {
        /// Attempts made.
        attempts: u32,
    },
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionPhase::Disconnected => f.write_str("disconnected"),
            ConnectionPhase::Connecting { attempt } => write!(f, "connecting (attempt {attempt})"),
            ConnectionPhase::Connected => f.write_str("connected"),
            ConnectionPhase::Failed { attempts } => write!(f, "failed after {attempts} attempts"),
        }
    }
}

/// A consistent snapshot of the datastore's readiness.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadinessState {
    /// Current phase.
    pub phase: ConnectionPhase,
    /// Message of the most recent failed attempt. Cleared on connect.
    pub last_error: Option<String>,
}

impl ReadinessState {
    /// True once the datastore has been confirmed usable.
    pub fn ready(&self) -> bool {
        self.phase == ConnectionPhase::Connected
    }
}

/// Creates a readiness cell in the [`ConnectionPhase::Disconnected`] phase.
pub fn channel() -> (ReadinessWriter, ReadinessReader) {
    let (tx, rx) = watch::channel(ReadinessState::default());
    (ReadinessWriter { tx }, ReadinessReader { rx })
}

/// The single writer of the readiness cell.
///
/// Once [`ConnectionPhase::Connected`] is reached every further update is ignored:
/// readiness is not re-validated after the first successful check.
#[derive(Debug)]
pub struct ReadinessWriter {
    tx: watch::Sender<ReadinessState>,
}

impl ReadinessWriter {
    /// A new reader of this cell.
    pub fn reader(&self) -> ReadinessReader {
        ReadinessReader {
            rx: self.tx.subscribe(),
        }
    }

    /// Snapshot of the current state.
    pub fn snapshot(&self) -> ReadinessState {
        self.tx.borrow().clone()
    }

    fn update(&self, next: impl FnOnce(&ReadinessState) -> ReadinessState) {
        self.tx.send_if_modified(|state| {
            if state.ready() {
                debug!("Readiness already connected, ignoring update");
                return false;
            }
            *state = next(state);
            true
        });
    }

    /// An attempt is starting. The previous error, if any, is kept until it resolves.
    pub fn begin_attempt(&self, attempt: u32) {
        self.update(|state| ReadinessState {
            phase: ConnectionPhase::Connecting { attempt },
            last_error: state.last_error.clone(),
        });
    }

    /// An attempt failed.
    pub fn record_failure(&self, attempt: u32, error: impl fmt::Display) {
        let message = error.to_string();
        self.update(|_| ReadinessState {
            phase: ConnectionPhase::Connecting { attempt },
            last_error: Some(message),
        });
    }

    /// The datastore is usable.
    pub fn mark_connected(&self) {
        self.update(|_| ReadinessState {
            phase: ConnectionPhase::Connected,
            last_error: None,
        });
    }

    /// The retry budget is exhausted.
    pub fn mark_exhausted(&self, attempts: u32) {
        self.update(|state| ReadinessState {
            phase: ConnectionPhase::Failed { attempts },
            last_error: state.last_error.clone(),
        });
    }
}

/// Read side of the readiness cell.
#[derive(Debug, Clone)]
pub struct ReadinessReader {
    rx: watch::Receiver<ReadinessState>,
}

impl ReadinessReader {
    /// Snapshot of the current state.
    pub fn snapshot(&self) -> ReadinessState {
        self.rx.borrow().clone()
    }

    /// Waits until the state satisfies `predicate` and returns that state.
    ///
    /// Returns `None` if the writer was dropped before the predicate held.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&ReadinessState) -> bool,
    ) -> Option<ReadinessState> {
        self.rx.wait_for(predicate).await.ok().map(|state| state.clone())
    }
}
