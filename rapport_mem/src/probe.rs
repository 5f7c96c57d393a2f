use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::{Mutex, mpsc};

use rapport_core::prelude::*;

/// A probe that fails a fixed number of times before succeeding.
#[derive(Clone, Debug)]
pub struct FlakyProbe {
    failures: Option<u32>,
    attempts: Arc<AtomicU32>,
}

impl FlakyProbe {
    /// Fails the first `failures` pings, then succeeds.
    pub fn failing(failures: u32) -> Self {
        Self {
            failures: Some(failures),
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Never succeeds.
    pub fn always_failing() -> Self {
        Self {
            failures: None,
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Pings received so far, across all clones.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatastoreProbe for FlakyProbe {
    async fn ping(&self) -> Result<(), BoxError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        match self.failures {
            Some(failures) if attempt > failures => Ok(()),
            _ => Err(format!("connection refused (attempt {attempt})").into()),
        }
    }
}

/// A probe whose every ping waits for the test to script its outcome.
///
/// Lets a test observe the service between attempts.
#[derive(Debug)]
pub struct ScriptedProbe {
    outcomes: Mutex<mpsc::UnboundedReceiver<Result<(), String>>>,
}

/// The scripting side of a [`ScriptedProbe`].
#[derive(Clone, Debug)]
pub struct ProbeScript {
    tx: mpsc::UnboundedSender<Result<(), String>>,
}

impl ScriptedProbe {
    /// Creates a probe and the script that drives it.
    pub fn channel() -> (Self, ProbeScript) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                outcomes: Mutex::new(rx),
            },
            ProbeScript { tx },
        )
    }
}

impl ProbeScript {
    /// The pending or next ping fails with `message`.
    pub fn fail(&self, message: &str) {
        let _ = self.tx.send(Err(message.to_string()));
    }

    /// The pending or next ping succeeds.
    pub fn succeed(&self) {
        let _ = self.tx.send(Ok(()));
    }
}

#[async_trait]
impl DatastoreProbe for ScriptedProbe {
    async fn ping(&self) -> Result<(), BoxError> {
        let mut outcomes = self.outcomes.lock().await;
        match outcomes.recv().await {
            Some(outcome) => outcome.map_err(Into::into),
            None => Err("probe script dropped".into()),
        }
    }
}
