//! Participant-side position acquisition as an owned, cancelable handle.

use crate::errors::CheckInFailure;
use crate::models::geo::Coordinates;
use futures::{Stream, StreamExt};
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Position acquisition failures, reported with their platform codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionError {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
}

impl PositionError {
    pub fn code(&self) -> &'static str {
        match self {
            PositionError::PermissionDenied => "PERMISSION_DENIED",
            PositionError::PositionUnavailable => "POSITION_UNAVAILABLE",
            PositionError::Timeout => "TIMEOUT",
        }
    }

    pub fn failure(&self) -> CheckInFailure {
        match self {
            PositionError::PermissionDenied => CheckInFailure::LocationPermissionDenied,
            PositionError::PositionUnavailable | PositionError::Timeout => {
                CheckInFailure::LocationUnavailable
            }
        }
    }
}

impl fmt::Display for PositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionReading {
    pub coords: Coordinates,
    pub accuracy_m: Option<f64>,
    /// Epoch millis at which the fix was taken.
    pub observed_at_ms: i64,
}

pub type PositionUpdate = Result<PositionReading, PositionError>;

/// Manual push side of a [`PositionWatch`].
pub struct PositionFeeder {
    tx: watch::Sender<Option<PositionUpdate>>,
}

impl PositionFeeder {
    /// Returns false once the watch was cancelled or dropped.
    pub fn push(&self, update: PositionUpdate) -> bool {
        self.tx.send(Some(update)).is_ok()
    }
}

/// Holds the most recent position update. Dropping or cancelling it stops
/// the background subscription.
pub struct PositionWatch {
    rx: Option<watch::Receiver<Option<PositionUpdate>>>,
    task: Option<JoinHandle<()>>,
}

impl PositionWatch {
    /// A watch fed by hand, e.g. from a UI callback.
    pub fn channel() -> (PositionFeeder, PositionWatch) {
        let (tx, rx) = watch::channel(None);
        (
            PositionFeeder { tx },
            PositionWatch {
                rx: Some(rx),
                task: None,
            },
        )
    }

    /// Subscribe to `source` on the current tokio runtime. When no update
    /// arrives within `timeout`, a `TIMEOUT` error is published and the
    /// subscription keeps waiting.
    pub fn spawn<S>(mut source: S, timeout: Duration) -> PositionWatch
    where
        S: Stream<Item = PositionUpdate> + Send + Unpin + 'static,
    {
        let (tx, rx) = watch::channel(None);

        let task = tokio::spawn(async move {
            loop {
                let update = match tokio::time::timeout(timeout, source.next()).await {
                    Ok(Some(update)) => update,
                    Ok(None) => break,
                    Err(_) => Err(PositionError::Timeout),
                };
                if tx.send(Some(update)).is_err() {
                    break;
                }
            }
        });

        PositionWatch {
            rx: Some(rx),
            task: Some(task),
        }
    }

    pub fn latest(&self) -> Option<PositionUpdate> {
        self.rx.as_ref().and_then(|rx| *rx.borrow())
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.is_none()
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.rx = None;
    }
}

impl Drop for PositionWatch {
    fn drop(&mut self) {
        self.cancel();
    }
}
