//! In-process push notifications for committed attendance.

use chrono::NaiveDate;
use tokio::sync::broadcast;

const FEED_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceCommitted {
    pub event_id: i64,
    pub record_id: i64,
    pub session_date: NaiveDate,
    /// Committed records for (event, session_date) right after this one.
    pub count: u64,
}

#[derive(Debug, Clone)]
pub struct AttendanceFeed {
    tx: broadcast::Sender<AttendanceCommitted>,
}

impl AttendanceFeed {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Returns the number of subscribers reached.
    pub fn publish(&self, note: AttendanceCommitted) -> usize {
        self.tx.send(note).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AttendanceCommitted> {
        self.tx.subscribe()
    }
}

impl Default for AttendanceFeed {
    fn default() -> Self {
        Self::new()
    }
}
