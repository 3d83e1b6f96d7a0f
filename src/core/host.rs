//! Host-side loops: token redisplay and attendance count refresh.
//!
//! The two loops are unrelated. The redisplay cadence only limits how long a
//! photographed code stays on screen; the validator decides expiry on its own.

use crate::core::feed::AttendanceFeed;
use crate::core::guard::AttendanceStore;
use crate::core::tasks::TaskSet;
use crate::core::token::{IssuedToken, TokenIssuer};
use crate::models::event::Event;
use crate::ui::messages::warning;
use chrono::Local;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;

/// Issue a fresh token every `period`.
pub fn spawn_token_display(
    tasks: &mut TaskSet,
    event: Event,
    period: Duration,
) -> watch::Receiver<IssuedToken> {
    let (tx, rx) = watch::channel(TokenIssuer::issue(&event, &Local::now()));

    tasks.spawn_interval(period, move || {
        tx.send(TokenIssuer::issue(&event, &Local::now())).is_ok()
    });

    rx
}

/// Re-read today's committed count every `period`, starting from `initial`.
pub fn spawn_count_polling<S>(
    tasks: &mut TaskSet,
    store: S,
    event_id: i64,
    initial: u64,
    period: Duration,
) -> watch::Receiver<u64>
where
    S: AttendanceStore + Send + 'static,
{
    let (tx, rx) = watch::channel(initial);

    tasks.spawn_interval(period, move || {
        match store.count_for(event_id, Local::now().date_naive()) {
            Ok(n) => {
                tx.send_if_modified(|current| {
                    if *current != n {
                        *current = n;
                        true
                    } else {
                        false
                    }
                });
            }
            Err(e) => warning(format!("Failed to refresh attendance count: {}", e)),
        }
        !tx.is_closed()
    });

    rx
}

/// Follow commit notifications for `event_id` instead of polling.
pub fn spawn_count_push(
    tasks: &mut TaskSet,
    feed: &AttendanceFeed,
    event_id: i64,
    initial: u64,
) -> watch::Receiver<u64> {
    let (tx, rx) = watch::channel(initial);
    let mut sub = feed.subscribe();

    tasks.spawn_cancellable(async move {
        loop {
            match sub.recv().await {
                Ok(note) if note.event_id == event_id => {
                    if tx.send(note.count).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                // every note carries the absolute count, the next one catches up
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });

    rx
}

/// Everything a host screen shows, with the loops feeding it.
pub struct HostDisplay {
    tasks: TaskSet,
    pub token: watch::Receiver<IssuedToken>,
    pub count: watch::Receiver<u64>,
}

impl HostDisplay {
    pub fn with_polling<S>(
        event: Event,
        store: S,
        initial: u64,
        display_refresh: Duration,
        count_refresh: Duration,
    ) -> Self
    where
        S: AttendanceStore + Send + 'static,
    {
        let mut tasks = TaskSet::new();
        let event_id = event.id;
        let token = spawn_token_display(&mut tasks, event, display_refresh);
        let count = spawn_count_polling(&mut tasks, store, event_id, initial, count_refresh);
        Self {
            tasks,
            token,
            count,
        }
    }

    pub fn with_push(
        event: Event,
        feed: &AttendanceFeed,
        initial: u64,
        display_refresh: Duration,
    ) -> Self {
        let mut tasks = TaskSet::new();
        let event_id = event.id;
        let token = spawn_token_display(&mut tasks, event, display_refresh);
        let count = spawn_count_push(&mut tasks, feed, event_id, initial);
        Self {
            tasks,
            token,
            count,
        }
    }

    pub fn running_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn shutdown(&mut self) {
        self.tasks.shutdown();
    }
}
