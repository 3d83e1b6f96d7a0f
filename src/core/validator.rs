//! Token validation against authoritative event data.

use crate::config::Config;
use crate::core::token::CheckInToken;
use crate::errors::{AppResult, CheckInFailure};
use crate::models::event::Event;
use chrono::{DateTime, NaiveDate, TimeZone, Timelike};
use std::time::Duration;

/// Read access to events. Lookup errors are returned, never retried.
pub trait EventLookup {
    fn find_event(&self, id: i64) -> AppResult<Option<Event>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPolicy {
    /// Maximum token age.
    pub validity: Duration,
    /// When set, tokens stamped further than this in the future are rejected.
    /// Unset means forward clock skew is tolerated.
    pub max_future_skew: Option<Duration>,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            validity: Duration::from_millis(10_000),
            max_future_skew: None,
        }
    }
}

impl From<&Config> for TokenPolicy {
    fn from(cfg: &Config) -> Self {
        Self {
            validity: cfg.token_validity(),
            max_future_skew: cfg.max_future_skew_ms.map(Duration::from_millis),
        }
    }
}

fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// Snapshot of a successfully validated token.
#[derive(Debug, Clone)]
pub struct EventContext {
    pub event: Event,
    pub token: CheckInToken,
    pub validated_at_ms: i64,
    /// Calendar day of the validation, in the caller's reporting time zone.
    pub session_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenValidator {
    policy: TokenPolicy,
}

impl TokenValidator {
    pub fn new(policy: TokenPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &TokenPolicy {
        &self.policy
    }

    /// Validate `raw` at `now`. Rejections come back as
    /// `AppError::CheckIn(reason)`; lookup failures as their own error.
    ///
    /// Order matters: structure and age are checked before any lookup, so a
    /// malformed or stale token never touches storage.
    pub fn validate<Tz: TimeZone>(
        &self,
        raw: &str,
        now: &DateTime<Tz>,
        lookup: &dyn EventLookup,
    ) -> AppResult<EventContext> {
        let token = CheckInToken::parse(raw)?;

        let now_ms = now.timestamp_millis();
        let age_ms = now_ms.saturating_sub(token.issued_at_ms);

        if age_ms > millis(self.policy.validity) {
            return Err(CheckInFailure::TokenExpired.into());
        }
        if let Some(skew) = self.policy.max_future_skew
            && age_ms < 0
            && age_ms.saturating_neg() > millis(skew)
        {
            return Err(CheckInFailure::InvalidToken.into());
        }

        let event = match lookup.find_event(token.event_id)? {
            Some(ev) if ev.active => ev,
            _ => return Err(CheckInFailure::EventNotFound.into()),
        };

        if token.secret != event.secret {
            return Err(CheckInFailure::InvalidToken.into());
        }

        let today = now.date_naive();
        let time_of_day = now.time().with_nanosecond(0).unwrap_or(now.time());

        if !event.schedule.includes(today) || !event.window.contains(time_of_day) {
            return Err(CheckInFailure::OutsideTimeWindow.into());
        }

        Ok(EventContext {
            event,
            token,
            validated_at_ms: now_ms,
            session_date: today,
        })
    }
}
