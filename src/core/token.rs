//! Check-in token codec and issuer.
//!
//! Wire format: `CHECKIN-<eventId>-<secret>-<issuedAtEpochMillis>`.
//! The secret is everything between the second and the last hyphen, so a
//! secret containing `-` still round-trips.

use crate::errors::CheckInFailure;
use crate::models::event::Event;
use chrono::{DateTime, TimeZone};
use std::fmt;
use std::str::FromStr;

pub const TOKEN_PREFIX: &str = "CHECKIN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInToken {
    pub event_id: i64,
    pub secret: String,
    pub issued_at_ms: i64,
}

impl CheckInToken {
    pub fn new(event_id: i64, secret: &str, issued_at_ms: i64) -> Self {
        Self {
            event_id,
            secret: secret.to_string(),
            issued_at_ms,
        }
    }

    /// Parse a scanned token. Any structural problem is `InvalidToken`.
    pub fn parse(raw: &str) -> Result<Self, CheckInFailure> {
        let raw = raw.trim();

        let mut head = raw.splitn(3, '-');
        let (Some(prefix), Some(event_id), Some(rest)) = (head.next(), head.next(), head.next())
        else {
            return Err(CheckInFailure::InvalidToken);
        };

        let Some((secret, issued_at)) = rest.rsplit_once('-') else {
            return Err(CheckInFailure::InvalidToken);
        };

        if prefix != TOKEN_PREFIX || secret.is_empty() {
            return Err(CheckInFailure::InvalidToken);
        }

        let event_id = event_id
            .parse::<i64>()
            .map_err(|_| CheckInFailure::InvalidToken)?;
        let issued_at_ms = issued_at
            .parse::<i64>()
            .map_err(|_| CheckInFailure::InvalidToken)?;

        Ok(Self {
            event_id,
            secret: secret.to_string(),
            issued_at_ms,
        })
    }
}

impl fmt::Display for CheckInToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            TOKEN_PREFIX, self.event_id, self.secret, self.issued_at_ms
        )
    }
}

impl FromStr for CheckInToken {
    type Err = CheckInFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A token as shown on the host display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub issued_at_ms: i64,
}

/// Produces the string a host displays. Issuing never looks at expiry;
/// only the validator enforces it, from the embedded timestamp.
pub struct TokenIssuer;

impl TokenIssuer {
    pub fn issue<Tz: TimeZone>(event: &Event, now: &DateTime<Tz>) -> IssuedToken {
        let issued_at_ms = now.timestamp_millis();
        IssuedToken {
            token: CheckInToken::new(event.id, &event.secret, issued_at_ms).to_string(),
            issued_at_ms,
        }
    }
}
