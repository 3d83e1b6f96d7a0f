//! Server-side "verify and commit".
//!
//! Clients hand over the raw token, who they are and where they are; this is
//! the only path that writes attendance on their behalf.

use crate::core::feed::{AttendanceCommitted, AttendanceFeed};
use crate::core::geofence::{self, Proximity};
use crate::core::guard::{AttendanceStore, DuplicateGuard};
use crate::core::position::PositionReading;
use crate::core::registration::register_guest;
use crate::core::validator::{EventLookup, TokenPolicy, TokenValidator};
use crate::errors::{AppResult, CheckInFailure, RegistrationError};
use crate::models::attendance::{AttendanceRecord, NewAttendance, ParticipantIdentity};
use crate::ui::messages::warning;
use chrono::{DateTime, TimeZone};

#[derive(Debug, Clone)]
pub struct CheckInRequest {
    pub token: String,
    pub identity: ParticipantIdentity,
    pub position: PositionReading,
}

#[derive(Debug, Clone)]
pub struct CheckInReceipt {
    pub record: AttendanceRecord,
    pub proximity: Proximity,
    pub event_name: String,
}

pub struct VerificationService<'a, S>
where
    S: EventLookup + AttendanceStore,
{
    store: &'a S,
    validator: TokenValidator,
    feed: Option<&'a AttendanceFeed>,
}

impl<'a, S> VerificationService<'a, S>
where
    S: EventLookup + AttendanceStore,
{
    pub fn new(store: &'a S, policy: TokenPolicy) -> Self {
        Self {
            store,
            validator: TokenValidator::new(policy),
            feed: None,
        }
    }

    pub fn with_feed(mut self, feed: &'a AttendanceFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn verify_and_commit<Tz: TimeZone>(
        &self,
        request: CheckInRequest,
        now: &DateTime<Tz>,
    ) -> AppResult<CheckInReceipt> {
        let ctx = self.validator.validate(&request.token, now, self.store)?;

        let identity = match request.identity {
            ParticipantIdentity::Guest { name, email } if ctx.event.requires_registration() => {
                register_guest(&name, email.as_deref().unwrap_or_default())?
            }
            ParticipantIdentity::Device { .. } if ctx.event.requires_registration() => {
                return Err(RegistrationError::IdentityRequired.into());
            }
            other => other,
        };

        // a fix older than the token cannot prove presence for it
        if request.position.observed_at_ms < ctx.token.issued_at_ms {
            return Err(CheckInFailure::LocationUnavailable.into());
        }

        let proximity = geofence::evaluate(&ctx.event, request.position.coords);
        if !proximity.within {
            return Err(CheckInFailure::OutsideRadius.into());
        }

        let record = DuplicateGuard::new(self.store).check_and_reserve(NewAttendance {
            event_id: ctx.event.id,
            identity,
            position: request.position.coords,
            distance_m: proximity.distance_m,
            token_issued_at_ms: ctx.token.issued_at_ms,
            session_date: ctx.session_date,
        })?;

        if let Some(feed) = self.feed {
            match self.store.count_for(record.event_id, record.session_date) {
                Ok(count) => {
                    feed.publish(AttendanceCommitted {
                        event_id: record.event_id,
                        record_id: record.id,
                        session_date: record.session_date,
                        count,
                    });
                }
                // the record is committed, hosts will catch up on the next note
                Err(e) => warning(format!("Failed to publish attendance update: {}", e)),
            }
        }

        Ok(CheckInReceipt {
            record,
            proximity,
            event_name: ctx.event.name,
        })
    }
}
