//! Participant check-in session.
//!
//! ```text
//! Scanning → Checking → (Registering) → Ready → Success | Failed(reason)
//! ```
//!
//! One state machine serves guests and authenticated users alike; whether
//! the `Registering` step runs depends on the event's tracking mode and on
//! whether an identity is already known.

use crate::config::Config;
use crate::core::geofence::{self, Proximity};
use crate::core::guard::{AttendanceStore, DuplicateGuard};
use crate::core::position::{PositionError, PositionReading, PositionUpdate, PositionWatch};
use crate::core::registration::register_guest;
use crate::core::validator::{EventContext, EventLookup, TokenPolicy, TokenValidator};
use crate::errors::{AppError, AppResult, CheckInFailure};
use crate::models::attendance::{AttendanceRecord, NewAttendance, ParticipantIdentity};
use chrono::{DateTime, TimeZone};
use futures::Stream;
use std::time::Duration;
use url::Url;

/// Query parameter carrying the token in deep links.
pub const DEEP_LINK_PARAM: &str = "token";

const DEFAULT_POSITION_TIMEOUT: Duration = Duration::from_millis(15_000);

#[derive(Debug, Clone, PartialEq)]
pub enum CheckInState {
    Scanning,
    Checking,
    Registering,
    Ready,
    Success(AttendanceRecord),
    Failed(CheckInFailure),
}

impl CheckInState {
    pub fn name(&self) -> &'static str {
        match self {
            CheckInState::Scanning => "Scanning",
            CheckInState::Checking => "Checking",
            CheckInState::Registering => "Registering",
            CheckInState::Ready => "Ready",
            CheckInState::Success(_) => "Success",
            CheckInState::Failed(_) => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckInState::Success(_) | CheckInState::Failed(_))
    }
}

/// Location problem shown on top of whatever state is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationAdvisory {
    pub error: PositionError,
}

impl LocationAdvisory {
    pub fn failure(&self) -> CheckInFailure {
        self.error.failure()
    }

    /// Verbatim platform code (`PERMISSION_DENIED`, ...).
    pub fn code(&self) -> &'static str {
        self.error.code()
    }
}

/// Extract the token from a deep link such as
/// `https://host/checkin?token=CHECKIN-...`.
pub fn token_from_deep_link(link: &str) -> AppResult<String> {
    let url = Url::parse(link.trim()).map_err(|e| AppError::InvalidDeepLink(e.to_string()))?;
    url.query_pairs()
        .find(|(k, _)| k == DEEP_LINK_PARAM)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::InvalidDeepLink(format!("missing '{}' parameter", DEEP_LINK_PARAM)))
}

pub struct CheckInSession {
    state: CheckInState,
    validator: TokenValidator,
    position_timeout: Duration,
    device_id: String,
    known_identity: Option<ParticipantIdentity>,
    registered: Option<ParticipantIdentity>,
    context: Option<EventContext>,
    ready_since_ms: Option<i64>,
    latest: Option<PositionReading>,
    advisory: Option<LocationAdvisory>,
    position: Option<PositionWatch>,
}

impl CheckInSession {
    /// `device_id` identifies anonymous participants of count-only events;
    /// `identity` is set for authenticated users.
    pub fn new(device_id: &str, identity: Option<ParticipantIdentity>, policy: TokenPolicy) -> Self {
        Self {
            state: CheckInState::Scanning,
            validator: TokenValidator::new(policy),
            position_timeout: DEFAULT_POSITION_TIMEOUT,
            device_id: device_id.to_string(),
            known_identity: identity,
            registered: None,
            context: None,
            ready_since_ms: None,
            latest: None,
            advisory: None,
            position: None,
        }
    }

    /// Session using the configured token policy and position timeout.
    pub fn from_config(
        device_id: &str,
        identity: Option<ParticipantIdentity>,
        cfg: &Config,
    ) -> Self {
        let mut session = Self::new(device_id, identity, TokenPolicy::from(cfg));
        session.position_timeout = cfg.position_timeout();
        session
    }

    pub fn position_timeout(&self) -> Duration {
        self.position_timeout
    }

    pub fn state(&self) -> &CheckInState {
        &self.state
    }

    pub fn advisory(&self) -> Option<LocationAdvisory> {
        self.advisory
    }

    pub fn context(&self) -> Option<&EventContext> {
        self.context.as_ref()
    }

    pub fn has_position_subscription(&self) -> bool {
        self.position.as_ref().is_some_and(|w| !w.is_cancelled())
    }

    /// Identity the commit will be recorded under.
    pub fn identity(&self) -> ParticipantIdentity {
        self.registered
            .clone()
            .or_else(|| self.known_identity.clone())
            .unwrap_or_else(|| ParticipantIdentity::Device {
                device_id: self.device_id.clone(),
            })
    }

    fn expect_state(&self, expected: &CheckInState) -> AppResult<()> {
        if std::mem::discriminant(&self.state) != std::mem::discriminant(expected) {
            return Err(AppError::InvalidState(self.state.name().to_string()));
        }
        Ok(())
    }

    /// Take over a position subscription. A previous one is cancelled.
    pub fn attach_position(&mut self, watch: PositionWatch) {
        if let Some(mut old) = self.position.replace(watch) {
            old.cancel();
        }
        if self.state.is_terminal() {
            self.release_position();
        }
    }

    /// Subscribe to a platform position stream on the current tokio
    /// runtime. A silent source reports `TIMEOUT` after the session's
    /// position timeout.
    pub fn watch_position<S>(&mut self, source: S)
    where
        S: Stream<Item = PositionUpdate> + Send + Unpin + 'static,
    {
        self.attach_position(PositionWatch::spawn(source, self.position_timeout));
    }

    fn release_position(&mut self) {
        if let Some(mut watch) = self.position.take() {
            watch.cancel();
        }
    }

    /// Feed one position update. Errors become an advisory and never move
    /// the state machine; a good fix clears the advisory.
    pub fn apply_position(&mut self, update: PositionUpdate) {
        if self.state.is_terminal() {
            return;
        }
        match update {
            Ok(reading) => {
                self.advisory = None;
                let newer = self
                    .latest
                    .is_none_or(|prev| reading.observed_at_ms >= prev.observed_at_ms);
                if newer {
                    self.latest = Some(reading);
                }
            }
            Err(error) => self.advisory = Some(LocationAdvisory { error }),
        }
    }

    /// Pull the most recent update from the attached subscription.
    pub fn sync_position(&mut self) {
        if let Some(update) = self.position.as_ref().and_then(|w| w.latest()) {
            self.apply_position(update);
        }
    }

    /// Latest reading taken at or after `Ready` was entered. Readings still
    /// waiting in the attached subscription count too.
    fn fresh_reading(&self) -> Option<PositionReading> {
        let since = self.ready_since_ms?;
        let pending = self
            .position
            .as_ref()
            .and_then(PositionWatch::latest)
            .and_then(Result::ok);
        let newest = match (self.latest, pending) {
            (Some(a), Some(b)) if b.observed_at_ms >= a.observed_at_ms => Some(b),
            (Some(a), _) => Some(a),
            (None, b) => b,
        };
        newest.filter(|r| r.observed_at_ms >= since)
    }

    fn fail(&mut self, reason: CheckInFailure) {
        self.release_position();
        self.state = CheckInState::Failed(reason);
    }

    fn enter_ready(&mut self, now_ms: i64) {
        self.ready_since_ms = Some(now_ms);
        self.state = CheckInState::Ready;
    }

    /// Scanning → Checking → Registering | Ready | Failed.
    ///
    /// Validator rejections end in `Failed(reason)`. A storage error during
    /// the event lookup is returned and the session goes back to `Scanning`.
    pub fn receive_token<Tz: TimeZone>(
        &mut self,
        raw: &str,
        now: &DateTime<Tz>,
        lookup: &dyn EventLookup,
    ) -> AppResult<&CheckInState> {
        self.expect_state(&CheckInState::Scanning)?;
        self.state = CheckInState::Checking;

        match self.validator.validate(raw, now, lookup) {
            Ok(ctx) => {
                let needs_registration =
                    ctx.event.requires_registration() && self.known_identity.is_none();
                self.context = Some(ctx);
                if needs_registration {
                    self.state = CheckInState::Registering;
                } else {
                    self.enter_ready(now.timestamp_millis());
                }
                Ok(&self.state)
            }
            Err(AppError::CheckIn(reason)) => {
                self.fail(reason);
                Ok(&self.state)
            }
            Err(e) => {
                self.state = CheckInState::Scanning;
                Err(e)
            }
        }
    }

    /// Same as [`receive_token`](Self::receive_token), with the token taken
    /// from a deep link. A link without a token leaves the session scanning.
    pub fn receive_deep_link<Tz: TimeZone>(
        &mut self,
        link: &str,
        now: &DateTime<Tz>,
        lookup: &dyn EventLookup,
    ) -> AppResult<&CheckInState> {
        self.expect_state(&CheckInState::Scanning)?;
        let token = token_from_deep_link(link)?;
        self.receive_token(&token, now, lookup)
    }

    /// Registering → Ready. Invalid input keeps the session in
    /// `Registering` and returns the validation message.
    pub fn submit_registration<Tz: TimeZone>(
        &mut self,
        name: &str,
        email: &str,
        now: &DateTime<Tz>,
    ) -> AppResult<&CheckInState> {
        self.expect_state(&CheckInState::Registering)?;
        let identity = register_guest(name, email)?;
        self.registered = Some(identity);
        self.enter_ready(now.timestamp_millis());
        Ok(&self.state)
    }

    /// Geofence verdict for the freshest usable reading.
    pub fn proximity(&self) -> Option<Proximity> {
        if self.state != CheckInState::Ready {
            return None;
        }
        let ctx = self.context.as_ref()?;
        let reading = self.fresh_reading()?;
        Some(geofence::evaluate(&ctx.event, reading.coords))
    }

    pub fn can_commit(&self) -> bool {
        self.proximity().is_some_and(|p| p.within)
    }

    /// Ready → Success | Failed(AlreadyCheckedIn).
    ///
    /// Without a fresh reading or while outside the radius the commit is
    /// refused and the session stays `Ready`. Storage errors also keep it in
    /// `Ready` so only the commit step has to be retried.
    pub fn commit(&mut self, store: &dyn AttendanceStore) -> AppResult<&CheckInState> {
        self.expect_state(&CheckInState::Ready)?;
        self.sync_position();

        let Some(reading) = self.fresh_reading() else {
            let reason = self
                .advisory
                .map(|a| a.failure())
                .unwrap_or(CheckInFailure::LocationUnavailable);
            return Err(reason.into());
        };

        let ctx = self
            .context
            .as_ref()
            .ok_or_else(|| AppError::InvalidState("Ready without event context".into()))?;

        let proximity = geofence::evaluate(&ctx.event, reading.coords);
        if !proximity.within {
            return Err(CheckInFailure::OutsideRadius.into());
        }

        let new = NewAttendance {
            event_id: ctx.event.id,
            identity: self.identity(),
            position: reading.coords,
            distance_m: proximity.distance_m,
            token_issued_at_ms: ctx.token.issued_at_ms,
            session_date: ctx.session_date,
        };

        match DuplicateGuard::new(store).check_and_reserve(new) {
            Ok(record) => {
                self.release_position();
                self.state = CheckInState::Success(record);
                Ok(&self.state)
            }
            Err(AppError::CheckIn(reason)) => {
                self.fail(reason);
                Ok(&self.state)
            }
            Err(e) => Err(e),
        }
    }

    /// Back to `Scanning`, dropping registration data, readings and the
    /// position subscription.
    pub fn reset(&mut self) {
        self.release_position();
        self.state = CheckInState::Scanning;
        self.registered = None;
        self.context = None;
        self.ready_since_ms = None;
        self.latest = None;
        self.advisory = None;
    }
}
