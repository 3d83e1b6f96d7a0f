use chrono::Duration as ChronoDuration;
use rcheckin::core::checkin::{CheckInSession, CheckInState, token_from_deep_link};
use rcheckin::core::guard::AttendanceStore;
use rcheckin::core::position::{PositionError, PositionReading, PositionWatch};
use rcheckin::core::token::TokenIssuer;
use rcheckin::core::validator::{EventLookup, TokenPolicy};
use rcheckin::errors::{AppError, AppResult, CheckInFailure, RegistrationError};
use rcheckin::models::attendance::{AttendanceRecord, NewAttendance, ParticipantIdentity};
use rcheckin::models::event::{Event, TrackingMode};
use chrono::NaiveDate;

mod common;
use common::{at, coords, insert_sample_event, open_test_pool};

fn reading(lat: f64, lng: f64, observed_at_ms: i64) -> PositionReading {
    PositionReading {
        coords: coords(lat, lng),
        accuracy_m: Some(5.0),
        observed_at_ms,
    }
}

fn session() -> CheckInSession {
    CheckInSession::new("phone-1", None, TokenPolicy::default())
}

struct FailingStore;

impl EventLookup for FailingStore {
    fn find_event(&self, _id: i64) -> AppResult<Option<Event>> {
        Err(AppError::Other("storage offline".into()))
    }
}

impl AttendanceStore for FailingStore {
    fn insert_if_absent(&self, _new: &NewAttendance) -> AppResult<Option<AttendanceRecord>> {
        Err(AppError::Other("storage offline".into()))
    }

    fn count_for(&self, _event_id: i64, _day: NaiveDate) -> AppResult<u64> {
        Err(AppError::Other("storage offline".into()))
    }
}

#[test]
fn test_count_only_event_skips_registration() {
    let (_path, pool) = open_test_pool("state_count_only");
    let ev = insert_sample_event(&pool, TrackingMode::CountOnly);
    let now = at(9, 30, 0);
    let token = TokenIssuer::issue(&ev, &now).token;

    let mut s = session();
    assert_eq!(s.state(), &CheckInState::Scanning);
    assert_eq!(s.receive_token(&token, &now, &pool).expect("token"), &CheckInState::Ready);

    // nothing usable yet
    assert!(!s.can_commit());
    let err = s.commit(&pool).expect_err("no reading");
    assert_eq!(err.failure(), Some(CheckInFailure::LocationUnavailable));
    assert_eq!(s.state(), &CheckInState::Ready);

    s.apply_position(Ok(reading(13.7563, 100.5019, now.timestamp_millis() + 500)));
    assert!(s.can_commit());
    let proximity = s.proximity().expect("proximity");
    assert!(proximity.within);

    match s.commit(&pool).expect("commit") {
        CheckInState::Success(record) => {
            assert_eq!(record.event_id, ev.id);
            assert_eq!(
                record.identity,
                ParticipantIdentity::Device {
                    device_id: "phone-1".into()
                }
            );
            assert_eq!(record.session_date, now.date_naive());
        }
        other => panic!("unexpected state {:?}", other),
    }
    assert!(s.state().is_terminal());
}

#[test]
fn test_full_tracking_event_goes_through_registration() {
    let (_path, pool) = open_test_pool("state_full_tracking");
    let ev = insert_sample_event(&pool, TrackingMode::FullTracking);
    let now = at(9, 30, 0);
    let token = TokenIssuer::issue(&ev, &now).token;

    let mut s = session();
    assert_eq!(
        s.receive_token(&token, &now, &pool).expect("token"),
        &CheckInState::Registering
    );

    // commit is not available before registration
    assert!(matches!(s.commit(&pool), Err(AppError::InvalidState(_))));

    let err = s
        .submit_registration("Ana", "not-an-email", &now)
        .expect_err("invalid email");
    assert!(matches!(
        err,
        AppError::Registration(RegistrationError::InvalidEmail(_))
    ));
    assert_eq!(s.state(), &CheckInState::Registering);

    let err = s.submit_registration("   ", "ana@example.com", &now).expect_err("empty name");
    assert!(matches!(err, AppError::Registration(RegistrationError::EmptyName)));
    assert_eq!(s.state(), &CheckInState::Registering);

    let later = now + ChronoDuration::seconds(40);
    assert_eq!(
        s.submit_registration(" Ana ", "ana@example.com", &later).expect("register"),
        &CheckInState::Ready
    );
    assert_eq!(
        s.identity(),
        ParticipantIdentity::Guest {
            name: "Ana".into(),
            email: Some("ana@example.com".into())
        }
    );

    // registration outlived the token; commit still works from the validated context
    s.apply_position(Ok(reading(13.7563, 100.5018, later.timestamp_millis())));
    assert!(matches!(s.commit(&pool).expect("commit"), CheckInState::Success(_)));
}

#[test]
fn test_known_user_skips_registration_on_full_tracking() {
    let (_path, pool) = open_test_pool("state_known_user");
    let ev = insert_sample_event(&pool, TrackingMode::FullTracking);
    let now = at(9, 30, 0);
    let token = TokenIssuer::issue(&ev, &now).token;

    let mut s = CheckInSession::new(
        "phone-1",
        Some(ParticipantIdentity::User { user_id: 17 }),
        TokenPolicy::default(),
    );
    assert_eq!(s.receive_token(&token, &now, &pool).expect("token"), &CheckInState::Ready);
    assert_eq!(s.identity(), ParticipantIdentity::User { user_id: 17 });
}

#[test]
fn test_validator_rejection_fails_the_session() {
    let (_path, pool) = open_test_pool("state_rejection");
    let ev = insert_sample_event(&pool, TrackingMode::CountOnly);
    let issued = at(9, 30, 0);
    let token = TokenIssuer::issue(&ev, &issued).token;

    let mut s = session();
    let (feeder, watch) = PositionWatch::channel();
    s.attach_position(watch);
    assert!(s.has_position_subscription());

    let late = issued + ChronoDuration::seconds(11);
    assert_eq!(
        s.receive_token(&token, &late, &pool).expect("token"),
        &CheckInState::Failed(CheckInFailure::TokenExpired)
    );
    assert!(!s.has_position_subscription());
    assert!(!feeder.push(Ok(reading(13.7563, 100.5018, late.timestamp_millis()))));

    // terminal states ignore further input until reset
    assert!(matches!(
        s.receive_token(&token, &issued, &pool),
        Err(AppError::InvalidState(_))
    ));
    s.reset();
    assert_eq!(s.state(), &CheckInState::Scanning);
    assert!(s.context().is_none());
}

#[test]
fn test_outside_radius_keeps_session_ready() {
    let (_path, pool) = open_test_pool("state_outside_radius");
    let ev = insert_sample_event(&pool, TrackingMode::CountOnly);
    let now = at(9, 30, 0);
    let token = TokenIssuer::issue(&ev, &now).token;

    let mut s = session();
    s.receive_token(&token, &now, &pool).expect("token");
    s.apply_position(Ok(reading(13.7600, 100.5018, now.timestamp_millis() + 1)));

    assert!(!s.can_commit());
    let err = s.commit(&pool).expect_err("too far");
    assert_eq!(err.failure(), Some(CheckInFailure::OutsideRadius));
    assert_eq!(s.state(), &CheckInState::Ready);

    // walking closer makes the commit possible
    s.apply_position(Ok(reading(13.7563, 100.5019, now.timestamp_millis() + 2_000)));
    assert!(s.can_commit());
    assert!(matches!(s.commit(&pool).expect("commit"), CheckInState::Success(_)));
}

#[test]
fn test_readings_from_before_ready_are_ignored() {
    let (_path, pool) = open_test_pool("state_stale_reading");
    let ev = insert_sample_event(&pool, TrackingMode::CountOnly);
    let now = at(9, 30, 0);
    let token = TokenIssuer::issue(&ev, &now).token;

    let mut s = session();
    s.apply_position(Ok(reading(13.7563, 100.5018, now.timestamp_millis() - 60_000)));
    s.receive_token(&token, &now, &pool).expect("token");

    assert!(s.proximity().is_none());
    let err = s.commit(&pool).expect_err("stale reading");
    assert_eq!(err.failure(), Some(CheckInFailure::LocationUnavailable));
}

#[test]
fn test_position_errors_are_advisories() {
    let (_path, pool) = open_test_pool("state_advisory");
    let ev = insert_sample_event(&pool, TrackingMode::CountOnly);
    let now = at(9, 30, 0);
    let token = TokenIssuer::issue(&ev, &now).token;

    let mut s = session();
    let (feeder, watch) = PositionWatch::channel();
    s.attach_position(watch);
    s.receive_token(&token, &now, &pool).expect("token");

    assert!(feeder.push(Err(PositionError::PermissionDenied)));
    s.sync_position();
    let advisory = s.advisory().expect("advisory");
    assert_eq!(advisory.code(), "PERMISSION_DENIED");
    assert_eq!(s.state(), &CheckInState::Ready);

    let err = s.commit(&pool).expect_err("no permission");
    assert_eq!(err.failure(), Some(CheckInFailure::LocationPermissionDenied));
    assert_eq!(s.state(), &CheckInState::Ready);

    assert!(feeder.push(Ok(reading(13.7563, 100.5018, now.timestamp_millis() + 10))));
    // commit pulls the latest update itself
    assert!(matches!(s.commit(&pool).expect("commit"), CheckInState::Success(_)));
    assert!(s.advisory().is_none());
    assert!(!s.has_position_subscription());
}

#[test]
fn test_second_session_for_same_device_fails_already_checked_in() {
    let (_path, pool) = open_test_pool("state_duplicate");
    let ev = insert_sample_event(&pool, TrackingMode::CountOnly);
    let now = at(9, 30, 0);

    for expected_success in [true, false] {
        let token = TokenIssuer::issue(&ev, &now).token;
        let mut s = session();
        s.receive_token(&token, &now, &pool).expect("token");
        s.apply_position(Ok(reading(13.7563, 100.5018, now.timestamp_millis())));
        let state = s.commit(&pool).expect("commit").clone();
        if expected_success {
            assert!(matches!(state, CheckInState::Success(_)));
        } else {
            assert_eq!(state, CheckInState::Failed(CheckInFailure::AlreadyCheckedIn));
        }
    }
}

#[test]
fn test_storage_errors_do_not_fail_the_session() {
    let (_path, pool) = open_test_pool("state_storage_error");
    let ev = insert_sample_event(&pool, TrackingMode::CountOnly);
    let now = at(9, 30, 0);
    let token = TokenIssuer::issue(&ev, &now).token;

    // lookup failure: back to scanning
    let mut s = session();
    assert!(s.receive_token(&token, &now, &FailingStore).is_err());
    assert_eq!(s.state(), &CheckInState::Scanning);

    // commit failure: stays ready, retry succeeds
    s.receive_token(&token, &now, &pool).expect("token");
    s.apply_position(Ok(reading(13.7563, 100.5018, now.timestamp_millis())));
    assert!(matches!(s.commit(&FailingStore), Err(AppError::Other(_))));
    assert_eq!(s.state(), &CheckInState::Ready);
    assert!(matches!(s.commit(&pool).expect("retry"), CheckInState::Success(_)));
}

#[test]
fn test_deep_link_carries_the_token() {
    let (_path, pool) = open_test_pool("state_deep_link");
    let ev = insert_sample_event(&pool, TrackingMode::CountOnly);
    let now = at(9, 30, 0);
    let token = TokenIssuer::issue(&ev, &now).token;
    let link = format!("https://attend.example.com/checkin?token={}", token);

    assert_eq!(token_from_deep_link(&link).expect("token"), token);

    let mut s = session();
    assert_eq!(
        s.receive_deep_link(&link, &now, &pool).expect("deep link"),
        &CheckInState::Ready
    );

    let mut s = session();
    assert!(matches!(
        s.receive_deep_link("https://attend.example.com/checkin", &now, &pool),
        Err(AppError::InvalidDeepLink(_))
    ));
    assert_eq!(s.state(), &CheckInState::Scanning);
}

#[test]
fn test_pending_watch_reading_counts_before_sync() {
    let (_path, pool) = open_test_pool("state_pending_reading");
    let ev = insert_sample_event(&pool, TrackingMode::CountOnly);
    let now = at(9, 30, 0);
    let token = TokenIssuer::issue(&ev, &now).token;

    let mut s = session();
    let (feeder, watch) = PositionWatch::channel();
    s.attach_position(watch);
    s.receive_token(&token, &now, &pool).expect("token");
    assert!(!s.can_commit());

    // the reading sits in the subscription; nothing pulled it yet
    assert!(feeder.push(Ok(reading(13.7563, 100.5018, now.timestamp_millis() + 200))));
    assert!(s.can_commit());
    assert!(s.proximity().expect("proximity").within);

    // an older stored reading does not shadow the pending one
    s.apply_position(Ok(reading(13.7600, 100.5018, now.timestamp_millis() + 100)));
    assert!(s.can_commit());

    // a newer stored reading wins over an older pending one
    s.apply_position(Ok(reading(13.7600, 100.5018, now.timestamp_millis() + 300)));
    assert!(!s.can_commit());
}

#[test]
fn test_reset_discards_registration() {
    let (_path, pool) = open_test_pool("state_reset_registration");
    let ev = insert_sample_event(&pool, TrackingMode::FullTracking);
    let now = at(9, 30, 0);
    let token = TokenIssuer::issue(&ev, &now).token;

    let mut s = session();
    assert_eq!(
        s.receive_token(&token, &now, &pool).expect("token"),
        &CheckInState::Registering
    );
    s.submit_registration("Ana", "ana@example.com", &now).expect("register");
    s.apply_position(Ok(reading(13.7563, 100.5018, now.timestamp_millis())));
    assert!(matches!(s.commit(&pool).expect("commit"), CheckInState::Success(_)));

    s.reset();
    assert_eq!(
        s.identity(),
        ParticipantIdentity::Device {
            device_id: "phone-1".into()
        }
    );
    assert!(s.proximity().is_none());

    // the next scan asks for registration again
    let next = at(9, 45, 0);
    let fresh = TokenIssuer::issue(&ev, &next).token;
    assert_eq!(
        s.receive_token(&fresh, &next, &pool).expect("fresh token"),
        &CheckInState::Registering
    );
    assert_eq!(
        s.identity(),
        ParticipantIdentity::Device {
            device_id: "phone-1".into()
        }
    );
    assert!(matches!(s.commit(&pool), Err(AppError::InvalidState(_))));
}
