use futures::stream;
use rcheckin::config::Config;
use rcheckin::core::checkin::{CheckInSession, CheckInState};
use rcheckin::core::feed::{AttendanceCommitted, AttendanceFeed};
use rcheckin::core::host::{HostDisplay, spawn_count_polling};
use rcheckin::core::position::{PositionError, PositionReading, PositionWatch};
use rcheckin::core::tasks::TaskSet;
use rcheckin::core::token::{CheckInToken, TokenIssuer};
use rcheckin::errors::CheckInFailure;
use rcheckin::models::event::TrackingMode;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

mod common;
use common::{at, coords, insert_sample_event, open_test_pool, sample_event};

#[tokio::test(start_paused = true)]
async fn test_interval_task_ticks_until_shutdown() {
    let hits = Arc::new(AtomicUsize::new(0));
    let mut tasks = TaskSet::new();

    let h = Arc::clone(&hits);
    tasks.spawn_interval(Duration::from_secs(3), move || {
        h.fetch_add(1, Ordering::SeqCst);
        true
    });
    assert_eq!(tasks.len(), 1);

    // immediate first tick, then 3 s and 6 s
    tokio::time::sleep(Duration::from_millis(7_000)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    tasks.shutdown();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert!(tasks.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_host_display_rotates_tokens() {
    let ev = sample_event(5, TrackingMode::CountOnly);
    let feed = AttendanceFeed::new();
    let mut display = HostDisplay::with_push(ev, &feed, 0, Duration::from_secs(3));
    assert_eq!(display.running_tasks(), 2);

    let first = display.token.borrow_and_update().clone();
    tokio::time::sleep(Duration::from_millis(3_100)).await;
    display.token.changed().await.expect("token refresh");
    let second = display.token.borrow_and_update().clone();

    let a = CheckInToken::parse(&first.token).expect("first");
    let b = CheckInToken::parse(&second.token).expect("second");
    assert_eq!(a.event_id, 5);
    assert_eq!(b.event_id, 5);
    assert!(b.issued_at_ms >= a.issued_at_ms);

    display.shutdown();
    tokio::task::yield_now().await;
    assert_eq!(display.running_tasks(), 0);
}

#[tokio::test]
async fn test_host_count_follows_push_notifications() {
    let ev = sample_event(9, TrackingMode::CountOnly);
    let feed = AttendanceFeed::new();
    let mut display = HostDisplay::with_push(ev, &feed, 4, Duration::from_secs(3));
    assert_eq!(*display.count.borrow(), 4);

    let day = chrono::NaiveDate::from_ymd_opt(2026, 3, 2).expect("date");
    // other events are ignored
    feed.publish(AttendanceCommitted {
        event_id: 1,
        record_id: 100,
        session_date: day,
        count: 42,
    });
    feed.publish(AttendanceCommitted {
        event_id: 9,
        record_id: 101,
        session_date: day,
        count: 5,
    });

    display.count.changed().await.expect("count update");
    assert_eq!(*display.count.borrow_and_update(), 5);
}

#[tokio::test]
async fn test_count_polling_reads_storage() {
    let (_path, pool) = open_test_pool("async_count_polling");
    let ev = insert_sample_event(&pool, TrackingMode::CountOnly);

    let today = chrono::Local::now().date_naive();
    rcheckin::core::guard::DuplicateGuard::new(&pool)
        .check_and_reserve(rcheckin::models::attendance::NewAttendance {
            event_id: ev.id,
            identity: rcheckin::models::attendance::ParticipantIdentity::User { user_id: 1 },
            position: coords(13.7563, 100.5018),
            distance_m: 0.0,
            token_issued_at_ms: 0,
            session_date: today,
        })
        .expect("seed");

    let mut tasks = TaskSet::new();
    let mut count = spawn_count_polling(&mut tasks, pool, ev.id, 0, Duration::from_millis(50));
    count.changed().await.expect("first poll");
    assert_eq!(*count.borrow(), 1);
}

#[tokio::test]
async fn test_polling_display_starts_from_seeded_count() {
    let (_path, pool) = open_test_pool("async_seeded_count");
    let ev = insert_sample_event(&pool, TrackingMode::CountOnly);

    let mut display = HostDisplay::with_polling(
        ev,
        pool,
        3,
        Duration::from_secs(3),
        Duration::from_secs(60),
    );
    // shown before the first poll completes
    assert_eq!(*display.count.borrow(), 3);
    display.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_session_uses_configured_position_timeout() {
    let (path, pool) = open_test_pool("async_session_timeout");
    let ev = insert_sample_event(&pool, TrackingMode::CountOnly);
    let now = at(9, 30, 0);
    let token = TokenIssuer::issue(&ev, &now).token;

    let mut cfg = Config::with_database(path);
    cfg.position_timeout_ms = 2_000;

    let mut s = CheckInSession::from_config("phone-1", None, &cfg);
    assert_eq!(s.position_timeout(), Duration::from_secs(2));
    s.receive_token(&token, &now, &pool).expect("token");
    s.watch_position(stream::pending());
    assert!(s.has_position_subscription());

    tokio::time::sleep(Duration::from_secs(3)).await;
    s.sync_position();
    assert_eq!(s.advisory().expect("advisory").code(), "TIMEOUT");
    assert_eq!(s.state(), &CheckInState::Ready);

    let err = s.commit(&pool).expect_err("no fix");
    assert_eq!(err.failure(), Some(CheckInFailure::LocationUnavailable));
}

#[tokio::test(start_paused = true)]
async fn test_position_watch_reports_timeout() {
    let watch = PositionWatch::spawn(stream::pending(), Duration::from_secs(15));
    assert!(watch.latest().is_none());

    tokio::time::sleep(Duration::from_secs(16)).await;
    assert_eq!(watch.latest(), Some(Err(PositionError::Timeout)));
}

#[tokio::test]
async fn test_position_watch_keeps_latest_reading() {
    let readings = vec![
        Ok(PositionReading {
            coords: coords(13.7563, 100.5018),
            accuracy_m: Some(20.0),
            observed_at_ms: 1,
        }),
        Ok(PositionReading {
            coords: coords(13.7564, 100.5018),
            accuracy_m: Some(8.0),
            observed_at_ms: 2,
        }),
    ];
    let mut watch = PositionWatch::spawn(stream::iter(readings), Duration::from_secs(15));

    let mut last = None;
    for _ in 0..100 {
        last = watch.latest();
        if matches!(last, Some(Ok(r)) if r.observed_at_ms == 2) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(matches!(last, Some(Ok(r)) if r.observed_at_ms == 2));

    watch.cancel();
    assert!(watch.is_cancelled());
    assert!(watch.latest().is_none());
}
