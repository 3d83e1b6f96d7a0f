use rcheckin::core::geofence::{distance_meters, evaluate, is_within_radius};
use rcheckin::models::event::TrackingMode;

mod common;
use common::{anchor, coords, sample_event};

#[test]
fn test_distance_is_zero_for_same_point() {
    assert_eq!(distance_meters(anchor(), anchor()), 0.0);
}

#[test]
fn test_distance_is_symmetric() {
    let a = coords(13.7563, 100.5018);
    let b = coords(48.8566, 2.3522);
    let ab = distance_meters(a, b);
    let ba = distance_meters(b, a);
    assert!((ab - ba).abs() < 1e-6, "{ab} != {ba}");
}

#[test]
fn test_one_degree_of_latitude() {
    let d = distance_meters(coords(0.0, 0.0), coords(1.0, 0.0));
    assert!((d - 111_195.0).abs() < 1.0, "got {d}");
}

#[test]
fn test_antipodal_points_do_not_produce_nan() {
    let d = distance_meters(coords(0.0, 0.0), coords(0.0, 180.0));
    assert!(d.is_finite());
    assert!((d - std::f64::consts::PI * 6_371_000.0).abs() < 1.0);
}

#[test]
fn test_radius_boundary_is_inclusive() {
    assert!(is_within_radius(50.0, 50.0));
    assert!(!is_within_radius(50.000_001, 50.0));
}

#[test]
fn test_participant_eleven_meters_away_is_within() {
    let ev = sample_event(1, TrackingMode::CountOnly);
    let p = evaluate(&ev, coords(13.7563, 100.5019));
    assert!(p.within);
    assert!(p.distance_m > 9.0 && p.distance_m < 13.0, "got {}", p.distance_m);
    assert_eq!(p.radius_m, 50.0);
}

#[test]
fn test_participant_four_hundred_meters_away_is_outside() {
    let ev = sample_event(1, TrackingMode::CountOnly);
    let p = evaluate(&ev, coords(13.7600, 100.5018));
    assert!(!p.within);
    assert!(p.distance_m > 400.0 && p.distance_m < 420.0, "got {}", p.distance_m);
}

#[test]
fn test_coordinates_reject_out_of_range_and_nan() {
    use rcheckin::models::geo::Coordinates;
    assert!(Coordinates::new(91.0, 0.0).is_err());
    assert!(Coordinates::new(0.0, -180.5).is_err());
    assert!(Coordinates::new(f64::NAN, 0.0).is_err());
    assert!(Coordinates::new(-90.0, 180.0).is_ok());
}
