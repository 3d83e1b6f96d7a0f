//! Great-circle distance and radius checks.

use crate::models::event::Event;
use crate::models::geo::Coordinates;

/// Mean Earth radius used by the haversine formula, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two points, in meters.
pub fn distance_meters(a: Coordinates, b: Coordinates) -> f64 {
    let phi1 = a.lat().to_radians();
    let phi2 = b.lat().to_radians();
    let d_phi = (b.lat() - a.lat()).to_radians();
    let d_lambda = (b.lng() - a.lng()).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);

    // rounding can push h a hair above 1 for antipodal points
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

pub fn is_within_radius(distance_m: f64, radius_m: f64) -> bool {
    distance_m <= radius_m
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proximity {
    pub distance_m: f64,
    pub radius_m: f64,
    pub within: bool,
}

/// Distance from the event anchor and the resulting verdict.
pub fn evaluate(event: &Event, position: Coordinates) -> Proximity {
    let distance_m = distance_meters(event.anchor, position);
    Proximity {
        distance_m,
        radius_m: event.radius_m,
        within: is_within_radius(distance_m, event.radius_m),
    }
}
