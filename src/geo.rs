//! Great-circle geometry for travel-time estimation.
//!
//! The planner reads great-circle distance in kilometers directly as a
//! minute estimate (1 km ~ 1 minute of driving). This is a business
//! approximation agreed with dispatch, not a physical model; the road
//! network is never consulted inside the core.

use serde::{Deserialize, Serialize};

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Great-circle distance between two points in kilometers.
pub fn great_circle_km(from: Point, to: Point) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Travel-time estimate in minutes between two points.
pub fn travel_minutes(from: Point, to: Point) -> f64 {
    great_circle_km(from, to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_point_is_zero() {
        let p = Point::new(36.1, -115.1);
        assert!(great_circle_km(p, p) < 0.001, "same point should have ~0 distance");
    }

    #[test]
    fn test_known_distance() {
        // Las Vegas (36.17, -115.14) to Los Angeles (34.05, -118.24)
        // Actual distance ~370 km
        let dist = great_circle_km(Point::new(36.17, -115.14), Point::new(34.05, -118.24));
        assert!(dist > 350.0 && dist < 400.0, "LV to LA should be ~370km, got {}", dist);
    }

    #[test]
    fn test_symmetric() {
        let a = Point::new(36.1, -115.1);
        let b = Point::new(36.2, -115.2);
        let forward = great_circle_km(a, b);
        let backward = great_circle_km(b, a);
        assert!((forward - backward).abs() < 1e-9, "distance should be symmetric");
    }

    #[test]
    fn test_minutes_track_kilometers() {
        let a = Point::new(48.85, 2.35);
        let b = Point::new(48.95, 2.35);
        assert!((travel_minutes(a, b) - great_circle_km(a, b)).abs() < 1e-12);
    }
}
