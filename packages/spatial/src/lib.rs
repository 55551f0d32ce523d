#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Great-circle distance and proximity filtering.
//!
//! Distances use the haversine formula throughout. At the sub-mile
//! radii the briefs operate on, equirectangular approximations
//! introduce material error, so nothing in this crate flattens the
//! Earth.

use crime_brief_models::{Incident, LatLon};

/// Mean Earth radius in miles (IUGG).
const EARTH_RADIUS_MILES: f64 = 3_958.761;

/// Haversine great-circle distance between two points, in miles.
///
/// Numerically stable for small separations (the `atan2` form avoids
/// the precision loss of `asin` near zero) and correct across the
/// antimeridian and at the poles.
#[must_use]
pub fn haversine_miles(a: LatLon, b: LatLon) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_MILES * c
}

/// Returns the incidents within `radius_miles` of `center`.
///
/// Order of the input is preserved. Inclusion is `<= radius_miles`.
#[must_use]
pub fn filter_within(
    incidents: &[Incident],
    center: LatLon,
    radius_miles: f64,
) -> Vec<Incident> {
    incidents
        .iter()
        .filter(|incident| haversine_miles(incident.location, center) <= radius_miles)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone as _, Utc};
    use crime_brief_models::IncidentCategory;

    use super::*;

    fn incident(id: &str, location: LatLon) -> Incident {
        Incident {
            id: id.to_string(),
            category: IncidentCategory::Theft,
            raw_category: "THEFT".to_string(),
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            location,
            description: String::new(),
        }
    }

    /// One degree of latitude is ~69.1 miles, so `miles / 69.1`
    /// degrees north of a point is that many miles away.
    fn north_of(center: LatLon, miles: f64) -> LatLon {
        LatLon::new(center.latitude + miles / 69.1, center.longitude)
    }

    const LOOP_CHICAGO: LatLon = LatLon::new(41.8827, -87.6278);

    #[test]
    fn zero_distance_for_same_point() {
        assert!(haversine_miles(LOOP_CHICAGO, LOOP_CHICAGO).abs() < 1e-9);
    }

    #[test]
    fn known_distance_chicago_to_milwaukee() {
        // Chicago Loop to downtown Milwaukee: ~83 miles.
        let milwaukee = LatLon::new(43.0389, -87.9065);
        let d = haversine_miles(LOOP_CHICAGO, milwaukee);
        assert!((d - 83.0).abs() < 3.0, "got {d}");
    }

    #[test]
    fn antimeridian_crossing_is_short() {
        let west = LatLon::new(0.0, 179.9);
        let east = LatLon::new(0.0, -179.9);
        let d = haversine_miles(west, east);
        // 0.2 degrees of longitude at the equator: ~13.8 miles, not
        // most of the way around the planet.
        assert!((d - 13.8).abs() < 0.5, "got {d}");
    }

    #[test]
    fn filter_boundary_half_mile() {
        let inside = incident("in", north_of(LOOP_CHICAGO, 0.499));
        let boundary = incident("edge", north_of(LOOP_CHICAGO, 0.5));
        let outside = incident("out", north_of(LOOP_CHICAGO, 0.51));
        let all = vec![inside, boundary, outside];

        let kept = filter_within(&all, LOOP_CHICAGO, 0.5);
        let ids: Vec<&str> = kept.iter().map(|i| i.id.as_str()).collect();
        assert!(ids.contains(&"in"));
        assert!(ids.contains(&"edge"), "exactly 0.5 mi must be included");
        assert!(!ids.contains(&"out"), "0.51 mi must be excluded");
    }

    #[test]
    fn filter_preserves_input_order() {
        let a = incident("a", north_of(LOOP_CHICAGO, 0.1));
        let b = incident("b", north_of(LOOP_CHICAGO, 0.3));
        let c = incident("c", north_of(LOOP_CHICAGO, 0.2));
        let kept = filter_within(&[a, b, c], LOOP_CHICAGO, 0.5);
        let ids: Vec<&str> = kept.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
