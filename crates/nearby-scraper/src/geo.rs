//! Zoom-level selection and great-circle distance.

use nearby_core::Coordinates;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Radius thresholds (km) to map zoom, widest first. Lookup walks the table
/// in descending order and returns on the first threshold not exceeding the
/// requested radius.
const ZOOM_LEVELS: [(f64, u8); 6] = [
    (50.0, 8),
    (20.0, 11),
    (10.0, 12),
    (5.0, 13),
    (2.0, 14),
    (1.0, 15),
];

/// Map a requested search radius to a viewport zoom level.
///
/// Radii below every threshold get the tightest zoom (15).
#[must_use]
pub fn radius_to_zoom(radius_km: f64) -> u8 {
    for (threshold, zoom) in ZOOM_LEVELS {
        if radius_km >= threshold {
            return zoom;
        }
    }
    15
}

/// Great-circle distance between two points via the haversine formula,
/// rounded to 2 decimal places.
#[must_use]
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    round2(EARTH_RADIUS_KM * c)
}

pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(lat: f64, lng: f64) -> Coordinates {
        Coordinates::new(lat, lng).expect("in-range test coordinates")
    }

    #[test]
    fn zoom_matches_threshold_table() {
        assert_eq!(radius_to_zoom(50.0), 8);
        assert_eq!(radius_to_zoom(75.0), 8);
        assert_eq!(radius_to_zoom(21.0), 11);
        assert_eq!(radius_to_zoom(20.0), 11);
        assert_eq!(radius_to_zoom(10.0), 12);
        assert_eq!(radius_to_zoom(5.0), 13);
        assert_eq!(radius_to_zoom(2.0), 14);
        assert_eq!(radius_to_zoom(1.0), 15);
    }

    #[test]
    fn zoom_below_all_thresholds_defaults_to_tightest() {
        assert_eq!(radius_to_zoom(0.5), 15);
        assert_eq!(radius_to_zoom(0.0), 15);
    }

    #[test]
    fn distance_is_zero_on_equal_points() {
        let c = coords(25.2048, 55.2708);
        assert!((haversine_km(c, c)).abs() < f64::EPSILON);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = coords(25.2048, 55.2708);
        let b = coords(25.0772, 55.1392);
        assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < f64::EPSILON);
    }

    #[test]
    fn dubai_downtown_to_marina_is_about_19_km() {
        let center = coords(25.2048, 55.2708);
        let marina = coords(25.0772, 55.1392);
        let d = haversine_km(center, marina);
        assert!((d - 19.41).abs() < 0.2, "expected ~19.41 km, got {d}");
    }

    #[test]
    fn result_is_rounded_to_two_decimals() {
        let a = coords(0.0, 0.0);
        let b = coords(0.1, 0.1);
        let d = haversine_km(a, b);
        assert!((d * 100.0 - (d * 100.0).round()).abs() < 1e-9);
    }
}
