use crate::models::BoundingBox;

/// Earth's radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometres per degree of latitude
const KM_PER_DEGREE: f64 = 111.0;

/// Great-circle distance in kilometres between two `(lat, lon)` points in degrees
#[inline]
pub fn haversine_distance(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = from;
    let (lat2, lon2) = to;
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Rectangle enclosing every point within `radius_km` of `center`.
///
/// Cheap pre-filter for the discover query; the exact cut is done with
/// [`haversine_distance`]. Near the poles the longitude span widens to the
/// whole globe.
pub fn calculate_bounding_box(center: (f64, f64), radius_km: f64) -> BoundingBox {
    let (lat, lon) = center;
    let lat_delta = radius_km / KM_PER_DEGREE;

    let cos_lat = lat.to_radians().cos().abs();
    let lon_delta = if cos_lat < 1e-6 {
        180.0
    } else {
        (radius_km / (KM_PER_DEGREE * cos_lat)).min(180.0)
    };

    BoundingBox {
        min_lat: (lat - lat_delta).max(-90.0),
        max_lat: (lat + lat_delta).min(90.0),
        min_lon: (lon - lon_delta).max(-180.0),
        max_lon: (lon + lon_delta).min(180.0),
    }
}

#[inline]
pub fn is_within_bounding_box(point: (f64, f64), bbox: &BoundingBox) -> bool {
    let (lat, lon) = point;
    lat >= bbox.min_lat && lat <= bbox.max_lat && lon >= bbox.min_lon && lon <= bbox.max_lon
}

#[cfg(test)]
mod tests {
    use super::*;

    const BERLIN: (f64, f64) = (52.5200, 13.4050);
    const HAMBURG: (f64, f64) = (53.5511, 9.9937);

    #[test]
    fn test_berlin_to_hamburg() {
        let distance = haversine_distance(BERLIN, HAMBURG);
        assert!((distance - 255.0).abs() < 10.0, "expected ~255km, got {}", distance);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let there = haversine_distance(BERLIN, HAMBURG);
        let back = haversine_distance(HAMBURG, BERLIN);
        assert!((there - back).abs() < 1e-9);
    }

    #[test]
    fn test_bounding_box_contains_center() {
        let bbox = calculate_bounding_box(BERLIN, 25.0);
        assert!(is_within_bounding_box(BERLIN, &bbox));
        assert!(!is_within_bounding_box(HAMBURG, &bbox));

        let lat_span = bbox.max_lat - bbox.min_lat;
        assert!((lat_span - 0.45).abs() < 0.01);
    }

    #[test]
    fn test_bounding_box_clamps_near_pole() {
        let bbox = calculate_bounding_box((89.99, 0.0), 100.0);
        assert_eq!(bbox.max_lat, 90.0);
        assert_eq!(bbox.min_lon, -180.0);
        assert_eq!(bbox.max_lon, 180.0);
    }
}
