/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates in kilometers (Haversine).
///
/// This is the only numerically sensitive routine in the crate; the filter
/// thresholds in [`crate::config::FilterConfig`] assume its output.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin() * (d_lat / 2.0).sin()
        + lat1.to_radians().cos()
            * lat2.to_radians().cos()
            * (d_lon / 2.0).sin()
            * (d_lon / 2.0).sin();

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_identical_points() {
        assert_eq!(haversine_km(45.0, 7.0, 45.0, 7.0), 0.0);
    }

    #[test]
    fn symmetric_in_its_arguments() {
        let ab = haversine_km(40.7128, -74.0060, 51.5074, -0.1278);
        let ba = haversine_km(51.5074, -0.1278, 40.7128, -74.0060);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn one_degree_of_longitude_at_equator() {
        let d = haversine_km(0.0, 0.0, 0.0, 1.0);
        // ~111.2 km per degree of longitude on the equator
        assert!((d - 111.2).abs() / 111.2 < 0.01, "got {d}");
    }

    #[test]
    fn short_hop_is_meters_scale() {
        // Adjacent city-block coordinates resolve to meters, not kilometers
        let d = haversine_km(52.5200, 13.4050, 52.5210, 13.4060);
        assert!(d > 0.05 && d < 0.2, "got {d}");
    }
}
