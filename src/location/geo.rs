pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// `40.712800°N, 74.006000°W`
pub fn format_gps_coordinates(latitude: f64, longitude: f64) -> String {
    let lat_dir = if latitude >= 0.0 { 'N' } else { 'S' };
    let lng_dir = if longitude >= 0.0 { 'E' } else { 'W' };
    format!(
        "{:.6}°{lat_dir}, {:.6}°{lng_dir}",
        latitude.abs(),
        longitude.abs()
    )
}

/// Great-circle distance in kilometres (haversine).
pub fn calculate_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_hemispheres() {
        assert_eq!(
            format_gps_coordinates(40.7128, -74.006),
            "40.712800°N, 74.006000°W"
        );
        assert_eq!(
            format_gps_coordinates(-33.8688, 151.2093),
            "33.868800°S, 151.209300°E"
        );
        assert_eq!(format_gps_coordinates(0.0, 0.0), "0.000000°N, 0.000000°E");
    }

    #[test]
    fn haversine_distances() {
        assert_eq!(calculate_distance(51.5, -0.12, 51.5, -0.12), 0.0);

        // New York to London is roughly 5570 km
        let d = calculate_distance(40.7128, -74.006, 51.5074, -0.1278);
        assert!((d - 5570.0).abs() < 10.0, "got {d}");

        // one degree of latitude is ~111.19 km
        let d = calculate_distance(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111.19).abs() < 0.01, "got {d}");
    }
}
