use crate::models::shipment::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Rough leg length for task metadata. Shipment coordinates are optional;
/// with either end missing there is nothing to measure.
pub fn leg_distance_km(from: Option<GeoPoint>, to: Option<GeoPoint>) -> Option<f64> {
    let (a, b) = (from?, to?);

    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    Some(EARTH_RADIUS_KM * central_angle)
}
