use fleet_proto::geofence::{GeofencePoint, LatLng};
use std::f64::consts::PI;
use thiserror::Error;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
pub const DEFAULT_CIRCLE_POINTS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeofenceError {
    #[error("circle needs at least one point")]
    NoCirclePoints,
    #[error("geofence has no coordinates")]
    EmptyPolygon,
    #[error("circle centre must lie strictly between the poles")]
    PolarCenter,
    #[error("circle coordinates are not finite")]
    NonFinite,
}

/// Closed rectangle: top-left, top-right, bottom-right, bottom-left, top-left.
pub fn rectangle_points(top_left: LatLng, bottom_right: LatLng) -> Vec<GeofencePoint> {
    let tl = GeofencePoint::new(top_left.lat, top_left.lng);
    let tr = GeofencePoint::new(top_left.lat, bottom_right.lng);
    let br = GeofencePoint::new(bottom_right.lat, bottom_right.lng);
    let bl = GeofencePoint::new(bottom_right.lat, top_left.lng);
    vec![tl, tr, br, bl, tl]
}

/// `point_count` points evenly spaced on a circle plus a closing copy of the
/// first. Offsets use the equirectangular approximation, so longitude spans
/// are widened by `1 / cos(latitude)`; fine for small fences, wrong near the poles.
/// A centre at or beyond ±90° has no usable longitude span and is rejected.
pub fn circle_points(
    center_lat: f64,
    center_lng: f64,
    radius_m: f64,
    point_count: usize,
) -> Result<Vec<GeofencePoint>, GeofenceError> {
    if point_count == 0 {
        return Err(GeofenceError::NoCirclePoints);
    }
    if !(center_lat.is_finite() && center_lng.is_finite() && radius_m.is_finite()) {
        return Err(GeofenceError::NonFinite);
    }
    if center_lat.abs() >= 90.0 {
        return Err(GeofenceError::PolarCenter);
    }

    let lat_span = (radius_m / EARTH_RADIUS_M).to_degrees();
    let lng_span = lat_span / center_lat.to_radians().cos();

    let mut points: Vec<GeofencePoint> = (0..point_count)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / point_count as f64;
            GeofencePoint::new(center_lat + lat_span * angle.sin(), center_lng + lng_span * angle.cos())
        })
        .collect();
    if points.iter().any(|p| !(p.latitude.is_finite() && p.longitude.is_finite())) {
        return Err(GeofenceError::NonFinite);
    }
    points.push(points[0]);
    Ok(points)
}

/// Append a copy of the first point unless the polygon is already closed.
pub fn close_polygon(mut points: Vec<GeofencePoint>) -> Result<Vec<GeofencePoint>, GeofenceError> {
    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        return Err(GeofenceError::EmptyPolygon);
    };
    if first != last {
        points.push(first);
    }
    Ok(points)
}

pub fn haversine_m(a: GeofencePoint, b: GeofencePoint) -> f64 {
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

// Ray casting polygon test
pub fn point_in_polygon(poly: &[GeofencePoint], p: GeofencePoint) -> bool {
    let mut inside = false;
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (poly[i].longitude, poly[i].latitude);
        let (xj, yj) = (poly[j].longitude, poly[j].latitude);
        let intersect = ((yi > p.latitude) != (yj > p.latitude))
            && (p.longitude < (xj - xi) * (p.latitude - yi) / (yj - yi + 1e-12) + xi);
        if intersect {
            inside = !inside;
        }
        j = i;
    }
    inside
}
