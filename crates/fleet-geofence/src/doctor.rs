use anyhow::Result;
use fleet_proto::geofence::GeofencePoint;

/// Range checks the builders do not perform themselves.
pub fn check_polygon(points: &[GeofencePoint]) -> Result<()> {
    anyhow::ensure!(!points.is_empty(), "geofence has no coordinates");
    for (i, p) in points.iter().enumerate() {
        anyhow::ensure!(
            p.latitude.is_finite() && p.latitude.abs() <= 90.0,
            "coordinate {} latitude out of range: {}",
            i,
            p.latitude
        );
        anyhow::ensure!(
            p.longitude.is_finite() && p.longitude.abs() <= 180.0,
            "coordinate {} longitude out of range: {}",
            i,
            p.longitude
        );
    }
    Ok(())
}

pub fn check_circle_points(point_count: usize) -> Result<()> {
    anyhow::ensure!((3..=360).contains(&point_count), "geofence.circle_points should be 3..360");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polygon_ranges() {
        assert!(check_polygon(&[GeofencePoint::new(12.9, 77.6)]).is_ok());
        assert!(check_polygon(&[]).is_err());
        assert!(check_polygon(&[GeofencePoint::new(95.0, 77.6)]).is_err());
        assert!(check_polygon(&[GeofencePoint::new(12.9, -181.0)]).is_err());
        assert!(check_polygon(&[GeofencePoint::new(f64::NAN, 0.0)]).is_err());
    }

    #[test]
    fn circle_point_bounds() {
        assert!(check_circle_points(16).is_ok());
        assert!(check_circle_points(2).is_err());
        assert!(check_circle_points(1000).is_err());
    }
}
