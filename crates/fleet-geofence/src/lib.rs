//! Geofence payloads for the `SET_GEOFENCE` device command.
//!
//! The builders in [`shapes`] are pure. The `set_*` functions wrap them into a
//! [`GeofencePayload`] and hand it to a [`CommandDispatcher`]; dispatch errors
//! are returned unchanged.

pub mod doctor;
pub mod shapes;

use fleet_command::{CommandDispatcher, CommandError};
use fleet_proto::command::CommandResponse;
use fleet_proto::geofence::{GeofenceForm, GeofencePayload, GeofencePoint, LatLng};
use thiserror::Error;
use tracing::info;

pub use shapes::{circle_points, close_polygon, rectangle_points, GeofenceError, DEFAULT_CIRCLE_POINTS};

pub const SET_GEOFENCE_COMMAND: &str = "SET_GEOFENCE";
/// Devices hold a single fence; every request overwrites this slot.
pub const GEOFENCE_SLOT: u8 = 1;

#[derive(Debug, Error)]
pub enum SetGeofenceError {
    #[error(transparent)]
    Shape(#[from] GeofenceError),
    #[error(transparent)]
    Dispatch(#[from] CommandError),
}

pub fn payload(name: &str, coordinates: Vec<GeofencePoint>) -> GeofencePayload {
    GeofencePayload {
        geofence_number: GEOFENCE_SLOT,
        geofence_id: name.to_string(),
        coordinates,
    }
}

async fn send_geofence(
    dispatcher: &dyn CommandDispatcher,
    imei: &str,
    payload: GeofencePayload,
) -> Result<CommandResponse, SetGeofenceError> {
    info!(
        "geofence: {} -> {} ({} points, slot {})",
        payload.geofence_id,
        imei,
        payload.coordinates.len(),
        payload.geofence_number
    );
    let params = serde_json::to_value(&payload).map_err(|e| CommandError::validation(e.to_string()))?;
    Ok(dispatcher.send_device_command(imei, SET_GEOFENCE_COMMAND, params).await?)
}

pub async fn set_rectangular_geofence(
    dispatcher: &dyn CommandDispatcher,
    imei: &str,
    name: &str,
    top_left: LatLng,
    bottom_right: LatLng,
) -> Result<CommandResponse, SetGeofenceError> {
    send_geofence(dispatcher, imei, payload(name, rectangle_points(top_left, bottom_right))).await
}

pub async fn set_circular_geofence(
    dispatcher: &dyn CommandDispatcher,
    imei: &str,
    name: &str,
    center_lat: f64,
    center_lng: f64,
    radius_m: f64,
    point_count: Option<usize>,
) -> Result<CommandResponse, SetGeofenceError> {
    let points = circle_points(center_lat, center_lng, radius_m, point_count.unwrap_or(DEFAULT_CIRCLE_POINTS))?;
    send_geofence(dispatcher, imei, payload(name, points)).await
}

pub async fn set_geofence_from_form(
    dispatcher: &dyn CommandDispatcher,
    form: GeofenceForm,
) -> Result<CommandResponse, SetGeofenceError> {
    let points = close_polygon(form.coordinates)?;
    send_geofence(dispatcher, &form.imei, payload(&form.geofence_name, points)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_command::{CommandErrorCode, DryRunDispatcher};

    fn sent_payload(d: &DryRunDispatcher) -> GeofencePayload {
        let sent = d.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].command, SET_GEOFENCE_COMMAND);
        serde_json::from_value(sent[0].params.clone()).unwrap()
    }

    #[tokio::test]
    async fn rectangular_payload() {
        let d = DryRunDispatcher::new();
        let tl = LatLng { lat: 13.0, lng: 77.5 };
        let br = LatLng { lat: 12.9, lng: 77.7 };
        set_rectangular_geofence(&d, "356938035643809", "depot", tl, br).await.unwrap();

        let p = sent_payload(&d);
        assert_eq!(p.geofence_number, GEOFENCE_SLOT);
        assert_eq!(p.geofence_id, "depot");
        assert_eq!(p.coordinates.len(), 5);
        assert_eq!(p.coordinates[0], p.coordinates[4]);
    }

    #[tokio::test]
    async fn circular_payload_uses_default_point_count() {
        let d = DryRunDispatcher::new();
        set_circular_geofence(&d, "356938035643809", "yard", 12.97, 77.59, 250.0, None).await.unwrap();
        assert_eq!(sent_payload(&d).coordinates.len(), DEFAULT_CIRCLE_POINTS + 1);
    }

    #[tokio::test]
    async fn form_payload_is_closed_once() {
        let d = DryRunDispatcher::new();
        let form = GeofenceForm {
            imei: "356938035643809".into(),
            geofence_name: "site".into(),
            coordinates: vec![
                GeofencePoint::new(1.0, 1.0),
                GeofencePoint::new(1.0, 2.0),
                GeofencePoint::new(2.0, 2.0),
            ],
        };
        set_geofence_from_form(&d, form).await.unwrap();
        let p = sent_payload(&d);
        assert_eq!(p.coordinates.len(), 4);
        assert_eq!(p.geofence_id, "site");
    }

    #[tokio::test]
    async fn dispatch_errors_propagate() {
        let d = DryRunDispatcher::new();
        let err = set_circular_geofence(&d, "  ", "yard", 0.0, 0.0, 100.0, Some(8)).await.unwrap_err();
        match err {
            SetGeofenceError::Dispatch(e) => assert_eq!(e.code, CommandErrorCode::Validation),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(d.sent().is_empty());
    }

    #[tokio::test]
    async fn shape_errors_stop_before_dispatch() {
        let d = DryRunDispatcher::new();
        let err = set_circular_geofence(&d, "1", "yard", 0.0, 0.0, 100.0, Some(0)).await.unwrap_err();
        assert!(matches!(err, SetGeofenceError::Shape(GeofenceError::NoCirclePoints)));

        let err = set_circular_geofence(&d, "1", "pole", 90.0, 0.0, 100.0, None).await.unwrap_err();
        assert!(matches!(err, SetGeofenceError::Shape(GeofenceError::PolarCenter)));
        assert!(d.sent().is_empty());
    }

    #[test]
    fn payload_wire_shape() {
        let p = payload("depot", vec![GeofencePoint::new(1.5, 2.5)]);
        assert_eq!(
            serde_json::to_value(&p).unwrap(),
            serde_json::json!({
                "geofence_number": 1,
                "geofence_id": "depot",
                "coordinates": [{"latitude": 1.5, "longitude": 2.5}]
            })
        );
    }
}
