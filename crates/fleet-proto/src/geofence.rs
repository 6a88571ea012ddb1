use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeofencePoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeofencePoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Map corner as picked in the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Params of the `SET_GEOFENCE` device command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofencePayload {
    pub geofence_number: u8,
    pub geofence_id: String,
    pub coordinates: Vec<GeofencePoint>,
}

/// Geofence form submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceForm {
    pub imei: String,
    pub geofence_name: String,
    pub coordinates: Vec<GeofencePoint>,
}
