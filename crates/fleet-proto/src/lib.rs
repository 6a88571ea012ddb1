//! Plain data exchanged between the fleet crates and the device API.

pub mod command;
pub mod geofence;
pub mod telemetry;
