pub mod battery;
pub mod doctor;
pub mod location;

pub use battery::{
    compute_battery_drain_time, estimate_drain, extract_battery_value, parse_timestamp_with_fallback, DrainTime,
};
pub use location::{Coords, FixQuality, FixedLocation, LocationProvider, NmeaLocation};
