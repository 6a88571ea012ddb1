//! Battery drain estimation from device telemetry.
//!
//! Packets arrive most-recent-first. The estimator looks for the latest
//! full-charge (100%) normal packet and reports the time elapsed between it
//! and the current reading. Every failure degrades to a display sentinel,
//! never an error: the result feeds a UI label.

use std::fmt;

use fleet_proto::telemetry::{BatteryReading, TelemetryPacket};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime};
use tracing::debug;

pub const NO_VALUE: &str = "-";
pub const NO_FULL_CHARGE: &str = "No 100% record";

const FULL_CHARGE: f64 = 100.0;
const MS_PER_MINUTE: i128 = 60_000;
const MS_PER_HOUR: i128 = 3_600_000;

/// Outcome of a drain estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainTime {
    /// Nothing sensible to show: no normal packets, unreadable current level,
    /// still at full charge, bad timestamps or out-of-order packets.
    Unknown,
    /// Normal packets exist but none reports 100%.
    NoFullCharge,
    /// Time since the last full charge.
    Elapsed(Duration),
}

impl fmt::Display for DrainTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrainTime::Unknown => f.write_str(NO_VALUE),
            DrainTime::NoFullCharge => f.write_str(NO_FULL_CHARGE),
            DrainTime::Elapsed(d) => {
                let ms = d.whole_milliseconds();
                if ms >= MS_PER_HOUR {
                    let tenths = nearest_tenths(ms as f64 / MS_PER_HOUR as f64);
                    write!(f, "{}.{}h", tenths / 10, tenths % 10)
                } else {
                    let minutes = (ms + MS_PER_MINUTE / 2) / MS_PER_MINUTE;
                    write!(f, "{}m", minutes)
                }
            }
        }
    }
}

/// `x` to the nearest tenth, counted in tenths. The comparison is made on the
/// exact binary value of `x`, and only a true tie rounds up: the hour
/// for 1h09m is stored just below 1.15 and gives 11, while 3.25 gives 33.
/// `x` must be finite and non-negative.
fn nearest_tenths(x: f64) -> u64 {
    let bits = x.to_bits();
    let biased_exp = ((bits >> 52) & 0x7ff) as i32;
    let fraction = (bits & ((1u64 << 52) - 1)) as u128;
    if biased_exp == 0 {
        // zero or subnormal, far below a twentieth
        return 0;
    }
    let mantissa = fraction | (1u128 << 52);
    let exp = biased_exp - 1075;
    if exp >= 0 {
        return (mantissa << exp.min(70)).saturating_mul(10).min(u64::MAX as u128) as u64;
    }

    // x = mantissa / 2^shift
    let shift = (-exp) as u32;
    if shift >= 64 {
        return 0;
    }
    let scaled = mantissa * 10;
    let below = scaled >> shift;
    let rest = scaled - (below << shift);
    let up = (rest << 1) >= (1u128 << shift);
    (below + up as u128) as u64
}

/// Estimate time since the most recent full charge.
pub fn estimate_drain(packets: &[TelemetryPacket]) -> DrainTime {
    let normal: Vec<&TelemetryPacket> = packets.iter().filter(|p| p.is_normal()).collect();
    let Some(current) = normal.first() else {
        return DrainTime::Unknown;
    };

    let Some(full) = normal
        .iter()
        .find(|p| extract_battery_value(p.battery.as_ref()) == FULL_CHARGE)
    else {
        return DrainTime::NoFullCharge;
    };

    let level = extract_battery_value(current.battery.as_ref());
    if level.is_nan() || level == FULL_CHARGE {
        return DrainTime::Unknown;
    }

    let (Some(full_at), Some(now_at)) = (parse_timestamp_with_fallback(full), parse_timestamp_with_fallback(current))
    else {
        return DrainTime::Unknown;
    };

    let elapsed = now_at - full_at;
    if elapsed.is_negative() {
        debug!(full_at = %full_at, now_at = %now_at, "battery: current packet older than full-charge packet");
        return DrainTime::Unknown;
    }
    DrainTime::Elapsed(elapsed)
}

/// Display form of [`estimate_drain`]: `"-"`, `"No 100% record"`, `"<h>.<d>h"` or `"<m>m"`.
pub fn compute_battery_drain_time(packets: &[TelemetryPacket]) -> String {
    estimate_drain(packets).to_string()
}

/// Charge percentage from a tolerant reading. Every non-digit is dropped
/// before parsing, so `"85%"`, `"85"` and `85` all give 85. Missing,
/// digit-free or non-scalar input gives NaN.
pub fn extract_battery_value(value: Option<&BatteryReading>) -> f64 {
    let Some(value @ (BatteryReading::Number(_) | BatteryReading::Text(_))) = value else {
        return f64::NAN;
    };
    let digits: String = value.to_string().chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    digits.parse().unwrap_or(f64::NAN)
}

/// Device timestamp of a packet: `deviceRawTimestamp` when present,
/// otherwise `deviceTimestamp`. An unparseable value yields `None`.
pub fn parse_timestamp_with_fallback(packet: &TelemetryPacket) -> Option<OffsetDateTime> {
    let raw = non_empty(packet.device_raw_timestamp.as_deref())
        .or_else(|| non_empty(packet.device_timestamp.as_deref()))?;
    parse_timestamp(raw)
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

/// RFC 3339 first; offset-less date-times and bare dates are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts);
    }

    let naive = PrimitiveDateTime::parse(
        raw,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"),
    )
    .or_else(|_| {
        PrimitiveDateTime::parse(
            raw,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]"),
        )
    });
    if let Ok(ts) = naive {
        return Some(ts.assume_utc());
    }

    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|d| d.midnight().assume_utc())
}
