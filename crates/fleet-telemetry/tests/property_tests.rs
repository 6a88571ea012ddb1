//! Property tests for the battery drain estimator.

use fleet_proto::telemetry::{BatteryReading, PacketType, TelemetryPacket};
use fleet_telemetry::battery::{NO_FULL_CHARGE, NO_VALUE};
use fleet_telemetry::{compute_battery_drain_time, extract_battery_value};
use proptest::prelude::*;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const BASE_UNIX: i64 = 1_704_067_200; // 2024-01-01T00:00:00Z

fn rfc3339(unix_ms: i64) -> String {
    let ts = OffsetDateTime::from_unix_timestamp_nanos(unix_ms as i128 * 1_000_000).unwrap();
    ts.format(&Rfc3339).unwrap()
}

fn packet(kind: &str, battery: BatteryReading, unix_ms: i64) -> TelemetryPacket {
    TelemetryPacket {
        packet_type: Some(PacketType::from(kind)),
        battery: Some(battery),
        device_raw_timestamp: Some(rfc3339(unix_ms)),
        device_timestamp: None,
    }
}

fn reading() -> impl Strategy<Value = BatteryReading> {
    prop_oneof![
        (0u8..=100).prop_map(|n| BatteryReading::Number(n as f64)),
        (0u8..=100).prop_map(|n| BatteryReading::Text(format!("{}%", n))),
        (0u8..=100).prop_map(|n| BatteryReading::Text(n.to_string())),
    ]
}

fn non_full_reading() -> impl Strategy<Value = BatteryReading> {
    reading().prop_filter("not a full charge", |r| extract_battery_value(Some(r)) != 100.0)
}

// Multiples of 180 000 ms land on x.x5 h, where the stored hour value
// decides which way the label rounds.
fn elapsed_ms() -> impl Strategy<Value = i64> {
    prop_oneof![
        0i64..(72 * 3_600_000),
        (1i64..=1440).prop_map(|k| k * 180_000),
    ]
}

/// Hours with one decimal, rounded half up on the exact decimal expansion
/// of `hours`. `{:.60}` prints every digit of a double of this size.
fn one_decimal(hours: f64) -> String {
    let exact = format!("{:.60}", hours);
    let (int, frac) = exact.split_once('.').unwrap();
    let mut tenths: u64 = int.parse::<u64>().unwrap() * 10 + frac[..1].parse::<u64>().unwrap();
    if frac.as_bytes()[1] >= b'5' {
        tenths += 1;
    }
    format!("{}.{}", tenths / 10, tenths % 10)
}

#[test]
fn one_decimal_reference_labels() {
    for (minutes, label) in [(63i64, "1.1"), (69, "1.1"), (87, "1.4"), (195, "3.3"), (210, "3.5")] {
        assert_eq!(one_decimal((minutes * 60_000) as f64 / 3.6e6), label, "{} min", minutes);
    }
}

fn event_kind() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("A"), Just("SOS"), Just("IGN"), Just("H")]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_no_normal_packets_is_unknown(
        readings in prop::collection::vec((event_kind(), reading()), 0..12),
    ) {
        let packets: Vec<_> = readings
            .into_iter()
            .enumerate()
            .map(|(i, (k, b))| packet(k, b, (BASE_UNIX - i as i64 * 60) * 1000))
            .collect();
        prop_assert_eq!(compute_battery_drain_time(&packets), NO_VALUE);
    }

    #[test]
    fn prop_current_full_charge_is_unknown(
        older in prop::collection::vec(reading(), 0..8),
    ) {
        let mut packets = vec![packet("N", BatteryReading::Number(100.0), BASE_UNIX * 1000)];
        for (i, b) in older.into_iter().enumerate() {
            packets.push(packet("N", b, (BASE_UNIX - (i as i64 + 1) * 600) * 1000));
        }
        prop_assert_eq!(compute_battery_drain_time(&packets), NO_VALUE);
    }

    #[test]
    fn prop_missing_full_charge_record(
        normal in prop::collection::vec(non_full_reading(), 1..10),
    ) {
        let packets: Vec<_> = normal
            .into_iter()
            .enumerate()
            .map(|(i, b)| packet("N", b, (BASE_UNIX - i as i64 * 60) * 1000))
            .collect();
        prop_assert_eq!(compute_battery_drain_time(&packets), NO_FULL_CHARGE);
    }

    #[test]
    fn prop_elapsed_formatting(
        elapsed_ms in elapsed_ms(),
        level in 0u8..100,
    ) {
        let t1 = BASE_UNIX * 1000;
        let t2 = t1 + elapsed_ms;
        let packets = vec![
            packet("N", BatteryReading::Number(level as f64), t2),
            packet("N", BatteryReading::Text("100%".into()), t1),
        ];
        let out = compute_battery_drain_time(&packets);

        let hours = elapsed_ms as f64 / 3.6e6;
        if hours >= 1.0 {
            prop_assert_eq!(out, format!("{}h", one_decimal(hours)));
        } else {
            let expected = (elapsed_ms as f64 / 60_000.0).round() as i64;
            prop_assert_eq!(out, format!("{}m", expected));
        }
    }
}
