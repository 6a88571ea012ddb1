use serde::{Deserialize, Serialize};
use std::fmt;

/// Packet type tag. Routine status updates arrive as `"N"` or `"Normal"`;
/// alerts and events keep their raw tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PacketType {
    Normal,
    Other(String),
}

impl From<String> for PacketType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "N" | "Normal" => PacketType::Normal,
            _ => PacketType::Other(s),
        }
    }
}

impl From<&str> for PacketType {
    fn from(s: &str) -> Self {
        PacketType::from(s.to_string())
    }
}

impl From<PacketType> for String {
    fn from(t: PacketType) -> Self {
        match t {
            PacketType::Normal => "N".to_string(),
            PacketType::Other(s) => s,
        }
    }
}

/// Battery charge as reported by the device: either a bare number or
/// free text such as `"85%"`. Any other JSON shape is kept as-is so one odd
/// packet does not reject the whole batch; it carries no charge level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatteryReading {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl fmt::Display for BatteryReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatteryReading::Number(n) => write!(f, "{}", n),
            BatteryReading::Text(s) => f.write_str(s),
            BatteryReading::Other(v) => write!(f, "{}", v),
        }
    }
}

impl From<f64> for BatteryReading {
    fn from(n: f64) -> Self {
        BatteryReading::Number(n)
    }
}

impl From<&str> for BatteryReading {
    fn from(s: &str) -> Self {
        BatteryReading::Text(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryPacket {
    #[serde(default)]
    pub packet_type: Option<PacketType>,
    #[serde(default)]
    pub battery: Option<BatteryReading>,
    // Device clock, authoritative
    #[serde(default)]
    pub device_raw_timestamp: Option<String>,
    #[serde(default)]
    pub device_timestamp: Option<String>,
}

impl TelemetryPacket {
    pub fn is_normal(&self) -> bool {
        matches!(self.packet_type, Some(PacketType::Normal))
    }
}
