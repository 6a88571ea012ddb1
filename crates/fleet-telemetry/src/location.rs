//! Device position capability.
//!
//! The estimator and geofence code never touch a positioning backend directly;
//! callers hand them a [`LocationProvider`]. The NMEA reader accepts any
//! buffered stream (a log file, or a serial device node that is already
//! configured for the receiver's baud rate).

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FixQuality {
    pub sats: u8,
    pub hdop: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coords {
    pub latitude: f64,
    pub longitude: f64,
    pub quality: Option<FixQuality>,
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
}

#[async_trait]
pub trait LocationProvider: Send {
    async fn current_position(&mut self) -> Result<Coords>;
}

/// Always reports the same coordinate.
#[derive(Debug, Clone)]
pub struct FixedLocation {
    latitude: f64,
    longitude: f64,
}

impl FixedLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_position(&mut self) -> Result<Coords> {
        Ok(Coords {
            latitude: self.latitude,
            longitude: self.longitude,
            quality: None,
            ts: OffsetDateTime::now_utc(),
        })
    }
}

/// Position from an NMEA 0183 sentence stream.
/// - GGA: satellites + hdop, remembered for the next fix
/// - RMC: lat/lon, yields a fix when status is active
pub struct NmeaLocation<R> {
    reader: R,
    last_gga: Option<FixQuality>,
}

impl NmeaLocation<BufReader<File>> {
    pub async fn open(path: &str) -> Result<Self> {
        let f = File::open(path).await.with_context(|| format!("open nmea source {}", path))?;
        Ok(Self::new(BufReader::new(f)))
    }
}

impl<R> NmeaLocation<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self { reader, last_gga: None }
    }

    fn parse_line(&mut self, s: &str) -> Option<Coords> {
        if s.starts_with("$GNGGA") || s.starts_with("$GPGGA") {
            let parts: Vec<&str> = s.split(',').collect();
            if parts.len() > 9 {
                let sats: u8 = parts[7].parse().unwrap_or(0);
                let hdop: f32 = parts[8].parse().unwrap_or(99.9);
                self.last_gga = Some(FixQuality { sats, hdop });
            }
            return None;
        }

        if s.starts_with("$GNRMC") || s.starts_with("$GPRMC") {
            let parts: Vec<&str> = s.split(',').collect();
            if parts.len() <= 6 {
                return None;
            }
            // parts[2]=A|V, parts[3]=lat ddmm.mmmm, parts[4]=N/S, parts[5]=lon dddmm.mmmm, parts[6]=E/W
            if parts[2] != "A" {
                debug!("nmea: void RMC skipped");
                return None;
            }
            let latitude = parse_deg_min(parts[3], parts[4])?;
            let longitude = parse_deg_min(parts[5], parts[6])?;
            return Some(Coords {
                latitude,
                longitude,
                quality: self.last_gga,
                ts: OffsetDateTime::now_utc(),
            });
        }

        None
    }
}

#[async_trait]
impl<R> LocationProvider for NmeaLocation<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn current_position(&mut self) -> Result<Coords> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self.reader.read_line(&mut line).await.context("read nmea line")?;
            anyhow::ensure!(n > 0, "nmea stream ended before an active RMC fix");
            if let Some(fix) = self.parse_line(line.trim()) {
                return Ok(fix);
            }
        }
    }
}

fn parse_deg_min(v: &str, hemi: &str) -> Option<f64> {
    if v.is_empty() {
        return None;
    }
    // lat: ddmm.mmmm, lon: dddmm.mmmm
    let dot = v.find('.')?;
    let deg_len = if dot > 4 { 3 } else { 2 };
    let deg: f64 = v.get(..deg_len)?.parse().ok()?;
    let min: f64 = v.get(deg_len..)?.parse().ok()?;
    let mut out = deg + (min / 60.0);
    if hemi == "S" || hemi == "W" {
        out = -out;
    }
    Some(out)
}
