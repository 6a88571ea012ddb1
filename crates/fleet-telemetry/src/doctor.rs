use anyhow::Result;

pub fn check_location(source: &str, nmea_file: Option<&str>, fixed: Option<(f64, f64)>) -> Result<()> {
    match source {
        "nmea-file" => {
            let path = nmea_file.unwrap_or_default();
            anyhow::ensure!(!path.is_empty(), "location.nmea_file missing");
            anyhow::ensure!(std::path::Path::new(path).exists(), "location.nmea_file not found: {}", path);
        }
        "fixed" => {
            let (lat, lon) = fixed.ok_or_else(|| anyhow::anyhow!("location.lat/location.lon missing"))?;
            anyhow::ensure!(lat.abs() <= 90.0 && lon.abs() <= 180.0, "location coordinates invalid");
        }
        other => anyhow::bail!("unknown location.source: {}", other),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_source_needs_valid_coordinates() {
        assert!(check_location("fixed", None, Some((12.9, 77.6))).is_ok());
        assert!(check_location("fixed", None, Some((91.0, 77.6))).is_err());
        assert!(check_location("fixed", None, None).is_err());
    }

    #[test]
    fn nmea_source_needs_existing_file() {
        assert!(check_location("nmea-file", None, None).is_err());
        assert!(check_location("nmea-file", Some("/definitely/not/here.nmea"), None).is_err());
    }

    #[test]
    fn unknown_source_rejected() {
        let err = check_location("gpsd", None, None).unwrap_err();
        assert!(err.to_string().contains("gpsd"));
    }
}
