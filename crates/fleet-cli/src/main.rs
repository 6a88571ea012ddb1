use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{info, warn};

use fleet_command::{doctor as command_doctor, CommandDispatcher, CommandErrorCode, DryRunDispatcher, HttpConfig, HttpDispatcher};
use fleet_geofence::{doctor as geofence_doctor, shapes};
use fleet_proto::geofence::{GeofenceForm, GeofencePoint, LatLng};
use fleet_proto::telemetry::TelemetryPacket;
use fleet_telemetry::{doctor as telemetry_doctor, FixedLocation, LocationProvider, NmeaLocation};

#[derive(Debug, Parser)]
#[command(name = "fleet", version, about = "Fleetwatch - device telemetry and geofence tooling")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sanity-check the config file.
    Doctor,
    /// Time since last full charge, from a JSON array of packets (most recent first).
    Battery { file: String },
    Validate {
        #[command(subcommand)]
        what: ValidateCmd,
    },
    /// Send a raw device command.
    Send {
        #[arg(long)]
        imei: String,
        #[arg(long)]
        command: String,
        /// JSON object
        #[arg(long, default_value = "{}")]
        params: String,
        /// Extra attempts after network failures
        #[arg(long, default_value_t = 0)]
        retries: u32,
    },
    Geofence {
        #[command(subcommand)]
        cmd: GeofenceCmd,
    },
    /// Print the current position from the configured location source.
    Locate,
}

#[derive(Debug, Subcommand)]
enum ValidateCmd {
    Imei(ValidateArgs),
    Command(ValidateArgs),
    Params(ValidateArgs),
}

#[derive(Debug, clap::Args)]
struct ValidateArgs {
    value: String,
    /// Treat the value as a JSON literal instead of a plain string.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum GeofenceCmd {
    Rect {
        #[arg(long)]
        imei: String,
        #[arg(long)]
        name: String,
        /// "lat,lng"
        #[arg(long, value_parser = parse_lat_lng)]
        top_left: LatLng,
        /// "lat,lng"
        #[arg(long, value_parser = parse_lat_lng)]
        bottom_right: LatLng,
    },
    Circle {
        #[arg(long)]
        imei: String,
        #[arg(long)]
        name: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        #[arg(long)]
        radius_m: f64,
        #[arg(long)]
        points: Option<usize>,
    },
    /// Send a geofence form ({"imei", "geofenceName", "coordinates"}) from a JSON file.
    Form { file: String },
    /// Check whether the current position lies inside a polygon JSON file.
    Check { file: String },
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    api: ApiCfg,
    #[serde(default)]
    geofence: GeofenceCfg,
    location: Option<LocationCfg>,
}

#[derive(Debug, serde::Deserialize)]
struct ApiCfg {
    base_url: String,
    token: Option<String>,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
    #[serde(default)]
    dry_run: bool,
}

fn default_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, serde::Deserialize)]
struct GeofenceCfg {
    circle_points: usize,
}

impl Default for GeofenceCfg {
    fn default() -> Self {
        Self { circle_points: shapes::DEFAULT_CIRCLE_POINTS }
    }
}

#[derive(Debug, serde::Deserialize)]
struct LocationCfg {
    source: String,
    nmea_file: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl LocationCfg {
    fn fixed(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lon)
    }
}

fn parse_config(s: &str) -> Result<Config> {
    toml::from_str(s).context("parse config toml")
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
    parse_config(&s)
}

fn parse_lat_lng(s: &str) -> Result<LatLng, String> {
    let (lat, lng) = s.split_once(',').ok_or_else(|| format!("expected \"lat,lng\", got {:?}", s))?;
    let lat = lat.trim().parse().map_err(|e| format!("bad latitude {:?}: {}", lat, e))?;
    let lng = lng.trim().parse().map_err(|e| format!("bad longitude {:?}: {}", lng, e))?;
    Ok(LatLng { lat, lng })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path))?;
    serde_json::from_str(&s).with_context(|| format!("parse json {}", path))
}

fn print_json<T: serde::Serialize>(v: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(v)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Battery { file } => battery(&file)?,
        Command::Validate { what } => validate(what)?,
        Command::Send { imei, command, params, retries } => send(&cfg, &imei, &command, &params, retries).await?,
        Command::Geofence { cmd } => geofence(&cfg, cmd).await?,
        Command::Locate => {
            let fix = location_provider(&cfg).await?.current_position().await?;
            print_json(&fix)?;
        }
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    command_doctor::check_api(&cfg.api.base_url, cfg.api.timeout_ms)?;
    if cfg.api.dry_run {
        warn!("doctor: api.dry_run=true, commands will not be sent");
    }
    geofence_doctor::check_circle_points(cfg.geofence.circle_points)?;

    match &cfg.location {
        Some(loc) => telemetry_doctor::check_location(&loc.source, loc.nmea_file.as_deref(), loc.fixed())?,
        None => info!("doctor: no [location] section, locate/check disabled"),
    }

    info!("doctor: OK");
    Ok(())
}

fn battery(file: &str) -> Result<()> {
    let packets: Option<Vec<TelemetryPacket>> = read_json(file)?;
    let packets = packets.unwrap_or_default();
    info!("battery: {} packets", packets.len());
    println!("{}", fleet_telemetry::compute_battery_drain_time(&packets));
    Ok(())
}

fn validate(what: ValidateCmd) -> Result<()> {
    let result = match what {
        ValidateCmd::Imei(a) => fleet_command::validate_imei(&a.into_value()?),
        ValidateCmd::Command(a) => fleet_command::validate_command(&a.into_value()?),
        ValidateCmd::Params(a) => fleet_command::validate_params(&a.into_value()?),
    };
    print_json(&result)
}

impl ValidateArgs {
    fn into_value(self) -> Result<Value> {
        if self.json {
            serde_json::from_str(&self.value).context("value is not valid JSON")
        } else {
            Ok(Value::String(self.value))
        }
    }
}

fn dispatcher(cfg: &Config) -> Result<Box<dyn CommandDispatcher>> {
    if cfg.api.dry_run {
        return Ok(Box::new(DryRunDispatcher::new()));
    }
    let token = cfg.api.token.clone().or_else(|| std::env::var("FLEET_API_TOKEN").ok());
    Ok(Box::new(HttpDispatcher::new(HttpConfig {
        base_url: cfg.api.base_url.clone(),
        token,
        timeout: std::time::Duration::from_millis(cfg.api.timeout_ms),
    })?))
}

async fn send(cfg: &Config, imei: &str, command: &str, params: &str, retries: u32) -> Result<()> {
    let params: Value = serde_json::from_str(params).context("--params is not valid JSON")?;
    let d = dispatcher(cfg)?;

    let mut failures = 0u32;
    loop {
        match d.send_device_command(imei, command, params.clone()).await {
            Ok(resp) => return print_json(&resp),
            Err(e) if e.code == CommandErrorCode::Network && failures < retries => {
                failures += 1;
                let health = fleet_command::LinkHealth { rtt_ms: None, consecutive_failures: failures };
                let delay = health.recommended_backoff();
                warn!("send: attempt {} failed, retrying in {:?}: {}", failures, delay, e);
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e).context("send device command"),
        }
    }
}

async fn geofence(cfg: &Config, cmd: GeofenceCmd) -> Result<()> {
    let resp = match cmd {
        GeofenceCmd::Rect { imei, name, top_left, bottom_right } => {
            let d = dispatcher(cfg)?;
            fleet_geofence::set_rectangular_geofence(&*d, &imei, &name, top_left, bottom_right).await?
        }
        GeofenceCmd::Circle { imei, name, lat, lng, radius_m, points } => {
            let points = points.unwrap_or(cfg.geofence.circle_points);
            let d = dispatcher(cfg)?;
            fleet_geofence::set_circular_geofence(&*d, &imei, &name, lat, lng, radius_m, Some(points)).await?
        }
        GeofenceCmd::Form { file } => {
            let form: GeofenceForm = read_json(&file)?;
            if let Err(e) = geofence_doctor::check_polygon(&form.coordinates) {
                warn!("geofence: {:#}", e);
            }
            let d = dispatcher(cfg)?;
            fleet_geofence::set_geofence_from_form(&*d, form).await?
        }
        GeofenceCmd::Check { file } => {
            let polygon: Vec<GeofencePoint> = read_json(&file)?;
            let (inside, here) = check_position(cfg, &polygon).await?;
            println!("{} ({:.6}, {:.6})", if inside { "INSIDE" } else { "OUTSIDE" }, here.latitude, here.longitude);
            return Ok(());
        }
    };
    print_json(&resp)
}

/// Whether the current position lies inside `polygon`. Needs only the
/// location source; the api section is never touched.
async fn check_position(cfg: &Config, polygon: &[GeofencePoint]) -> Result<(bool, GeofencePoint)> {
    geofence_doctor::check_polygon(polygon)?;
    let fix = location_provider(cfg).await?.current_position().await?;
    let here = GeofencePoint::new(fix.latitude, fix.longitude);
    Ok((shapes::point_in_polygon(polygon, here), here))
}

async fn location_provider(cfg: &Config) -> Result<Box<dyn LocationProvider>> {
    let loc = cfg.location.as_ref().context("no [location] config section")?;
    match loc.source.as_str() {
        "nmea-file" => {
            let path = loc.nmea_file.as_ref().context("location.nmea_file missing")?;
            Ok(Box::new(NmeaLocation::open(path).await?))
        }
        "fixed" => {
            let (lat, lon) = loc.fixed().context("location.lat/location.lon missing")?;
            Ok(Box::new(FixedLocation::new(lat, lon)))
        }
        other => anyhow::bail!("unknown location.source: {}", other),
    }
}
