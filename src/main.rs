// src/main.rs
//! serial-gps - live NMEA-0183 receiver dump

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use serial_gps::{
    config::GpsConfig,
    error::Result,
    monitor::{self, GpsMonitor},
    SerialGps, Vincenty,
};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "serial-gps", version, about = "Read a serial GPS receiver's NMEA output")]
struct Cli {
    /// Serial device, e.g. /dev/ttyUSB0
    #[arg(short, long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Read NMEA from a TCP relay at HOST:PORT instead of a serial port
    #[arg(long, value_name = "HOST:PORT")]
    tcp: Option<String>,

    /// Ask the TCP peer (gpsd) to relay raw NMEA
    #[arg(long, requires = "tcp")]
    gpsd: bool,

    /// Replay a captured NMEA file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Known antenna location as LAT,LON (signed decimal degrees)
    #[arg(long, value_name = "LAT,LON", allow_hyphen_values = true)]
    antenna: Option<String>,

    /// Per-byte read timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Persist the effective settings to the config file
    #[arg(long)]
    save: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Continuously updated console view (default)
    Live,
    /// Print every checksum-valid sentence as received
    Raw,
    /// Print the session state as JSON after every merged sentence
    Json,
    /// List available serial ports
    Ports,
}

fn parse_antenna(value: &str) -> anyhow::Result<(f64, f64)> {
    let (lat, lon) = value
        .split_once(',')
        .ok_or_else(|| anyhow!("Antenna must be LAT,LON: {}", value))?;
    let lat = lat
        .trim()
        .parse::<f64>()
        .with_context(|| format!("Invalid antenna latitude: {}", lat))?;
    let lon = lon
        .trim()
        .parse::<f64>()
        .with_context(|| format!("Invalid antenna longitude: {}", lon))?;
    Ok((lat, lon))
}

fn parse_host_port(value: &str) -> anyhow::Result<(String, u16)> {
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("Expected HOST:PORT, got {}", value))?;
    if host.is_empty() {
        bail!("Missing host in {}", value);
    }
    let port = port
        .parse::<u16>()
        .with_context(|| format!("Invalid port: {}", port))?;
    Ok((host.to_string(), port))
}

/// Apply command line overrides on top of the stored configuration
fn apply_overrides(config: &mut GpsConfig, cli: &Cli) -> anyhow::Result<()> {
    if let Some(ref port) = cli.port {
        let baud = cli.baud.or(config.serial_baudrate).unwrap_or(4800);
        config.update_serial(port.clone(), baud);
    } else if let Some(baud) = cli.baud {
        config.serial_baudrate = Some(baud);
    }

    if let Some(ref tcp) = cli.tcp {
        let (host, port) = parse_host_port(tcp).context("Bad --tcp value")?;
        config.update_tcp(host, port, cli.gpsd);
    }

    if let Some(ref file) = cli.file {
        config.update_file(file.clone());
    }

    if let Some(ref antenna) = cli.antenna {
        let (lat, lon) = parse_antenna(antenna).context("Bad --antenna value")?;
        config.set_antenna(lat, lon);
    }

    if let Some(timeout) = cli.timeout {
        config.read_timeout_secs = Some(timeout);
    }

    Ok(())
}

/// Blocking loop printing raw sentences or JSON snapshots until the source dies
fn dump(config: &GpsConfig, json: bool) -> Result<()> {
    let source = config.source()?;
    let mut gps = SerialGps::new(source.open(config.read_timeout())?);

    println!("Control C to kill");
    loop {
        if json {
            let state = gps.read()?;
            println!("{}", state.to_json()?);
            if let Some(antenna) = config.antenna() {
                if let Some(course) = gps.actual_error(&Vincenty, antenna) {
                    println!("{}", serde_json::to_string(&course)?);
                }
            }
        } else {
            println!("{}", gps.next_sentence()?);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let mut config = GpsConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: {}; using defaults", e);
        GpsConfig::default()
    });
    apply_overrides(&mut config, &cli)?;

    if cli.save {
        config.save().context("Failed to save settings")?;
        println!("Saved settings to {}", GpsConfig::get_config_path()?.display());
    }

    match cli.command.unwrap_or(Command::Live) {
        Command::Ports => monitor::list_serial_ports()?,
        Command::Raw => dump_blocking(config, false).await?,
        Command::Json => dump_blocking(config, true).await?,
        Command::Live => {
            let source = config.source().context("No usable GPS source configured")?;
            println!("Connecting to GPS ({})...", source.describe());

            let monitor = GpsMonitor::new();
            let reader = monitor
                .start(&source, config.read_timeout())
                .with_context(|| format!("Failed to open {}", source.describe()))?;
            monitor.run_display(config.antenna()).await?;

            monitor.stop();
            reader
                .await
                .context("Reader task failed")?
                .context("GPS source failed")?;
        }
    }

    Ok(())
}

async fn dump_blocking(config: GpsConfig, json: bool) -> anyhow::Result<()> {
    tokio::task::spawn_blocking(move || dump(&config, json))
        .await
        .context("Reader task failed")??;
    Ok(())
}
