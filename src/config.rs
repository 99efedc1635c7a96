// src/config.rs
//! Configuration stored as JSON under ~/.config/serial-gps

use crate::{
    error::{GpsError, Result},
    monitor::GpsSource,
    receiver::{DEFAULT_BAUDRATE, DEFAULT_READ_TIMEOUT},
};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsConfig {
    pub source_type: String, // "serial", "tcp", "file"
    pub serial_port: Option<String>,
    pub serial_baudrate: Option<u32>,
    pub read_timeout_secs: Option<u64>,
    pub tcp_host: Option<String>,
    pub tcp_port: Option<u16>,
    pub gpsd_watch: bool,
    pub file_path: Option<PathBuf>,
    pub antenna_latitude: Option<f64>,
    pub antenna_longitude: Option<f64>,
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            source_type: "serial".to_string(),
            serial_port: Some("/dev/ttyUSB0".to_string()),
            serial_baudrate: Some(DEFAULT_BAUDRATE),
            read_timeout_secs: Some(DEFAULT_READ_TIMEOUT.as_secs()),
            tcp_host: Some("localhost".to_string()),
            tcp_port: Some(2947),
            gpsd_watch: false,
            file_path: None,
            antenna_latitude: None,
            antenna_longitude: None,
        }
    }
}

impl GpsConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    /// Load from a specific file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| GpsError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| GpsError::Config(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| GpsError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let contents = serde_json::to_string_pretty(self)?;

        std::fs::write(path, contents)
            .map_err(|e| GpsError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Config file path: $HOME/.config/serial-gps/config.json
    pub fn get_config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| GpsError::Config("HOME environment variable not set".to_string()))?;

        Ok(PathBuf::from(home).join(".config").join("serial-gps").join("config.json"))
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_READ_TIMEOUT)
    }

    /// Known antenna location, if both coordinates are configured
    pub fn antenna(&self) -> Option<(f64, f64)> {
        Some((self.antenna_latitude?, self.antenna_longitude?))
    }

    /// Build the source described by this configuration
    pub fn source(&self) -> Result<GpsSource> {
        match self.source_type.as_str() {
            "serial" => Ok(GpsSource::Serial {
                port: self
                    .serial_port
                    .clone()
                    .ok_or_else(|| GpsError::Config("No serial port configured".to_string()))?,
                baudrate: self.serial_baudrate.unwrap_or(DEFAULT_BAUDRATE),
            }),
            "tcp" => Ok(GpsSource::Tcp {
                host: self.tcp_host.clone().unwrap_or_else(|| "localhost".to_string()),
                port: self.tcp_port.unwrap_or(2947),
                gpsd_watch: self.gpsd_watch,
            }),
            "file" => Ok(GpsSource::File {
                path: self
                    .file_path
                    .clone()
                    .ok_or_else(|| GpsError::Config("No capture file configured".to_string()))?,
            }),
            other => Err(GpsError::Config(format!("Unknown source type: {}", other))),
        }
    }

    /// Update serial port settings
    pub fn update_serial(&mut self, port: String, baudrate: u32) {
        self.source_type = "serial".to_string();
        self.serial_port = Some(port);
        self.serial_baudrate = Some(baudrate);
    }

    /// Update TCP relay settings
    pub fn update_tcp(&mut self, host: String, port: u16, gpsd_watch: bool) {
        self.source_type = "tcp".to_string();
        self.tcp_host = Some(host);
        self.tcp_port = Some(port);
        self.gpsd_watch = gpsd_watch;
    }

    /// Replay a capture file instead of a live receiver
    pub fn update_file(&mut self, path: PathBuf) {
        self.source_type = "file".to_string();
        self.file_path = Some(path);
    }

    pub fn set_antenna(&mut self, latitude: f64, longitude: f64) {
        self.antenna_latitude = Some(latitude);
        self.antenna_longitude = Some(longitude);
    }
}
