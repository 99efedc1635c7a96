// src/monitor.rs
//! Runs a receiver session in the background and shares its state

use crate::{
    display::terminal::TerminalDisplay,
    error::{GpsError, Result},
    gps::{
        source::{self, ByteSource, SourceCloser},
        state::SessionState,
    },
    receiver::SerialGps,
};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, RwLock,
    },
    time::Duration,
};
use tokio::task::JoinHandle;

/// Where the NMEA bytes come from
#[derive(Debug, Clone, PartialEq)]
pub enum GpsSource {
    Serial { port: String, baudrate: u32 },
    Tcp { host: String, port: u16, gpsd_watch: bool },
    File { path: PathBuf },
}

impl GpsSource {
    /// Open the byte source
    pub fn open(&self, timeout: Duration) -> Result<Box<dyn ByteSource + Send>> {
        let byte_source: Box<dyn ByteSource + Send> = match self {
            GpsSource::Serial { port, baudrate } => {
                Box::new(source::open_serial(port, *baudrate, timeout)?)
            }
            GpsSource::Tcp { host, port, gpsd_watch } => {
                Box::new(source::connect_tcp(host, *port, timeout, *gpsd_watch)?)
            }
            GpsSource::File { path } => Box::new(source::open_file(path)?),
        };
        Ok(byte_source)
    }

    pub fn describe(&self) -> String {
        match self {
            GpsSource::Serial { port, baudrate } => format!("serial {} @ {} baud", port, baudrate),
            GpsSource::Tcp { host, port, .. } => format!("tcp {}:{}", host, port),
            GpsSource::File { path } => format!("file {}", path.display()),
        }
    }
}

/// Owns the shared session state that the display reads between merges
pub struct GpsMonitor {
    state: Arc<RwLock<SessionState>>,
    running: Arc<AtomicBool>,
    closer: Mutex<Option<SourceCloser>>,
}

impl GpsMonitor {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState::new())),
            running: Arc::new(AtomicBool::new(true)),
            closer: Mutex::new(None),
        }
    }

    /// Create a monitor around existing shared state and running flag
    pub fn new_with_shared(state: Arc<RwLock<SessionState>>, running: Arc<AtomicBool>) -> Self {
        Self {
            state,
            running,
            closer: Mutex::new(None),
        }
    }

    /// Open the source and start the read loop on a blocking task.
    ///
    /// The task ends when the monitor is stopped or the source dies; in the
    /// latter case the running flag is cleared and the error returned. A read
    /// that fails because [`GpsMonitor::stop`] closed the source ends cleanly.
    pub fn start(&self, gps_source: &GpsSource, timeout: Duration) -> Result<JoinHandle<Result<()>>> {
        let byte_source = gps_source.open(timeout)?;
        log::info!("Reading NMEA from {}", gps_source.describe());
        Ok(self.spawn_reader(byte_source))
    }

    /// Run the read loop over an already-open byte source
    pub fn spawn_reader<S>(&self, byte_source: S) -> JoinHandle<Result<()>>
    where
        S: ByteSource + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let running = Arc::clone(&self.running);
        *self.closer.lock().unwrap() = Some(byte_source.closer());

        tokio::task::spawn_blocking(move || {
            let mut gps = SerialGps::new(byte_source);

            while running.load(Ordering::Relaxed) {
                match gps.read() {
                    Ok(snapshot) => {
                        *state.write().unwrap() = snapshot.clone();
                    }
                    Err(e) if !running.load(Ordering::Relaxed) => {
                        log::debug!("Reader stopped: {}", e);
                        break;
                    }
                    Err(e) => {
                        running.store(false, Ordering::Relaxed);
                        return Err(e);
                    }
                }
            }

            gps.close();
            Ok(())
        })
    }

    /// Start the terminal display
    pub async fn run_display(&self, antenna: Option<(f64, f64)>) -> Result<()> {
        let terminal_display = TerminalDisplay::new(antenna);
        terminal_display
            .run(Arc::clone(&self.state), Arc::clone(&self.running))
            .await
    }

    /// Stop the monitor, closing the source so a blocked read returns
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(closer) = self.closer.lock().unwrap().as_ref() {
            closer.close();
        }
    }

    /// Check if the monitor is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Snapshot of the session state as of the last completed read
    pub fn get_state(&self) -> SessionState {
        self.state.read().unwrap().clone()
    }
}

impl Default for GpsMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// List available serial ports
pub fn list_serial_ports() -> Result<()> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| GpsError::Other(format!("Failed to list serial ports: {}", e)))?;

    if ports.is_empty() {
        println!("No serial ports found.");
    } else {
        println!("Available serial ports:");
        for port in ports {
            println!("  {} - {:?}", port.port_name, port.port_type);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::source::{channel, StreamSource};
    use std::io::Cursor;

    #[tokio::test]
    async fn test_reader_publishes_state_then_stops_on_eof() {
        let monitor = GpsMonitor::new();
        let input = concat!(
            "$GPGGA,002909,3659.418,S,17429.240,E,1,06,1.5,165.3,M,28.0,M,,*5F\r\n",
            "$PGRMM,WGS 84*06\r\n",
        );

        let handle = monitor.spawn_reader(StreamSource::new(
            "memory",
            Cursor::new(input.as_bytes().to_vec()),
        ));
        let result = handle.await.unwrap();

        assert!(result.unwrap_err().is_source_unavailable());
        assert!(!monitor.is_running());

        let state = monitor.get_state();
        assert_eq!(state.integer("num_sat"), Some(6));
        assert_eq!(state.text("coordinate_system"), Some("WGS 84"));
    }

    #[tokio::test]
    async fn test_stopped_monitor_reads_nothing() {
        let monitor = GpsMonitor::new();
        monitor.stop();

        let handle = monitor.spawn_reader(StreamSource::new(
            "memory",
            Cursor::new(b"$GPHDT,274.07,T*03\r\n".to_vec()),
        ));

        assert!(handle.await.unwrap().is_ok());
        assert_eq!(monitor.get_state(), SessionState::new());
    }

    #[tokio::test]
    async fn test_stop_wakes_blocked_reader() {
        let monitor = GpsMonitor::new();
        let (tx, reader) = channel::pair(Duration::from_millis(10));
        tx.send(b"$GPHDT,274.07,T*03\r\n".to_vec()).unwrap();

        let handle = monitor.spawn_reader(
            StreamSource::new("channel", reader).with_timeout(Duration::from_secs(30)),
        );

        for _ in 0..100 {
            if monitor.get_state().contains("heading") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(monitor.get_state().text("heading"), Some("274.07"));

        monitor.stop();
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("reader did not stop")
            .unwrap();

        assert!(result.is_ok());
        assert!(!monitor.is_running());
        drop(tx);
    }

    #[test]
    fn test_missing_capture_file() {
        let source = GpsSource::File { path: PathBuf::from("/nonexistent/capture.nmea") };
        assert!(source.open(Duration::from_secs(1)).err().unwrap().is_source_unavailable());
        assert_eq!(source.describe(), "file /nonexistent/capture.nmea");
    }
}
