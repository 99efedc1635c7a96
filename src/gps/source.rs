// src/gps/source.rs
//! Byte sources the frame reader pulls from: serial port, TCP relay, file

use crate::error::{GpsError, Result};
use std::{
    fs::File,
    io::{BufReader, ErrorKind, Read, Write},
    net::{Shutdown, TcpStream},
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPort, StopBits};

/// Command asking a gpsd daemon to relay raw NMEA instead of JSON
const GPSD_WATCH_NMEA: &[u8] = b"?WATCH={\"enable\":true,\"nmea\":true}\n";

/// Longest a device read blocks before the closed flag is looked at again
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// A blocking, byte-at-a-time input the frame reader owns exclusively.
///
/// A read on a closed or broken source must fail with
/// [`GpsError::SourceUnavailable`] rather than hang.
pub trait ByteSource {
    /// Block until the next byte arrives
    fn read_byte(&mut self) -> Result<u8>;

    /// Disconnect; every later read fails
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Handle that closes this source from another thread, waking a blocked read
    fn closer(&self) -> SourceCloser;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read_byte(&mut self) -> Result<u8> {
        (**self).read_byte()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn closer(&self) -> SourceCloser {
        (**self).closer()
    }
}

/// Cloneable close handle for a [`ByteSource`] being read on another thread.
///
/// Closing marks the source closed and runs its shutdown hook, if any; the
/// pending read then fails within one poll interval.
#[derive(Clone)]
pub struct SourceCloser {
    closed: Arc<AtomicBool>,
    shutdown: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl SourceCloser {
    fn new() -> Self {
        Self {
            closed: Arc::new(AtomicBool::new(false)),
            shutdown: None,
        }
    }

    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            if let Some(shutdown) = &self.shutdown {
                shutdown();
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Adapts any [`Read`] into a [`ByteSource`]
pub struct StreamSource<R: Read> {
    name: String,
    reader: Option<BufReader<R>>,
    closer: SourceCloser,
    timeout: Option<Duration>,
}

pub type SerialSource = StreamSource<Box<dyn SerialPort>>;
pub type TcpSource = StreamSource<TcpStream>;
pub type FileSource = StreamSource<File>;

impl<R: Read> StreamSource<R> {
    /// Wrap a reader whose own timeouts are final
    pub fn new(name: impl Into<String>, inner: R) -> Self {
        Self {
            name: name.into(),
            reader: Some(BufReader::new(inner)),
            closer: SourceCloser::new(),
            timeout: None,
        }
    }

    /// Treat the reader's timeouts as poll ticks and give up once no byte
    /// has arrived for `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run `shutdown` when the source is closed from another thread
    pub fn with_shutdown(mut self, shutdown: impl Fn() + Send + Sync + 'static) -> Self {
        self.closer.shutdown = Some(Arc::new(shutdown));
        self
    }

    fn unavailable(&self, reason: impl std::fmt::Display) -> GpsError {
        GpsError::SourceUnavailable(format!("{}: {}", self.name, reason))
    }
}

impl<R: Read> ByteSource for StreamSource<R> {
    fn read_byte(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        let started = Instant::now();
        loop {
            if self.closer.is_closed() {
                return Err(self.unavailable("source is closed"));
            }

            let result = match self.reader.as_mut() {
                Some(reader) => reader.read(&mut byte),
                None => return Err(self.unavailable("source is closed")),
            };

            match result {
                Ok(0) => return Err(self.unavailable("end of stream")),
                Ok(_) => return Ok(byte[0]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                    match self.timeout {
                        Some(timeout) if started.elapsed() < timeout => continue,
                        _ => return Err(self.unavailable("read timed out")),
                    }
                }
                Err(e) => return Err(self.unavailable(e)),
            }
        }
    }

    fn close(&mut self) {
        self.closer.close();
        if self.reader.take().is_some() {
            log::info!("Closed GPS source {}", self.name);
        }
    }

    fn is_open(&self) -> bool {
        self.reader.is_some() && !self.closer.is_closed()
    }

    fn closer(&self) -> SourceCloser {
        self.closer.clone()
    }
}

/// Open a serial GPS at 8N1 without flow control, asserting RTS and DTR
pub fn open_serial(port: &str, baudrate: u32, timeout: Duration) -> Result<SerialSource> {
    log::info!("Opening serial GPS on {} at {} baud", port, baudrate);

    let mut serial = tokio_serial::new(port, baudrate)
        .data_bits(DataBits::Eight)
        .stop_bits(StopBits::One)
        .parity(Parity::None)
        .flow_control(FlowControl::None)
        .timeout(POLL_INTERVAL.min(timeout))
        .open()?;

    serial.write_request_to_send(true)?;
    serial.write_data_terminal_ready(true)?;

    Ok(StreamSource::new(port, serial).with_timeout(timeout))
}

/// Connect to a TCP endpoint that streams NMEA text.
///
/// With `gpsd_watch` set, the gpsd raw-NMEA watch command is sent first.
pub fn connect_tcp(host: &str, port: u16, timeout: Duration, gpsd_watch: bool) -> Result<TcpSource> {
    log::info!("Connecting to NMEA stream at {}:{}", host, port);

    let mut stream = TcpStream::connect((host, port)).map_err(|e| {
        GpsError::SourceUnavailable(format!("Failed to connect to {}:{}: {}", host, port, e))
    })?;
    stream.set_read_timeout(Some(POLL_INTERVAL.min(timeout)))?;

    if gpsd_watch {
        stream
            .write_all(GPSD_WATCH_NMEA)
            .map_err(|e| GpsError::SourceUnavailable(format!("Failed to send WATCH command: {}", e)))?;
    }

    let handle = stream.try_clone()?;
    Ok(StreamSource::new(format!("{}:{}", host, port), stream)
        .with_timeout(timeout)
        .with_shutdown(move || {
            if let Err(e) = handle.shutdown(Shutdown::Both) {
                log::debug!("TCP shutdown failed: {}", e);
            }
        }))
}

/// Replay a captured NMEA log
pub fn open_file(path: &Path) -> Result<FileSource> {
    let file = File::open(path).map_err(|e| {
        GpsError::SourceUnavailable(format!("Failed to open {}: {}", path.display(), e))
    })?;

    Ok(StreamSource::new(path.display().to_string(), file))
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::{io::Cursor, thread};

    #[test]
    fn test_reads_bytes_then_end_of_stream() {
        let mut source = StreamSource::new("memory", Cursor::new(b"$G".to_vec()));

        assert_eq!(source.read_byte().unwrap(), b'$');
        assert_eq!(source.read_byte().unwrap(), b'G');

        let err = source.read_byte().unwrap_err();
        assert!(err.is_source_unavailable());
    }

    #[test]
    fn test_closed_source_fails() {
        let mut source = StreamSource::new("memory", Cursor::new(b"$GPGGA".to_vec()));
        assert!(source.is_open());

        source.close();

        assert!(!source.is_open());
        assert!(source.read_byte().unwrap_err().is_source_unavailable());
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let err = open_file(Path::new("/nonexistent/capture.nmea")).err().unwrap();
        assert!(err.is_source_unavailable());
    }

    #[test]
    fn test_boxed_source() {
        let mut source: Box<dyn ByteSource> =
            Box::new(StreamSource::new("memory", Cursor::new(b"x".to_vec())));
        assert_eq!(source.read_byte().unwrap(), b'x');
        source.close();
        assert!(!source.is_open());
    }

    #[test]
    fn test_timeouts_are_poll_ticks_until_deadline() {
        let (tx, reader) = channel::pair(Duration::from_millis(10));
        let mut source = StreamSource::new("channel", reader).with_timeout(Duration::from_secs(5));

        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            tx.send(b"$".to_vec()).unwrap();
            tx
        });

        assert_eq!(source.read_byte().unwrap(), b'$');
        drop(sender.join().unwrap());
    }

    #[test]
    fn test_timeout_without_deadline_is_final() {
        let (_tx, reader) = channel::pair(Duration::from_millis(10));
        let mut source = StreamSource::new("channel", reader);

        let err = source.read_byte().unwrap_err();
        assert!(err.to_string().contains("read timed out"));
    }

    #[test]
    fn test_deadline_expires() {
        let (_tx, reader) = channel::pair(Duration::from_millis(10));
        let mut source = StreamSource::new("channel", reader).with_timeout(Duration::from_millis(50));

        let started = Instant::now();
        let err = source.read_byte().unwrap_err();
        assert!(err.to_string().contains("read timed out"));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_closer_wakes_blocked_read() {
        let (_tx, reader) = channel::pair(Duration::from_millis(10));
        let mut source = StreamSource::new("channel", reader).with_timeout(Duration::from_secs(30));
        let closer = source.closer();

        let blocked = thread::spawn(move || {
            let started = Instant::now();
            let result = source.read_byte();
            (result, started.elapsed(), source.is_open())
        });

        thread::sleep(Duration::from_millis(50));
        closer.close();

        let (result, waited, open) = blocked.join().unwrap();
        assert!(result.unwrap_err().is_source_unavailable());
        assert!(waited < Duration::from_secs(5));
        assert!(!open);
    }

    #[test]
    fn test_shutdown_hook_runs_once() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut source = StreamSource::new("memory", Cursor::new(Vec::new())).with_shutdown(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        source.closer().close();
        source.close();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
