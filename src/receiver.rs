// src/receiver.rs
//! The blocking read cycle: frame -> decode -> merge

use crate::{
    error::Result,
    gps::{
        frame::FrameReader,
        geodesy::{self, Course, DistanceBearing},
        nmea,
        source::{self, ByteSource, SerialSource},
        state::{MergeOutcome, SessionState},
    },
};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Default NMEA-0183 line rate
pub const DEFAULT_BAUDRATE: u32 = 4800;

/// Default per-byte read timeout
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// A GPS receiver session: owns the byte source and the accumulated state
pub struct SerialGps<S> {
    reader: FrameReader<S>,
    state: SessionState,
}

impl SerialGps<SerialSource> {
    /// Open a serial receiver
    pub fn open(port: &str, baudrate: u32, timeout: Duration) -> Result<Self> {
        Ok(Self::new(source::open_serial(port, baudrate, timeout)?))
    }
}

impl<S: ByteSource> SerialGps<S> {
    pub fn new(source: S) -> Self {
        Self {
            reader: FrameReader::new(source),
            state: SessionState::new(),
        }
    }

    /// Next checksum-valid raw sentence, without decoding it
    pub fn next_sentence(&mut self) -> Result<String> {
        self.reader.next_sentence()
    }

    /// Read until one usable sentence has been merged, then return the state.
    ///
    /// Fails only when the byte source is gone.
    pub fn read(&mut self) -> Result<&SessionState> {
        loop {
            let raw = self.reader.next_sentence()?;
            match self.state.merge(nmea::decode(&raw)) {
                MergeOutcome::Merged(kind) => {
                    log::trace!("Merged {} sentence", kind);
                    return Ok(&self.state);
                }
                MergeOutcome::Retry => continue,
            }
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// UTC date and time reported by the receiver, once both are known
    pub fn date_time(&self) -> Result<Option<DateTime<Utc>>> {
        self.state.date_time()
    }

    /// Course from a known antenna location to the current fix
    pub fn actual_error<G: DistanceBearing>(&self, geodesy: &G, antenna: (f64, f64)) -> Option<Course> {
        geodesy::actual_error(geodesy, &self.state, antenna)
    }

    /// Lines rejected by framing or checksum so far
    pub fn discarded(&self) -> u64 {
        self.reader.discarded()
    }

    /// Close the byte source; later reads fail with `SourceUnavailable`
    pub fn close(&mut self) {
        self.reader.close();
    }
}
