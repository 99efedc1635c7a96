// src/lib.rs
//! Serial GPS library
//!
//! Reads NMEA-0183 sentences from a serial receiver (or a TCP relay, or a
//! capture file), validates their checksums, decodes the supported
//! sentence kinds and folds them into one continuously updated
//! [`SessionState`].

pub mod config;
pub mod display;
pub mod error;
pub mod gps;
pub mod monitor;
pub mod receiver;

// Re-export main types for convenience
pub use error::{GpsError, Result};
pub use gps::{
    data::{FieldValue, SatelliteView, SentenceKind, SentenceRecord},
    geodesy::{Course, DistanceBearing, Vincenty},
    nmea::decode,
    source::ByteSource,
    state::{MergeOutcome, SessionState},
};
pub use monitor::{GpsMonitor, GpsSource};
pub use receiver::SerialGps;
