// src/gps/mod.rs
//! NMEA framing, decoding and session state

pub mod convert;
pub mod data;
pub mod frame;
pub mod geodesy;
pub mod nmea;
pub mod source;
pub mod state;

pub use data::{FieldValue, SatelliteView, SentenceKind, SentenceRecord};
pub use state::SessionState;
