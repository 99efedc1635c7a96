// src/gps/data.rs
//! Decoded sentence records and the values they carry

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{collections::BTreeMap, fmt};

/// One entry of the visible-satellite table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SatelliteView {
    pub elevation: Option<f32>, // Elevation angle in degrees (max 90)
    pub azimuth: Option<f32>,   // Azimuth, degrees from true north
    pub snr: Option<f32>,       // Signal-to-noise ratio in dB
    pub last_seen: DateTime<Utc>,
}

impl SatelliteView {
    pub fn new(last_seen: DateTime<Utc>) -> Self {
        Self {
            elevation: None,
            azimuth: None,
            snr: None,
            last_seen,
        }
    }

    /// Constellation implied by an NMEA satellite id
    pub fn constellation(id: &str) -> &'static str {
        match id.trim().parse::<u16>() {
            Ok(1..=32) => "GPS",
            Ok(33..=64) => "SBAS",
            Ok(65..=96) => "GLONASS",
            Ok(120..=163) => "BEIDOU",
            Ok(193..=197) => "QZSS",
            Ok(211..=246) => "GALILEO",
            _ => "UNKNOWN",
        }
    }

    pub fn signal_strength_description(&self) -> &'static str {
        match self.snr {
            Some(snr) if snr >= 40.0 => "Excellent",
            Some(snr) if snr >= 35.0 => "Good",
            Some(snr) if snr >= 25.0 => "Fair",
            Some(snr) if snr >= 15.0 => "Poor",
            Some(_) => "Very Poor",
            None => "Unknown",
        }
    }
}

/// Satellite id -> most recent sighting
pub type SatelliteTable = BTreeMap<String, SatelliteView>;

/// A single decoded field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Decimal(f64),
    /// Ordered satellite ids (`active_satellites`)
    List(Vec<String>),
    /// Nested satellite table (`visible_satellites`)
    Satellites(SatelliteTable),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; text fields are parsed on demand
    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            FieldValue::Decimal(d) => Some(*d),
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(ids) => Some(ids),
            _ => None,
        }
    }

    pub fn as_satellites(&self) -> Option<&SatelliteTable> {
        match self {
            FieldValue::Satellites(table) => Some(table),
            _ => None,
        }
    }

    /// Empty text counts as absent
    pub fn is_empty_text(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.is_empty())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Decimal(d) => write!(f, "{}", d),
            FieldValue::List(ids) => write!(f, "{}", ids.join(",")),
            FieldValue::Satellites(table) => write!(f, "{} satellites", table.len()),
        }
    }
}

/// The sentence kinds the decoder understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SentenceKind {
    Gga,
    Gll,
    Rma,
    Rmb,
    Rmc,
    Rme,
    Rmm,
    Rmz,
    Gsa,
    Gsv,
    Hdt,
    Zda,
    Bod,
    Rte,
    Wpl,
    Lib,
    /// Unrecognized or malformed
    None,
}

impl SentenceKind {
    pub const ALL: [SentenceKind; 16] = [
        SentenceKind::Gga,
        SentenceKind::Gll,
        SentenceKind::Rma,
        SentenceKind::Rmb,
        SentenceKind::Rmc,
        SentenceKind::Rme,
        SentenceKind::Rmm,
        SentenceKind::Rmz,
        SentenceKind::Gsa,
        SentenceKind::Gsv,
        SentenceKind::Hdt,
        SentenceKind::Zda,
        SentenceKind::Bod,
        SentenceKind::Rte,
        SentenceKind::Wpl,
        SentenceKind::Lib,
    ];

    /// Look up the 3-letter sentence code (talker prefix already removed)
    pub fn from_code(code: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.code() == code)
            .unwrap_or(SentenceKind::None)
    }

    pub fn code(&self) -> &'static str {
        match self {
            SentenceKind::Gga => "GGA",
            SentenceKind::Gll => "GLL",
            SentenceKind::Rma => "RMA",
            SentenceKind::Rmb => "RMB",
            SentenceKind::Rmc => "RMC",
            SentenceKind::Rme => "RME",
            SentenceKind::Rmm => "RMM",
            SentenceKind::Rmz => "RMZ",
            SentenceKind::Gsa => "GSA",
            SentenceKind::Gsv => "GSV",
            SentenceKind::Hdt => "HDT",
            SentenceKind::Zda => "ZDA",
            SentenceKind::Bod => "BOD",
            SentenceKind::Rte => "RTE",
            SentenceKind::Wpl => "WPL",
            SentenceKind::Lib => "LIB",
            SentenceKind::None => "none",
        }
    }

    pub fn is_none(&self) -> bool {
        *self == SentenceKind::None
    }
}

impl fmt::Display for SentenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Sparse result of decoding one sentence: only fields actually present
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceRecord {
    pub kind: SentenceKind,
    fields: BTreeMap<String, FieldValue>,
}

impl SentenceRecord {
    pub fn new(kind: SentenceKind) -> Self {
        Self {
            kind,
            fields: BTreeMap::new(),
        }
    }

    /// The "skip and read again" record
    pub fn none() -> Self {
        Self::new(SentenceKind::None)
    }

    pub fn is_none(&self) -> bool {
        self.kind.is_none()
    }

    /// Store a field; `None` leaves it absent
    pub fn set(&mut self, key: &str, value: Option<FieldValue>) {
        if let Some(value) = value {
            self.fields.insert(key.to_string(), value);
        }
    }

    pub fn set_text(&mut self, key: &str, value: Option<&str>) {
        self.set(key, value.map(|v| FieldValue::Text(v.to_string())));
    }

    /// Drop every empty-text field
    pub fn prune(&mut self) {
        self.fields.retain(|_, value| !value.is_empty_text());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_text)
    }

    pub fn decimal(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(FieldValue::as_decimal)
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(FieldValue::as_integer)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    pub fn into_fields(self) -> BTreeMap<String, FieldValue> {
        self.fields
    }
}
