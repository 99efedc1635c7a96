// src/gps/convert.rs
//! Coordinate and timestamp conversions

use crate::error::{GpsError, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Convert an NMEA `[d]ddmm.mmmm` coordinate to decimal degrees.
///
/// The last two digits before the decimal point (plus the fraction) are
/// minutes; everything before them is degrees. A leading `-` negates the
/// result. Anything else yields `None`, never zero.
pub fn lat_lng_to_decimal(coord: &str) -> Option<f64> {
    let coord = coord.trim();
    let (negative, magnitude) = match coord.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, coord),
    };

    let (whole, fraction) = magnitude.split_once('.')?;
    if whole.len() < 2
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let (degrees, minutes) = whole.split_at(whole.len() - 2);
    let degrees: f64 = if degrees.is_empty() {
        0.0
    } else {
        degrees.parse().ok()?
    };
    let minutes: f64 = if fraction.is_empty() {
        minutes.parse().ok()?
    } else {
        format!("{}.{}", minutes, fraction).parse().ok()?
    };

    let decimal = degrees + minutes / 60.0;
    Some(if negative { -decimal } else { decimal })
}

/// Drop a trailing `.fraction` from an `HHMMSS[.ss]` time
fn strip_fractional_seconds(time: &str) -> &str {
    match time.rsplit_once('.') {
        Some((whole, fraction)) if fraction.bytes().all(|b| b.is_ascii_digit()) => whole,
        _ => time,
    }
}

/// Combine an `HHMMSS[.ss]` time and a `DDMMYY` date into a UTC instant.
///
/// Returns `Ok(None)` when either part is missing or empty, and
/// [`GpsError::MalformedTimestamp`] when both are present but do not parse.
pub fn assemble_timestamp(time: Option<&str>, date: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    let (time, date) = match (time, date) {
        (Some(time), Some(date)) if !time.trim().is_empty() && !date.trim().is_empty() => {
            (time.trim(), date.trim())
        }
        _ => return Ok(None),
    };

    let combined = format!("{} {}", date, strip_fractional_seconds(time));
    let naive = NaiveDateTime::parse_from_str(&combined, "%d%m%y %H%M%S")
        .map_err(|e| GpsError::MalformedTimestamp(format!("{:?}: {}", combined, e)))?;

    Ok(Some(Utc.from_utc_datetime(&naive)))
}
