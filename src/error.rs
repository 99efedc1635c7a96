// src/error.rs
//! Error types for the serial GPS reader

use std::fmt;

pub type Result<T> = std::result::Result<T, GpsError>;

#[derive(Debug)]
pub enum GpsError {
    Io(std::io::Error),
    Serial(tokio_serial::Error),
    Json(serde_json::Error),
    /// The byte source hit end-of-stream, timed out, or was closed
    SourceUnavailable(String),
    /// Both `time` and `date` are present but do not form a valid UTC instant
    MalformedTimestamp(String),
    Geodesy(String),
    Config(String),
    Other(String),
}

impl fmt::Display for GpsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpsError::Io(e) => write!(f, "IO error: {}", e),
            GpsError::Serial(e) => write!(f, "Serial error: {}", e),
            GpsError::Json(e) => write!(f, "JSON error: {}", e),
            GpsError::SourceUnavailable(msg) => write!(f, "Can't connect to the GPS: {}", msg),
            GpsError::MalformedTimestamp(msg) => write!(f, "Malformed timestamp: {}", msg),
            GpsError::Geodesy(msg) => write!(f, "Geodesy error: {}", msg),
            GpsError::Config(msg) => write!(f, "Config error: {}", msg),
            GpsError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for GpsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpsError::Io(e) => Some(e),
            GpsError::Serial(e) => Some(e),
            GpsError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl GpsError {
    /// True when the read loop has lost its byte source
    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, GpsError::SourceUnavailable(_))
    }
}

impl From<std::io::Error> for GpsError {
    fn from(error: std::io::Error) -> Self {
        GpsError::Io(error)
    }
}

impl From<tokio_serial::Error> for GpsError {
    fn from(error: tokio_serial::Error) -> Self {
        GpsError::Serial(error)
    }
}

impl From<serde_json::Error> for GpsError {
    fn from(error: serde_json::Error) -> Self {
        GpsError::Json(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_unavailable_display() {
        let err = GpsError::SourceUnavailable("end of stream".to_string());
        assert!(err.is_source_unavailable());
        assert_eq!(err.to_string(), "Can't connect to the GPS: end of stream");
    }

    #[test]
    fn test_io_error_has_source() {
        let err = GpsError::from(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_source_unavailable());
    }
}
