// src/display/mod.rs
//! Display helpers for the live console view

pub mod terminal;

use crate::gps::{geodesy::Course, state::SessionState};

/// Render a state field, or `placeholder` when absent
pub fn field_or(state: &SessionState, key: &str, placeholder: &str) -> String {
    state
        .get(key)
        .map(|value| value.to_string())
        .unwrap_or_else(|| placeholder.to_string())
}

/// Format coordinate for display
pub fn format_coordinate(coord: Option<f64>) -> String {
    match coord {
        Some(val) => format!("{:.6}", val),
        None => "No fix".to_string(),
    }
}

/// Format an optional satellite measurement in a 3-wide column
pub fn format_measurement(value: Option<f32>) -> String {
    match value {
        Some(val) => format!("{:>3}", val),
        None => format!("{:>3}", "--"),
    }
}

pub fn format_course(course: Option<Course>) -> String {
    match course {
        Some(course) => format!("{:.1} m, bearing {:.1}°", course.distance, course.bearing),
        None => "no result".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_coordinate(Some(-36.99030)), "-36.990300");
        assert_eq!(format_coordinate(None), "No fix");
        assert_eq!(format_measurement(Some(78.0)), " 78");
        assert_eq!(format_measurement(None), " --");
        assert_eq!(format_course(None), "no result");
        assert_eq!(
            format_course(Some(Course { distance: 12.34, bearing: 90.0 })),
            "12.3 m, bearing 90.0°"
        );
    }

    #[test]
    fn test_field_or() {
        let state = SessionState::new();
        assert_eq!(field_or(&state, "latitude", "?"), "0");
        assert_eq!(field_or(&state, "heading", "?"), "?");
    }
}
