// src/display/terminal.rs
//! Live console dump of the session state

use super::{field_or, format_coordinate, format_course, format_measurement};
use crate::{
    error::{GpsError, Result},
    gps::{
        data::SatelliteView,
        geodesy::{actual_error, Vincenty},
        state::SessionState,
    },
};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType, DisableLineWrap, EnableLineWrap},
};
use std::{
    io::{self, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};
use tokio::time::sleep;

pub struct TerminalDisplay {
    antenna: Option<(f64, f64)>,
}

impl TerminalDisplay {
    /// `antenna` enables the "actual error" line
    pub fn new(antenna: Option<(f64, f64)>) -> Self {
        Self { antenna }
    }

    /// Redraw once per second until `running` is cleared or Ctrl+C is pressed
    pub async fn run(&self, state: Arc<RwLock<SessionState>>, running: Arc<AtomicBool>) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, Hide, DisableLineWrap).map_err(GpsError::Io)?;

        // Set up Ctrl+C handler
        let running_clone = Arc::clone(&running);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                running_clone.store(false, Ordering::Relaxed);
            }
        });

        println!("Reading...");
        while running.load(Ordering::Relaxed) {
            let snapshot = state.read().unwrap().clone();

            execute!(stdout, Clear(ClearType::All), MoveTo(0, 0)).map_err(GpsError::Io)?;
            self.render_display(&mut stdout, &snapshot)?;
            stdout.flush().map_err(GpsError::Io)?;

            sleep(Duration::from_secs(1)).await;
        }

        execute!(stdout, Show, EnableLineWrap).map_err(GpsError::Io)?;
        println!("\nShutting down...");
        Ok(())
    }

    fn render_display(&self, stdout: &mut impl Write, state: &SessionState) -> Result<()> {
        execute!(
            stdout,
            SetForegroundColor(Color::Green),
            Print("=".repeat(72)),
            Print("\n"),
            ResetColor
        )
        .map_err(GpsError::Io)?;

        for line in self.render_lines(state) {
            execute!(stdout, Print(line), Print("\n")).map_err(GpsError::Io)?;
        }

        let satellites = Self::satellite_rows(state);
        if !satellites.is_empty() {
            execute!(
                stdout,
                SetForegroundColor(Color::Yellow),
                Print("-- Satellites --\n"),
                ResetColor
            )
            .map_err(GpsError::Io)?;

            for row in satellites {
                execute!(stdout, Print(row), Print("\n")).map_err(GpsError::Io)?;
            }
        }

        execute!(
            stdout,
            SetForegroundColor(Color::Green),
            Print("=".repeat(72)),
            Print("\nPress Ctrl+C to exit\n"),
            ResetColor
        )
        .map_err(GpsError::Io)?;

        Ok(())
    }

    /// Summary lines: time, fix, position, elevation, datum
    pub fn render_lines(&self, state: &SessionState) -> Vec<String> {
        let utc = match state.date_time() {
            Ok(Some(ts)) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            Ok(None) => "--".to_string(),
            Err(e) => format!("({})", e),
        };
        let (latitude, longitude) = match state.signed_position() {
            Some((lat, lon)) => (Some(lat), Some(lon)),
            None => (None, None),
        };

        let mut lines = vec![
            format!(
                "UTC: {}   Active Satellites: {} of {}   {}D",
                utc,
                field_or(state, "num_sat", "0"),
                field_or(state, "num_sat_in_view", ""),
                field_or(state, "mode_dimension", "")
            ),
            format!(
                "Latitude: {}\tLongitude: {} +/-{}{}",
                format_coordinate(latitude),
                format_coordinate(longitude),
                field_or(state, "horizontal_error", ""),
                field_or(state, "horizontal_error_units", "")
            ),
        ];

        if let Some(antenna) = self.antenna {
            lines.push(format!(
                "Actual error: {}",
                format_course(actual_error(&Vincenty, state, antenna))
            ));
        }

        lines.push(format!(
            "Elevation: {}{} +/-{}{}\tSpherical Error: {}{}",
            field_or(state, "altitude", ""),
            field_or(state, "alt_unit", ""),
            field_or(state, "altitude_error", ""),
            field_or(state, "altitude_error_units", ""),
            field_or(state, "sperical_error", ""),
            field_or(state, "sperical_error_units", "")
        ));
        lines.push(format!("Coordinate System: {}", field_or(state, "coordinate_system", "")));
        lines
    }

    /// One row per active satellite that has been seen in view
    pub fn satellite_rows(state: &SessionState) -> Vec<String> {
        if !state.contains("num_sat_in_view") {
            return Vec::new();
        }

        state
            .active_satellite_views()
            .into_iter()
            .map(|(index, id, view)| Self::satellite_row(index, id, view))
            .collect()
    }

    fn satellite_row(index: usize, id: &str, view: &SatelliteView) -> String {
        format!(
            "{:>2} {:>3}: {}   Elevation: {}   Azimuth: {}   SNR: {}   {} ({})",
            index + 1,
            id,
            view.last_seen.format("%H:%M:%S"),
            format_measurement(view.elevation),
            format_measurement(view.azimuth),
            format_measurement(view.snr),
            SatelliteView::constellation(id),
            view.signal_strength_description()
        )
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new(None)
    }
}
