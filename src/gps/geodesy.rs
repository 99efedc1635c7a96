// src/gps/geodesy.rs
//! Distance and bearing between two positions

use super::state::SessionState;
use crate::error::{GpsError, Result};
use serde::Serialize;

// WGS-84 ellipsoid
const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;

const MAX_ITERATIONS: usize = 200;
const CONVERGENCE: f64 = 1e-12;

/// Distance in metres and initial bearing in degrees from true north
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Course {
    pub distance: f64,
    pub bearing: f64,
}

/// Geodesic calculation between two signed decimal (lat, long) pairs
pub trait DistanceBearing {
    fn distance_and_bearing(&self, from: (f64, f64), to: (f64, f64)) -> Result<Course>;
}

/// Vincenty's inverse formula on the WGS-84 ellipsoid
#[derive(Debug, Clone, Copy, Default)]
pub struct Vincenty;

fn validate(point: (f64, f64)) -> Result<()> {
    let (lat, lon) = point;
    if !lat.is_finite() || !lon.is_finite() || lat.abs() > 90.0 || lon.abs() > 180.0 {
        return Err(GpsError::Geodesy(format!("invalid coordinate ({}, {})", lat, lon)));
    }
    Ok(())
}

impl DistanceBearing for Vincenty {
    fn distance_and_bearing(&self, from: (f64, f64), to: (f64, f64)) -> Result<Course> {
        validate(from)?;
        validate(to)?;

        let b = (1.0 - WGS84_F) * WGS84_A;
        let l = (to.1 - from.1).to_radians();
        let u1 = ((1.0 - WGS84_F) * from.0.to_radians().tan()).atan();
        let u2 = ((1.0 - WGS84_F) * to.0.to_radians().tan()).atan();
        let (sin_u1, cos_u1) = u1.sin_cos();
        let (sin_u2, cos_u2) = u2.sin_cos();

        let mut lambda = l;
        let mut converged = false;
        let (mut sin_sigma, mut cos_sigma, mut sigma) = (0.0, 0.0, 0.0);
        let (mut cos_sq_alpha, mut cos_2sigma_m) = (0.0, 0.0);
        let (mut sin_lambda, mut cos_lambda) = (0.0, 0.0);

        for _ in 0..MAX_ITERATIONS {
            (sin_lambda, cos_lambda) = lambda.sin_cos();
            sin_sigma = ((cos_u2 * sin_lambda).powi(2)
                + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
            .sqrt();

            if sin_sigma == 0.0 {
                // Coincident points
                return Ok(Course { distance: 0.0, bearing: 0.0 });
            }

            cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
            sigma = sin_sigma.atan2(cos_sigma);
            let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
            cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
            cos_2sigma_m = if cos_sq_alpha != 0.0 {
                cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
            } else {
                0.0 // equatorial line
            };

            let c = WGS84_F / 16.0 * cos_sq_alpha * (4.0 + WGS84_F * (4.0 - 3.0 * cos_sq_alpha));
            let previous = lambda;
            lambda = l
                + (1.0 - c)
                    * WGS84_F
                    * sin_alpha
                    * (sigma
                        + c * sin_sigma
                            * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));

            if (lambda - previous).abs() < CONVERGENCE {
                converged = true;
                break;
            }
        }

        if !converged {
            return Err(GpsError::Geodesy("Vincenty formula failed to converge".to_string()));
        }

        let u_sq = cos_sq_alpha * (WGS84_A * WGS84_A - b * b) / (b * b);
        let big_a = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
        let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
        let delta_sigma = big_b
            * sin_sigma
            * (cos_2sigma_m
                + big_b / 4.0
                    * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)
                        - big_b / 6.0
                            * cos_2sigma_m
                            * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                            * (-3.0 + 4.0 * cos_2sigma_m * cos_2sigma_m)));

        let distance = b * big_a * (sigma - delta_sigma);
        let bearing = (cos_u2 * sin_lambda)
            .atan2(cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda)
            .to_degrees()
            .rem_euclid(360.0);

        Ok(Course { distance, bearing })
    }
}

/// Course from a surveyed antenna position to the receiver's reported fix.
///
/// Any failure is logged and reported as `None`.
pub fn actual_error<G: DistanceBearing>(
    geodesy: &G,
    state: &SessionState,
    antenna: (f64, f64),
) -> Option<Course> {
    let position = state.signed_position()?;
    match geodesy.distance_and_bearing(antenna, position) {
        Ok(course) => Some(course),
        Err(e) => {
            log::warn!("actual error unavailable: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::nmea::decode;

    #[test]
    fn test_flinders_peak_to_buninyong() {
        let course = Vincenty
            .distance_and_bearing((-37.951_033_42, 144.424_867_89), (-37.652_821_14, 143.926_495_54))
            .unwrap();

        assert!((course.distance - 54_972.271).abs() < 0.01, "{}", course.distance);
        assert!((course.bearing - 306.868_16).abs() < 1e-4, "{}", course.bearing);
    }

    #[test]
    fn test_coincident_points() {
        let course = Vincenty.distance_and_bearing((10.0, 20.0), (10.0, 20.0)).unwrap();
        assert_eq!(course.distance, 0.0);
    }

    #[test]
    fn test_due_north_bearing() {
        let course = Vincenty.distance_and_bearing((0.0, 0.0), (1.0, 0.0)).unwrap();
        assert!(course.bearing.abs() < 1e-9);
        assert!((course.distance - 110_574.0).abs() < 1.0);
    }

    #[test]
    fn test_invalid_coordinate() {
        let err = Vincenty.distance_and_bearing((95.0, 0.0), (0.0, 0.0)).unwrap_err();
        assert!(matches!(err, GpsError::Geodesy(_)));
    }

    #[test]
    fn test_actual_error_from_state() {
        let mut state = SessionState::new();
        state.merge(decode("$GPGGA,002909,3659.418,S,17429.240,E,1,06,1.5,165.3,M,28.0,M,,"));

        let course = actual_error(&Vincenty, &state, (-36.990_276_129_932_404, 174.487_353_971_827_7)).unwrap();
        assert!(course.distance < 10.0, "{}", course.distance);
    }

    #[test]
    fn test_actual_error_absorbs_failure() {
        let state = SessionState::new();
        assert!(actual_error(&Vincenty, &state, (123.0, 0.0)).is_none());
    }
}
