//! Heading estimation.
//!
//! The attitude-derived yaw arrives with every motion sample and is the
//! primary input to the moving-average window. A compass heading carried on
//! the same sample is pushed into the window just before it. The compass
//! callback path (`observe_compass`) overwrites the current heading directly
//! when its accuracy is valid; the next motion sample smooths over it again.

use crate::error::FusionError;
use crate::smoother::HeadingWindow;
use crate::types::{CompassHeading, SensorReading};

/// Wrap any winding into [0, 360).
#[inline]
pub fn normalize_heading(deg: f64) -> f64 {
    ((deg % 360.0) + 360.0) % 360.0
}

/// Attitude yaw in radians to a normalized heading in degrees.
#[inline]
pub fn attitude_heading_from_radians(yaw_rad: f64) -> f64 {
    normalize_heading(yaw_rad.to_degrees())
}

#[derive(Debug, Clone, Copy)]
pub struct HeadingEstimator {
    window: HeadingWindow,
    circular_mean: bool,
    current_deg: f64,
    initial_heading_delay: f64,
    session_origin: Option<f64>,
    initial_heading: Option<f64>,
}

impl HeadingEstimator {
    pub fn new(
        window_size: usize,
        initial_heading_delay: f64,
        circular_mean: bool,
    ) -> Result<Self, FusionError> {
        Ok(Self {
            window: HeadingWindow::new(window_size)?,
            circular_mean,
            current_deg: 0.0,
            initial_heading_delay,
            session_origin: None,
            initial_heading: None,
        })
    }

    /// Feed the heading part of a motion sample and return the smoothed heading.
    ///
    /// The reading must already be validated; a non-finite value here is
    /// still rejected before the window is touched.
    pub fn update(&mut self, reading: &SensorReading) -> Result<f64, FusionError> {
        let attitude = normalize_heading(reading.attitude_yaw_deg);
        let compass = reading.compass_heading_deg.map(normalize_heading);
        if !attitude.is_finite() || compass.is_some_and(|c| !c.is_finite()) {
            return Err(FusionError::InvalidSample("non-finite heading"));
        }

        if let Some(c) = compass {
            self.window.push(c)?;
        }
        self.window.push(attitude)?;
        self.current_deg = if self.circular_mean {
            self.window.circular_mean()
        } else {
            self.window.mean()
        };

        self.latch_initial(reading.timestamp);
        Ok(self.current_deg)
    }

    /// Corrective compass callback. Ignored when accuracy is not positive.
    pub fn observe_compass(&mut self, heading: CompassHeading) -> Result<bool, FusionError> {
        if !heading.true_heading_deg.is_finite() || !heading.accuracy_deg.is_finite() {
            return Err(FusionError::InvalidSample("non-finite compass heading"));
        }
        if !heading.is_valid() {
            return Ok(false);
        }
        self.current_deg = normalize_heading(heading.true_heading_deg);
        Ok(true)
    }

    fn latch_initial(&mut self, timestamp: f64) {
        let origin = *self.session_origin.get_or_insert(timestamp);
        if self.initial_heading.is_none() && timestamp - origin >= self.initial_heading_delay {
            self.initial_heading = Some(self.current_deg);
            tracing::debug!(heading = self.current_deg, "initial heading latched");
        }
    }

    pub fn current(&self) -> f64 {
        self.current_deg
    }

    /// Reference heading captured once per session, `initial_heading_delay`
    /// seconds after the first sample.
    pub fn initial_heading(&self) -> Option<f64> {
        self.initial_heading
    }

    pub fn window(&self) -> &HeadingWindow {
        &self.window
    }

    /// Clear the smoothing window only; current and initial heading survive.
    pub fn reset_smoothing(&mut self) {
        self.window.reset();
    }

    /// Full reset for a new session.
    pub fn reset(&mut self) {
        self.window.reset();
        self.current_deg = 0.0;
        self.session_origin = None;
        self.initial_heading = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vector3;

    fn reading(yaw: f64, t: f64) -> SensorReading {
        SensorReading::new(Vector3::zeros(), yaw, t)
    }

    #[test]
    fn test_normalize_heading() {
        assert_eq!(normalize_heading(0.0), 0.0);
        assert_eq!(normalize_heading(360.0), 0.0);
        assert_eq!(normalize_heading(-90.0), 270.0);
        assert_eq!(normalize_heading(725.0), 5.0);
        assert_eq!(normalize_heading(-450.0), 270.0);
        let h = attitude_heading_from_radians(-core::f64::consts::FRAC_PI_2);
        assert!((h - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_tiny_negative_stays_in_range() {
        let h = normalize_heading(-1e-17);
        assert!((0.0..360.0).contains(&h));
    }

    #[test]
    fn test_attitude_only_smoothing() {
        let mut h = HeadingEstimator::new(5, 2.0, false).unwrap();
        assert_eq!(h.update(&reading(10.0, 0.0)).unwrap(), 10.0);
        assert_eq!(h.update(&reading(20.0, 0.1)).unwrap(), 15.0);
        assert_eq!(h.window().len(), 2);
    }

    #[test]
    fn test_compass_and_attitude_both_enter_window() {
        let mut h = HeadingEstimator::new(5, 2.0, false).unwrap();
        let r = reading(90.0, 0.0).with_compass(80.0);
        assert_eq!(h.update(&r).unwrap(), 85.0);
        assert_eq!(h.window().len(), 2);
    }

    #[test]
    fn test_circular_option_averages_across_north() {
        let mut plain = HeadingEstimator::new(5, 2.0, false).unwrap();
        let mut circular = HeadingEstimator::new(5, 2.0, true).unwrap();
        for (i, yaw) in [-10.0, 10.0].iter().enumerate() {
            plain.update(&reading(*yaw, i as f64)).unwrap();
            circular.update(&reading(*yaw, i as f64)).unwrap();
        }
        assert_eq!(plain.current(), 180.0);
        let c = circular.current();
        assert!(c < 1e-9 || c > 360.0 - 1e-9);
    }

    #[test]
    fn test_compass_callback_corrects_when_accurate() {
        let mut h = HeadingEstimator::new(5, 2.0, false).unwrap();
        h.update(&reading(90.0, 0.0)).unwrap();

        assert!(!h.observe_compass(CompassHeading::new(45.0, -1.0)).unwrap());
        assert_eq!(h.current(), 90.0);

        assert!(h.observe_compass(CompassHeading::new(405.0, 5.0)).unwrap());
        assert_eq!(h.current(), 45.0);

        assert!(h
            .observe_compass(CompassHeading::new(f64::NAN, 5.0))
            .is_err());
        assert_eq!(h.current(), 45.0);
    }

    #[test]
    fn test_initial_heading_latched_once_after_delay() {
        let mut h = HeadingEstimator::new(1, 2.0, false).unwrap();
        h.update(&reading(10.0, 100.0)).unwrap();
        h.update(&reading(20.0, 101.9)).unwrap();
        assert!(h.initial_heading().is_none());
        h.update(&reading(30.0, 102.0)).unwrap();
        assert_eq!(h.initial_heading(), Some(30.0));
        h.update(&reading(40.0, 105.0)).unwrap();
        assert_eq!(h.initial_heading(), Some(30.0));

        h.reset_smoothing();
        assert_eq!(h.initial_heading(), Some(30.0));
        h.reset();
        assert!(h.initial_heading().is_none());
        assert_eq!(h.current(), 0.0);
    }
}
