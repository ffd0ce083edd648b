use crate::error::FusionError;
use crate::smoother::MAX_HEADING_WINDOW;

// ---------------------------------------------------------------------------
// Sampling intervals
// ---------------------------------------------------------------------------

/// Motion sample interval used when the device is in its normal power mode.
pub const NORMAL_UPDATE_INTERVAL_SEC: f64 = 0.1;
/// Motion sample interval used when the device is in low-power mode.
pub const LOW_POWER_UPDATE_INTERVAL_SEC: f64 = 0.5;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

// ---------------------------------------------------------------------------
// Fusion tuning
// ---------------------------------------------------------------------------

/// Tunable constants of the fusion pipeline. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FusionConfig {
    /// Low-pass weight of the newest acceleration sample.
    pub alpha: f64,
    /// Heading moving-average window length.
    pub window_size: usize,
    /// Minimum filtered acceleration magnitude for a step (m/s²).
    pub step_detection_threshold: f64,
    /// Minimum time between two steps (s).
    pub refractory_period_sec: f64,
    /// Nominal step length (m).
    pub step_distance_meters: f64,
    pub process_noise: f64,
    pub measurement_noise: f64,
    pub earth_radius_meters: f64,
    /// Delay after the first sample before the reference heading is latched (s).
    pub initial_heading_delay_sec: f64,
    /// Steps are rejected beyond this latitude, where longitude blows up.
    pub max_abs_latitude_deg: f64,
    /// Average headings on the circle instead of as plain scalars.
    pub circular_heading_mean: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            window_size: 5,
            step_detection_threshold: 0.15,
            refractory_period_sec: 0.3,
            step_distance_meters: 0.65,
            process_noise: 0.01,
            measurement_noise: 0.1,
            earth_radius_meters: EARTH_RADIUS_M,
            initial_heading_delay_sec: 2.0,
            max_abs_latitude_deg: 89.9,
            circular_heading_mean: false,
        }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> Result<(), FusionError> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(FusionError::InvalidConfig("alpha must be in (0, 1]"));
        }
        if self.window_size == 0 || self.window_size > MAX_HEADING_WINDOW {
            return Err(FusionError::InvalidConfig("window_size must be in 1..=32"));
        }
        if !(self.step_detection_threshold >= 0.0) {
            return Err(FusionError::InvalidConfig(
                "step_detection_threshold must be non-negative",
            ));
        }
        if !(self.refractory_period_sec >= 0.0) {
            return Err(FusionError::InvalidConfig(
                "refractory_period_sec must be non-negative",
            ));
        }
        if !(self.step_distance_meters > 0.0 && self.step_distance_meters.is_finite()) {
            return Err(FusionError::InvalidConfig(
                "step_distance_meters must be positive",
            ));
        }
        // Positive noises keep the gain strictly inside (0, 1).
        if !(self.process_noise > 0.0 && self.measurement_noise > 0.0) {
            return Err(FusionError::InvalidConfig("filter noises must be positive"));
        }
        if !(self.earth_radius_meters > 0.0 && self.earth_radius_meters.is_finite()) {
            return Err(FusionError::InvalidConfig(
                "earth_radius_meters must be positive",
            ));
        }
        if !(self.initial_heading_delay_sec >= 0.0) {
            return Err(FusionError::InvalidConfig(
                "initial_heading_delay_sec must be non-negative",
            ));
        }
        if !(self.max_abs_latitude_deg > 0.0 && self.max_abs_latitude_deg < 90.0) {
            return Err(FusionError::InvalidConfig(
                "max_abs_latitude_deg must be in (0, 90)",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let c = FusionConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.window_size, 5);
        assert_eq!(c.earth_radius_meters, 6_371_000.0);
        assert_eq!(c.step_distance_meters, 0.65);
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad = [
            FusionConfig {
                alpha: 0.0,
                ..Default::default()
            },
            FusionConfig {
                window_size: 0,
                ..Default::default()
            },
            FusionConfig {
                window_size: MAX_HEADING_WINDOW + 1,
                ..Default::default()
            },
            FusionConfig {
                measurement_noise: 0.0,
                ..Default::default()
            },
            FusionConfig {
                refractory_period_sec: f64::NAN,
                ..Default::default()
            },
            FusionConfig {
                max_abs_latitude_deg: 90.0,
                ..Default::default()
            },
        ];
        for c in bad.iter() {
            assert!(matches!(c.validate(), Err(FusionError::InvalidConfig(_))));
        }
    }
}
