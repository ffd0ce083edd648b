//! Parameter definitions for walk simulation and fusion tuning.

use crate::error::SimError;
use crate::sensor::SensorConfig;
use crate::walk::WalkParams;

/// Parameter specification with bounds and step size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    /// Human-readable label.
    pub label: &'static str,
    /// Minimum value.
    pub min: f64,
    /// Maximum value.
    pub max: f64,
    /// Sweep increment.
    pub step: f64,
}

impl ParamSpec {
    pub const fn new(label: &'static str, min: f64, max: f64, step: f64) -> Self {
        Self {
            label,
            min,
            max,
            step,
        }
    }

    /// Every value from `min` to `max` in increments of `step`.
    pub fn sweep_values(&self) -> Vec<f64> {
        if !(self.step > 0.0) || self.max < self.min {
            return vec![self.min];
        }
        let n = ((self.max - self.min) / self.step + 1e-9).floor() as usize;
        (0..=n).map(|i| self.min + i as f64 * self.step).collect()
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Fusion pipeline tunables.
pub mod fusion {
    use super::ParamSpec;

    pub const ALPHA: ParamSpec = ParamSpec::new("Low-pass Alpha", 0.02, 1.0, 0.02);
    pub const WINDOW_SIZE: ParamSpec = ParamSpec::new("Heading Window", 1.0, 32.0, 1.0);
    pub const STEP_THRESHOLD: ParamSpec =
        ParamSpec::new("Step Threshold (m/s²)", 0.05, 1.0, 0.05);
    pub const REFRACTORY: ParamSpec = ParamSpec::new("Refractory (s)", 0.1, 1.0, 0.05);
    pub const STEP_DISTANCE: ParamSpec = ParamSpec::new("Step Length (m)", 0.3, 1.2, 0.05);
    pub const PROCESS_NOISE: ParamSpec = ParamSpec::new("Process Noise", 0.001, 0.1, 0.001);
    pub const MEASUREMENT_NOISE: ParamSpec =
        ParamSpec::new("Measurement Noise", 0.01, 1.0, 0.01);
}

/// Simulated walker.
pub mod walker {
    use super::ParamSpec;

    pub const CADENCE: ParamSpec = ParamSpec::new("Cadence (steps/s)", 0.5, 3.0, 0.1);
    pub const STEP_LENGTH: ParamSpec = ParamSpec::new("True Step (m)", 0.3, 1.2, 0.05);
    pub const STEP_PEAK: ParamSpec = ParamSpec::new("Step Peak (m/s²)", 0.5, 6.0, 0.25);
}

/// Sensor noise model.
pub mod noise {
    use super::ParamSpec;

    pub const NOISE_SCALE: ParamSpec = ParamSpec::new("Noise Scale", 0.0, 5.0, 0.25);
    pub const ACCEL_NOISE: ParamSpec = ParamSpec::new("Accel Noise (m/s²)", 0.0, 0.5, 0.01);
    pub const YAW_NOISE: ParamSpec = ParamSpec::new("Yaw Noise (°)", 0.0, 20.0, 0.5);
    pub const COMPASS_NOISE: ParamSpec = ParamSpec::new("Compass Noise (°)", 0.0, 30.0, 1.0);
}

/// Tunables addressable by name through `TrackerConfig::get_param`/`set_param`.
pub const PARAM_SPECS: [(&str, ParamSpec); 7] = [
    ("alpha", fusion::ALPHA),
    ("window_size", fusion::WINDOW_SIZE),
    ("step_detection_threshold", fusion::STEP_THRESHOLD),
    ("refractory_period_sec", fusion::REFRACTORY),
    ("step_distance_meters", fusion::STEP_DISTANCE),
    ("process_noise", fusion::PROCESS_NOISE),
    ("measurement_noise", fusion::MEASUREMENT_NOISE),
];

pub fn param_spec(name: &str) -> Option<ParamSpec> {
    PARAM_SPECS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, spec)| *spec)
}

pub fn param_names() -> impl Iterator<Item = &'static str> {
    PARAM_SPECS.iter().map(|(n, _)| *n)
}

/// Walker and sensor knobs. Sweeping one re-simulates the walk instead of
/// re-running the tracker over the same data.
pub const SCENARIO_SPECS: [(&str, ParamSpec); 7] = [
    ("cadence", walker::CADENCE),
    ("true_step_length", walker::STEP_LENGTH),
    ("step_peak", walker::STEP_PEAK),
    ("noise_scale", noise::NOISE_SCALE),
    ("accel_noise", noise::ACCEL_NOISE),
    ("yaw_noise", noise::YAW_NOISE),
    ("compass_noise", noise::COMPASS_NOISE),
];

pub fn scenario_spec(name: &str) -> Option<ParamSpec> {
    SCENARIO_SPECS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, spec)| *spec)
}

pub fn scenario_names() -> impl Iterator<Item = &'static str> {
    SCENARIO_SPECS.iter().map(|(n, _)| *n)
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

/// Inputs of one simulated run, addressable by scenario parameter name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scenario {
    pub walk: WalkParams,
    pub sensor: SensorConfig,
}

impl Scenario {
    pub fn get_param(&self, name: &str) -> Result<f64, SimError> {
        Ok(match name {
            "cadence" => self.walk.cadence_hz,
            "true_step_length" => self.walk.step_length_m,
            "step_peak" => self.walk.step_accel_peak,
            "noise_scale" => self.sensor.noise_scale,
            "accel_noise" => self.sensor.accel_noise_std,
            "yaw_noise" => self.sensor.yaw_noise_std_deg,
            "compass_noise" => self.sensor.compass_noise_std_deg,
            _ => return Err(SimError::UnknownParam(name.to_string())),
        })
    }

    pub fn set_param(&mut self, name: &str, value: f64) -> Result<(), SimError> {
        match name {
            "cadence" => self.walk.cadence_hz = value,
            "true_step_length" => self.walk.step_length_m = value,
            "step_peak" => self.walk.step_accel_peak = value,
            "noise_scale" => self.sensor.noise_scale = value,
            "accel_noise" => self.sensor.accel_noise_std = value,
            "yaw_noise" => self.sensor.yaw_noise_std_deg = value,
            "compass_noise" => self.sensor.compass_noise_std_deg = value,
            _ => return Err(SimError::UnknownParam(name.to_string())),
        }
        Ok(())
    }

    /// Every scenario parameter must sit inside its table range.
    pub fn check_ranges(&self) -> Result<(), SimError> {
        for (name, spec) in SCENARIO_SPECS {
            let value = self.get_param(name)?;
            if !spec.contains(value) {
                return Err(SimError::ParamOutOfRange {
                    name,
                    value,
                    min: spec.min,
                    max: spec.max,
                });
            }
        }
        Ok(())
    }
}
