use crate::error::SimError;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use stride_core::config::{EARTH_RADIUS_M, NORMAL_UPDATE_INTERVAL_SEC};
use stride_core::{displace, normalize_heading, Coordinate, FusionConfig};

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// One straight stretch of the scripted walk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub duration_s: f64,
    pub heading_deg: f64,
}

impl Leg {
    pub const fn new(duration_s: f64, heading_deg: f64) -> Self {
        Self {
            duration_s,
            heading_deg,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkParams {
    pub start: Coordinate,
    pub legs: Vec<Leg>,
    pub cadence_hz: f64,       // steps/s
    pub step_length_m: f64,    // true stride, independent of the tracker's
    pub sample_interval_s: f64, // motion sample period
    pub step_accel_peak: f64,  // vertical user-acceleration peak per footfall
    pub pulse_width_s: f64,    // footfall pulse duration
}

impl Default for WalkParams {
    fn default() -> Self {
        Self {
            start: Coordinate::new(37.3349, -122.0090),
            legs: vec![Leg::new(20.0, 90.0), Leg::new(20.0, 180.0)],
            cadence_hz: 1.8,
            step_length_m: 0.65,
            sample_interval_s: NORMAL_UPDATE_INTERVAL_SEC,
            step_accel_peak: 2.5,
            pulse_width_s: 0.2,
        }
    }
}

impl WalkParams {
    pub fn duration(&self) -> f64 {
        self.legs.iter().map(|l| l.duration_s).sum()
    }

    /// Scripted heading at time `t`; the last leg extends past its end.
    pub fn heading_at(&self, t: f64) -> f64 {
        let mut elapsed = 0.0;
        for leg in &self.legs {
            elapsed += leg.duration_s;
            if t < elapsed {
                return normalize_heading(leg.heading_deg);
            }
        }
        self.legs
            .last()
            .map(|l| normalize_heading(l.heading_deg))
            .unwrap_or(0.0)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.legs.is_empty() {
            return Err(SimError::InvalidWalk("at least one leg is required"));
        }
        if self
            .legs
            .iter()
            .any(|l| !(l.duration_s > 0.0) || !l.heading_deg.is_finite())
        {
            return Err(SimError::InvalidWalk(
                "legs need a positive duration and finite heading",
            ));
        }
        if !self.start.is_finite() {
            return Err(SimError::InvalidWalk("start must be finite"));
        }
        if !(self.cadence_hz > 0.0) {
            return Err(SimError::InvalidWalk("cadence must be positive"));
        }
        if !(self.step_length_m > 0.0) {
            return Err(SimError::InvalidWalk("step length must be positive"));
        }
        if !(self.sample_interval_s > 0.0) {
            return Err(SimError::InvalidWalk("sample interval must be positive"));
        }
        if !(self.pulse_width_s > 0.0) || self.pulse_width_s >= 1.0 / self.cadence_hz {
            return Err(SimError::InvalidWalk(
                "pulse width must be positive and shorter than a step",
            ));
        }
        if !self.step_accel_peak.is_finite() {
            return Err(SimError::InvalidWalk("step acceleration must be finite"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Ground truth sampled at the motion sample rate.
#[derive(Debug, Clone)]
pub struct WalkResult {
    pub time: Vec<f64>,
    pub truth: Vec<Coordinate>,
    pub heading_deg: Vec<f64>,
    pub user_accel: Vec<Vector3<f64>>,
    /// Footfall times, one per true step.
    pub step_times: Vec<f64>,
}

impl WalkResult {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn final_truth(&self) -> Option<Coordinate> {
        self.truth.last().copied()
    }

    /// Truth at the latest sample not after `t`.
    pub fn truth_at(&self, t: f64) -> Option<Coordinate> {
        let idx = self.time.partition_point(|s| *s <= t);
        idx.checked_sub(1).and_then(|i| self.truth.get(i).copied())
    }
}

// ---------------------------------------------------------------------------
// Walker
// ---------------------------------------------------------------------------

/// Half-sine vertical pulse for a footfall at `t_step`.
fn footfall_pulse(t: f64, t_step: f64, peak: f64, width: f64) -> f64 {
    let dt = t - t_step;
    if (0.0..width).contains(&dt) {
        peak * (std::f64::consts::PI * dt / width).sin()
    } else {
        0.0
    }
}

/// Walk the scripted legs. Truth advances by exactly one displacement per
/// footfall, using the scripted heading at that instant.
pub fn simulate_walk(p: &WalkParams) -> Result<WalkResult, SimError> {
    p.validate()?;

    let total = p.duration();
    let step_period = 1.0 / p.cadence_hz;
    let step_times: Vec<f64> = (1..)
        .map(|k| k as f64 * step_period)
        .take_while(|t| *t < total)
        .collect();

    let n = (total / p.sample_interval_s).floor() as usize + 1;
    let mut res = WalkResult {
        time: Vec::with_capacity(n),
        truth: Vec::with_capacity(n),
        heading_deg: Vec::with_capacity(n),
        user_accel: Vec::with_capacity(n),
        step_times,
    };

    let max_lat = FusionConfig::default().max_abs_latitude_deg;
    let mut pos = p.start;
    let mut next_step = 0;

    for i in 0..n {
        let t = i as f64 * p.sample_interval_s;

        while next_step < res.step_times.len() && res.step_times[next_step] <= t {
            let heading = p.heading_at(res.step_times[next_step]);
            pos = displace(pos, heading, p.step_length_m, EARTH_RADIUS_M, max_lat)?;
            next_step += 1;
        }

        // Only the most recent footfall can still be inside its pulse.
        let az = res.step_times[..next_step]
            .last()
            .map(|ts| footfall_pulse(t, *ts, p.step_accel_peak, p.pulse_width_s))
            .unwrap_or(0.0);

        res.time.push(t);
        res.truth.push(pos);
        res.heading_deg.push(p.heading_at(t));
        res.user_accel.push(Vector3::new(0.0, 0.0, az));
    }

    tracing::debug!(
        samples = res.len(),
        steps = res.step_times.len(),
        duration = total,
        "walk simulated"
    );
    Ok(res)
}
