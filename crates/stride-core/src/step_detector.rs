use crate::types::{StepEvent, Vector3};

/// Threshold detector with a refractory period.
///
/// A step fires iff the magnitude is above threshold and strictly more than
/// `refractory_period` seconds have passed since the previous step. A
/// sustained spike therefore yields one event per refractory window.
#[derive(Debug, Clone, Copy)]
pub struct StepDetector {
    threshold: f64,
    refractory_period: f64,
    last_step_timestamp: Option<f64>,
    step_count: u64,
}

impl StepDetector {
    pub fn new(threshold: f64, refractory_period: f64) -> Self {
        Self {
            threshold,
            refractory_period,
            last_step_timestamp: None,
            step_count: 0,
        }
    }

    /// Euclidean norm of a filtered acceleration.
    #[inline]
    pub fn magnitude(accel: &Vector3) -> f64 {
        libm::sqrt(accel.x * accel.x + accel.y * accel.y + accel.z * accel.z)
    }

    pub fn detect(
        &mut self,
        magnitude: f64,
        timestamp: f64,
        heading_deg: f64,
    ) -> Option<StepEvent> {
        if magnitude <= self.threshold {
            return None;
        }
        if let Some(last) = self.last_step_timestamp {
            if timestamp - last <= self.refractory_period {
                return None;
            }
        }

        self.last_step_timestamp = Some(timestamp);
        self.step_count += 1;

        Some(StepEvent {
            timestamp,
            heading_deg,
            step_index: self.step_count,
        })
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn last_step_timestamp(&self) -> Option<f64> {
        self.last_step_timestamp
    }

    pub fn reset(&mut self) {
        self.last_step_timestamp = None;
        self.step_count = 0;
    }
}
