use crate::config::FusionConfig;
use crate::displacement::{displace, Direction};
use crate::error::FusionError;
use crate::heading::HeadingEstimator;
use crate::position_filter::PositionFilter;
use crate::smoother::AccelSmoother;
use crate::step_detector::StepDetector;
use crate::types::{CompassHeading, Coordinate, Diagnostics, FusionEvent, SensorReading};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TrackingState {
    Idle = 0,
    Tracking = 1,
}

impl TrackingState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Tracking => "Tracking",
        }
    }
}

// ---------------------------------------------------------------------------
// Track state
// ---------------------------------------------------------------------------

/// Everything one tracking session mutates. Owned by the controller and
/// handed to each pipeline stage by exclusive reference.
#[derive(Debug, Clone, Copy)]
pub struct TrackState {
    pub position_estimate: Coordinate,
    pub accel: AccelSmoother,
    pub heading: HeadingEstimator,
    pub detector: StepDetector,
    pub filter: PositionFilter,
    last_sample_timestamp: Option<f64>,
}

impl TrackState {
    fn new(config: &FusionConfig) -> Result<Self, FusionError> {
        Ok(Self {
            position_estimate: Coordinate::default(),
            accel: AccelSmoother::new(config.alpha),
            heading: HeadingEstimator::new(
                config.window_size,
                config.initial_heading_delay_sec,
                config.circular_heading_mean,
            )?,
            detector: StepDetector::new(
                config.step_detection_threshold,
                config.refractory_period_sec,
            ),
            filter: PositionFilter::new(config.process_noise, config.measurement_noise),
            last_sample_timestamp: None,
        })
    }

    fn reset(&mut self, fix: Coordinate) {
        self.position_estimate = fix;
        self.accel.reset();
        self.heading.reset();
        self.detector.reset();
        self.filter.reset(fix);
        self.last_sample_timestamp = None;
    }

    fn reset_smoothing(&mut self) {
        self.accel.reset();
        self.heading.reset_smoothing();
    }

    pub fn current_heading_deg(&self) -> f64 {
        self.heading.current()
    }

    pub fn step_count(&self) -> u64 {
        self.detector.step_count()
    }

    pub fn last_step_timestamp(&self) -> Option<f64> {
        self.detector.last_step_timestamp()
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Sequences smoothing, step detection, displacement and filtering for one
/// track. Not reentrant: each sample is fully processed before the next.
pub struct FusionController {
    config: FusionConfig,
    state: TrackingState,
    track: TrackState,
}

impl FusionController {
    pub fn new(config: FusionConfig) -> Result<Self, FusionError> {
        config.validate()?;
        Ok(Self {
            track: TrackState::new(&config)?,
            config,
            state: TrackingState::Idle,
        })
    }

    /// Begin a session at `initial_fix`. Restarting while tracking
    /// reinitializes the session.
    pub fn start_tracking(&mut self, initial_fix: Option<Coordinate>) -> Result<(), FusionError> {
        let fix = match initial_fix {
            Some(f) if f.is_finite() => f,
            _ => return Err(FusionError::NoFixAvailable),
        };

        if self.state == TrackingState::Tracking {
            tracing::debug!("restarting active session");
        }
        self.track.reset(fix);
        self.state = TrackingState::Tracking;
        tracing::debug!(
            latitude = fix.latitude,
            longitude = fix.longitude,
            "tracking started"
        );
        Ok(())
    }

    /// Leave the session. Position and step count stay readable.
    pub fn stop_tracking(&mut self) {
        if self.state == TrackingState::Idle {
            return;
        }
        self.track.reset_smoothing();
        self.state = TrackingState::Idle;
        tracing::debug!(steps = self.track.step_count(), "tracking stopped");
    }

    /// Process one motion sample. Returns an event when a step was taken.
    ///
    /// Samples are ignored while idle. Invalid samples leave the track
    /// untouched.
    pub fn feed_sample(
        &mut self,
        reading: &SensorReading,
    ) -> Result<Option<FusionEvent>, FusionError> {
        if self.state != TrackingState::Tracking {
            tracing::trace!("sample ignored while idle");
            return Ok(None);
        }

        if let Err(e) = Self::validate_order(&self.track, reading) {
            tracing::warn!(timestamp = reading.timestamp, error = %e, "sample rejected");
            return Err(e);
        }

        // Staged on a copy so a rejected step commits nothing.
        let mut next = self.track;
        let event = process_sample(&mut next, &self.config, reading).inspect_err(|e| {
            tracing::warn!(timestamp = reading.timestamp, error = %e, "step rejected");
        })?;
        self.track = next;
        Ok(event)
    }

    fn validate_order(track: &TrackState, reading: &SensorReading) -> Result<(), FusionError> {
        reading.validate()?;
        if let Some(last) = track.last_sample_timestamp {
            if reading.timestamp < last {
                return Err(FusionError::InvalidSample("timestamp went backwards"));
            }
        }
        Ok(())
    }

    /// Corrective compass callback; see [`HeadingEstimator::observe_compass`].
    /// Ignored while idle.
    pub fn observe_compass(&mut self, heading: CompassHeading) -> Result<bool, FusionError> {
        if self.state != TrackingState::Tracking {
            tracing::trace!("compass ignored while idle");
            return Ok(false);
        }
        self.track.heading.observe_compass(heading)
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        self.state == TrackingState::Tracking
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn track(&self) -> &TrackState {
        &self.track
    }

    pub fn position(&self) -> Coordinate {
        self.track.position_estimate
    }

    pub fn step_count(&self) -> u64 {
        self.track.step_count()
    }

    pub fn current_heading_deg(&self) -> f64 {
        self.track.current_heading_deg()
    }

    pub fn initial_heading(&self) -> Option<f64> {
        self.track.heading.initial_heading()
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run one validated sample through the pipeline.
fn process_sample(
    track: &mut TrackState,
    config: &FusionConfig,
    reading: &SensorReading,
) -> Result<Option<FusionEvent>, FusionError> {
    track.last_sample_timestamp = Some(reading.timestamp);

    let heading = track.heading.update(reading)?;
    let filtered = track.accel.filter(reading.accel);
    let magnitude = StepDetector::magnitude(&filtered);

    tracing::trace!(heading, magnitude, "motion sample");

    let step = match track.detector.detect(magnitude, reading.timestamp, heading) {
        Some(s) => s,
        None => return Ok(None),
    };

    let raw = displace(
        track.position_estimate,
        step.heading_deg,
        config.step_distance_meters,
        config.earth_radius_meters,
        config.max_abs_latitude_deg,
    )?;
    track.position_estimate = track.filter.update(raw);

    let event = FusionEvent {
        timestamp: step.timestamp,
        position: track.position_estimate,
        direction: Direction::from_heading_deg(step.heading_deg),
        diagnostics: Diagnostics {
            heading_deg: step.heading_deg,
            step_count: step.step_index,
            uncertainty: track.filter.uncertainty(),
        },
    };

    tracing::debug!(
        step = step.step_index,
        heading = step.heading_deg,
        direction = event.direction.label(),
        latitude = event.position.latitude,
        longitude = event.position.longitude,
        "step"
    );

    Ok(Some(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vector3;
    use core::f64::consts::PI;

    const ORIGIN: Coordinate = Coordinate::new(0.0, 0.0);

    fn controller() -> FusionController {
        FusionController::new(FusionConfig::default()).unwrap()
    }

    /// Filtered magnitude 0.2 on a fresh smoother, above the 0.15 threshold.
    fn spike(yaw_deg: f64, t: f64) -> SensorReading {
        SensorReading::new(Vector3::new(0.0, 0.0, 2.0), yaw_deg, t)
    }

    fn still(yaw_deg: f64, t: f64) -> SensorReading {
        SensorReading::new(Vector3::zeros(), yaw_deg, t)
    }

    #[test]
    fn test_single_north_step_from_origin() {
        let mut c = controller();
        c.start_tracking(Some(ORIGIN)).unwrap();

        let event = c.feed_sample(&spike(0.0, 1.0)).unwrap().unwrap();

        let raw_lat = 0.65 / 6_371_000.0 * 180.0 / PI;
        assert!((event.position.latitude - raw_lat).abs() < 1e-6);
        assert!(event.position.longitude.abs() < 1e-12);
        // Blended against the start fix with the first gain.
        assert!((event.position.latitude - raw_lat * 1.01 / 1.11).abs() < 1e-15);
        assert_eq!(event.diagnostics.step_count, 1);
        assert_eq!(event.direction, Direction::North);
        assert_eq!(c.step_count(), 1);
        assert_eq!(c.position(), event.position);
    }

    #[test]
    fn test_no_step_below_threshold() {
        let mut c = controller();
        c.start_tracking(Some(ORIGIN)).unwrap();
        // 1.0 filtered by alpha 0.1 is 0.1
        let r = SensorReading::new(Vector3::new(1.0, 0.0, 0.0), 0.0, 1.0);
        assert!(c.feed_sample(&r).unwrap().is_none());
        assert_eq!(c.step_count(), 0);
        assert_eq!(c.position(), ORIGIN);
    }

    #[test]
    fn test_refractory_period_applies_through_controller() {
        let mut c = controller();
        c.start_tracking(Some(ORIGIN)).unwrap();
        assert!(c.feed_sample(&spike(90.0, 1.0)).unwrap().is_some());
        assert!(c.feed_sample(&spike(90.0, 1.2)).unwrap().is_none());
        let e = c.feed_sample(&spike(90.0, 1.35)).unwrap().unwrap();
        assert_eq!(e.diagnostics.step_count, 2);
        assert_eq!(e.direction, Direction::East);
        assert!(e.position.longitude > 0.0);
    }

    #[test]
    fn test_start_requires_fix() {
        let mut c = controller();
        assert_eq!(c.start_tracking(None), Err(FusionError::NoFixAvailable));
        assert_eq!(
            c.start_tracking(Some(Coordinate::new(f64::NAN, 0.0))),
            Err(FusionError::NoFixAvailable)
        );
        assert_eq!(c.state(), TrackingState::Idle);
        assert!(c.feed_sample(&spike(0.0, 1.0)).unwrap().is_none());
    }

    #[test]
    fn test_invalid_sample_leaves_state_unchanged() {
        let mut c = controller();
        c.start_tracking(Some(ORIGIN)).unwrap();
        c.feed_sample(&still(30.0, 0.5)).unwrap();
        let heading_before = c.current_heading_deg();
        let window_before = c.track().heading.window().len();

        let bad = SensorReading::new(Vector3::new(0.0, 0.0, 2.0), f64::NAN, 1.0);
        assert!(matches!(
            c.feed_sample(&bad),
            Err(FusionError::InvalidSample(_))
        ));
        assert_eq!(c.current_heading_deg(), heading_before);
        assert_eq!(c.track().heading.window().len(), window_before);
        assert_eq!(c.track().accel.current(), Vector3::zeros());

        let backwards = still(30.0, 0.4);
        assert!(c.feed_sample(&backwards).is_err());

        // Session continues
        assert!(c.feed_sample(&spike(30.0, 1.0)).unwrap().is_some());
    }

    #[test]
    fn test_stop_is_idempotent_and_keeps_results() {
        let mut c = controller();
        c.stop_tracking();
        assert_eq!(c.state(), TrackingState::Idle);

        c.start_tracking(Some(ORIGIN)).unwrap();
        let e = c.feed_sample(&spike(0.0, 1.0)).unwrap().unwrap();
        c.stop_tracking();
        c.stop_tracking();

        assert_eq!(c.state(), TrackingState::Idle);
        assert_eq!(c.position(), e.position);
        assert_eq!(c.step_count(), 1);
        assert!(c.track().heading.window().is_empty());
        assert_eq!(c.track().accel.current(), Vector3::zeros());

        // Samples after stop are not processed
        assert!(c.feed_sample(&spike(0.0, 5.0)).unwrap().is_none());
        assert_eq!(c.step_count(), 1);
    }

    #[test]
    fn test_restart_reinitializes_session() {
        let mut c = controller();
        c.start_tracking(Some(ORIGIN)).unwrap();
        c.feed_sample(&spike(0.0, 1.0)).unwrap();
        assert_eq!(c.step_count(), 1);

        let fix = Coordinate::new(48.85, 2.35);
        c.start_tracking(Some(fix)).unwrap();
        assert_eq!(c.state(), TrackingState::Tracking);
        assert_eq!(c.step_count(), 0);
        assert_eq!(c.position(), fix);
        assert!(c.initial_heading().is_none());
        // Earlier timestamps are fine in a new session
        assert!(c.feed_sample(&spike(0.0, 0.1)).unwrap().is_some());
    }

    #[test]
    fn test_degenerate_latitude_rejects_step() {
        let mut c = controller();
        let fix = Coordinate::new(89.95, 0.0);
        c.start_tracking(Some(fix)).unwrap();
        let heading = c.current_heading_deg();
        assert!(matches!(
            c.feed_sample(&spike(90.0, 1.0)),
            Err(FusionError::NumericDegeneracy { .. })
        ));
        assert_eq!(c.position(), fix);
        assert!(c.position().is_finite());
        assert_eq!(c.step_count(), 0);
        assert!(c.track().last_step_timestamp().is_none());
        assert_eq!(c.current_heading_deg(), heading);

        // The rejected step opened no refractory window.
        assert!(matches!(
            c.feed_sample(&spike(90.0, 1.1)),
            Err(FusionError::NumericDegeneracy { .. })
        ));
        assert_eq!(c.step_count(), 0);
    }

    #[test]
    fn test_compass_ignored_while_idle() {
        let mut c = controller();
        let before = c.current_heading_deg();
        assert_eq!(c.observe_compass(CompassHeading::new(123.0, 10.0)), Ok(false));
        assert_eq!(c.current_heading_deg(), before);

        c.start_tracking(Some(ORIGIN)).unwrap();
        c.stop_tracking();
        assert_eq!(c.observe_compass(CompassHeading::new(123.0, 10.0)), Ok(false));
        assert_ne!(c.current_heading_deg(), 123.0);
    }

    #[test]
    fn test_compass_correction_feeds_next_step() {
        let mut c = controller();
        c.start_tracking(Some(ORIGIN)).unwrap();
        assert!(c.observe_compass(CompassHeading::new(180.0, 10.0)).unwrap());
        assert_eq!(c.current_heading_deg(), 180.0);

        let r = spike(180.0, 1.0).with_compass(180.0);
        let e = c.feed_sample(&r).unwrap().unwrap();
        assert_eq!(e.direction, Direction::South);
        assert!(e.position.latitude < 0.0);
    }

    #[test]
    fn test_initial_heading_latched_after_two_seconds() {
        let mut c = controller();
        c.start_tracking(Some(ORIGIN)).unwrap();
        for i in 0..30 {
            c.feed_sample(&still(45.0, 10.0 + i as f64 * 0.1)).unwrap();
        }
        assert_eq!(c.initial_heading(), Some(45.0));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = FusionConfig {
            window_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            FusionController::new(config),
            Err(FusionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(TrackingState::Idle.label(), "Idle");
        assert_eq!(TrackingState::Tracking.label(), "Tracking");
    }
}
