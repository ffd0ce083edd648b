use crate::error::SimError;
use crate::feed::{channel, spawn_replay, DrainSummary, FeedMessage, TrajectoryRecorder};
use crate::sensor::SensorData;
use crate::walk::WalkResult;
use serde::{Deserialize, Serialize};
use stride_core::config::EARTH_RADIUS_M;
use stride_core::{Coordinate, FusionConfig, FusionController, FusionError, FusionEvent};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub fusion: FusionConfig,
    pub initial_fix: Coordinate,
    /// Bound of the sample channel between the replay thread and the tracker.
    pub channel_capacity: usize,
    /// Also deliver compass fixes through the corrective callback.
    pub compass_callbacks: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            fusion: FusionConfig::default(),
            initial_fix: Coordinate::new(37.3349, -122.0090),
            channel_capacity: 64,
            compass_callbacks: false,
        }
    }
}

impl TrackerConfig {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "fusion": self.fusion,
            "initial_fix": self.initial_fix,
            "channel_capacity": self.channel_capacity,
            "compass_callbacks": self.compass_callbacks,
        })
    }

    pub fn get_param(&self, param_name: &str) -> Result<f64, SimError> {
        let f = &self.fusion;
        Ok(match param_name {
            "alpha" => f.alpha,
            "window_size" => f.window_size as f64,
            "step_detection_threshold" => f.step_detection_threshold,
            "refractory_period_sec" => f.refractory_period_sec,
            "step_distance_meters" => f.step_distance_meters,
            "process_noise" => f.process_noise,
            "measurement_noise" => f.measurement_noise,
            _ => return Err(SimError::UnknownParam(param_name.to_string())),
        })
    }

    pub fn set_param(&mut self, param_name: &str, value: f64) -> Result<(), SimError> {
        let f = &mut self.fusion;
        match param_name {
            "alpha" => f.alpha = value,
            "window_size" => f.window_size = value.round().max(0.0) as usize,
            "step_detection_threshold" => f.step_detection_threshold = value,
            "refractory_period_sec" => f.refractory_period_sec = value,
            "step_distance_meters" => f.step_distance_meters = value,
            "process_noise" => f.process_noise = value,
            "measurement_noise" => f.measurement_noise = value,
            _ => return Err(SimError::UnknownParam(param_name.to_string())),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tracking run
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TrackResult {
    pub initial_fix: Coordinate,
    pub events: Vec<FusionEvent>,
    pub rejected: Vec<(FeedMessage, FusionError)>,
    pub summary: DrainSummary,
    pub final_position: Coordinate,
    pub step_count: u64,
    pub initial_heading: Option<f64>,
}

/// Replay `data` through a feed into a fresh controller.
///
/// Samples come from a producer thread, as they would from a device
/// driver; the calling thread owns the controller.
pub fn run_tracker(data: &SensorData, cfg: &TrackerConfig) -> Result<TrackResult, SimError> {
    if !cfg.initial_fix.is_finite() {
        return Err(FusionError::NoFixAvailable.into());
    }
    let mut controller = FusionController::new(cfg.fusion)?;

    let mut messages = Vec::with_capacity(data.readings.len() + data.compass.len() + 2);
    messages.push(FeedMessage::Start(Some(cfg.initial_fix)));
    let mut fixes = data.compass.iter().peekable();
    for reading in &data.readings {
        messages.push(FeedMessage::Sample(*reading));
        if cfg.compass_callbacks {
            while let Some((_, fix)) = fixes.next_if(|(t, _)| *t <= reading.timestamp) {
                messages.push(FeedMessage::Compass(*fix));
            }
        }
    }
    messages.push(FeedMessage::Stop);

    let (feed, rx) = channel(cfg.channel_capacity);
    let producer = spawn_replay(feed, messages);

    let mut recorder = TrajectoryRecorder::default();
    let summary = rx.drain_into(&mut controller, &mut recorder);
    producer.join().map_err(|_| SimError::SourcePanicked)??;

    tracing::info!(
        samples = summary.samples,
        steps = controller.step_count(),
        rejected = summary.rejected,
        "tracking run complete"
    );

    Ok(TrackResult {
        initial_fix: cfg.initial_fix,
        events: recorder.events,
        rejected: recorder.rejected,
        summary,
        final_position: controller.position(),
        step_count: controller.step_count(),
        initial_heading: controller.initial_heading(),
    })
}

// ---------------------------------------------------------------------------
// Error against ground truth
// ---------------------------------------------------------------------------

/// Great-circle distance in metres.
pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackError {
    pub final_error_m: f64,
    /// RMS over step events, each compared with truth at its timestamp.
    pub rms_error_m: f64,
    pub true_steps: usize,
    pub detected_steps: u64,
}

pub fn track_error(walk: &WalkResult, result: &TrackResult) -> TrackError {
    let final_error_m = walk
        .final_truth()
        .map(|truth| haversine_m(truth, result.final_position))
        .unwrap_or(0.0);

    let sq: Vec<f64> = result
        .events
        .iter()
        .filter_map(|e| {
            walk.truth_at(e.timestamp)
                .map(|t| haversine_m(t, e.position).powi(2))
        })
        .collect();
    let rms_error_m = if sq.is_empty() {
        0.0
    } else {
        (sq.iter().sum::<f64>() / sq.len() as f64).sqrt()
    };

    TrackError {
        final_error_m,
        rms_error_m,
        true_steps: walk.step_times.len(),
        detected_steps: result.step_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{generate_sensor_data, SensorConfig};
    use crate::walk::{simulate_walk, Leg, WalkParams};
    use stride_core::Direction;

    fn east_walk() -> WalkResult {
        simulate_walk(&WalkParams {
            start: Coordinate::new(0.0, 0.0),
            legs: vec![Leg::new(10.0, 90.0)],
            ..Default::default()
        })
        .unwrap()
    }

    fn origin_config() -> TrackerConfig {
        TrackerConfig {
            initial_fix: Coordinate::new(0.0, 0.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_clean_walk_heads_east() {
        let walk = east_walk();
        let data = generate_sensor_data(
            &walk,
            &SensorConfig {
                noise_scale: 0.0,
                ..Default::default()
            },
        )
        .unwrap();
        let res = run_tracker(&data, &origin_config()).unwrap();

        assert!(res.step_count > 0);
        assert_eq!(res.events.len() as u64, res.step_count);
        assert!(res.rejected.is_empty());
        assert!(res.events.iter().all(|e| e.direction == Direction::East));
        assert!(res.final_position.longitude > 0.0);
        assert!(res.final_position.latitude.abs() < 1e-9);
        assert_eq!(res.initial_heading, Some(90.0));
        assert_eq!(res.summary.samples, data.len() as u64);

        // Events arrive in time order with a growing step count.
        for w in res.events.windows(2) {
            assert!(w[1].timestamp > w[0].timestamp);
            assert_eq!(w[1].diagnostics.step_count, w[0].diagnostics.step_count + 1);
        }
    }

    #[test]
    fn test_noisy_walk_is_deterministic() {
        let walk = east_walk();
        let data = generate_sensor_data(&walk, &SensorConfig::default()).unwrap();
        let a = run_tracker(&data, &origin_config()).unwrap();
        let b = run_tracker(&data, &origin_config()).unwrap();
        assert_eq!(a.events, b.events);
        assert_eq!(a.final_position, b.final_position);
    }

    #[test]
    fn test_track_error_against_truth() {
        let walk = east_walk();
        let data = generate_sensor_data(&walk, &SensorConfig::default()).unwrap();
        let res = run_tracker(&data, &origin_config()).unwrap();
        let err = track_error(&walk, &res);

        assert_eq!(err.true_steps, walk.step_times.len());
        assert_eq!(err.detected_steps, res.step_count);
        assert!(err.final_error_m.is_finite() && err.final_error_m >= 0.0);
        assert!(err.rms_error_m.is_finite() && err.rms_error_m >= 0.0);
        // Never further off than the whole walk plus every detected stride.
        let bound = walk.step_times.len() as f64 * 0.65 + res.step_count as f64 * 0.65;
        assert!(err.final_error_m <= bound);
    }

    #[test]
    fn test_compass_callbacks_delivered() {
        let walk = east_walk();
        let data = generate_sensor_data(&walk, &SensorConfig::default()).unwrap();
        let cfg = TrackerConfig {
            compass_callbacks: true,
            ..origin_config()
        };
        let res = run_tracker(&data, &cfg).unwrap();
        assert_eq!(res.summary.compass_applied, data.compass.len() as u64);
        assert_eq!(
            res.summary.messages,
            (data.len() + data.compass.len() + 2) as u64
        );
    }

    #[test]
    fn test_run_tracker_rejects_bad_setup() {
        let data = SensorData::default();
        let no_fix = TrackerConfig {
            initial_fix: Coordinate::new(f64::NAN, 0.0),
            ..Default::default()
        };
        assert!(matches!(
            run_tracker(&data, &no_fix),
            Err(SimError::Fusion(FusionError::NoFixAvailable))
        ));

        let mut bad = TrackerConfig::default();
        bad.set_param("window_size", 0.0).unwrap();
        assert!(matches!(
            run_tracker(&data, &bad),
            Err(SimError::Fusion(FusionError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn test_params_by_name() {
        let mut cfg = TrackerConfig::default();
        for name in crate::params::param_names() {
            assert!(cfg.get_param(name).is_ok(), "{name}");
        }
        cfg.set_param("window_size", 7.4).unwrap();
        assert_eq!(cfg.fusion.window_size, 7);
        cfg.set_param("refractory_period_sec", 0.4).unwrap();
        assert_eq!(cfg.get_param("refractory_period_sec").unwrap(), 0.4);
        assert!(matches!(
            cfg.set_param("thrust", 1.0),
            Err(SimError::UnknownParam(_))
        ));
        assert!(cfg.get_param("thrust").is_err());
    }

    #[test]
    fn test_to_json_round_trip() {
        let cfg = TrackerConfig::default();
        let json = cfg.to_json();
        assert_eq!(json["fusion"]["window_size"], 5);
        assert_eq!(json["channel_capacity"], 64);
        let back: TrackerConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn test_haversine() {
        let d = haversine_m(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 0.0));
        assert!((d - 111_194.9).abs() < 1.0);
        assert_eq!(haversine_m(Coordinate::new(10.0, 20.0), Coordinate::new(10.0, 20.0)), 0.0);
    }
}
