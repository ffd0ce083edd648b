//! Stride Simulation Library
//!
//! Provides scripted walk simulation, sensor modelling and a tracking
//! harness that drives `stride-core` through a sample channel.

pub mod error;
pub mod feed;
pub mod params;
pub mod sensor;
pub mod tracker;
pub mod walk;

// Re-export main types
pub use error::SimError;
pub use feed::{
    channel, spawn_replay, DrainSummary, FeedMessage, FeedReceiver, FusionObserver, SampleFeed,
    TrajectoryRecorder,
};
pub use params::*;
pub use sensor::{
    generate_sensor_data, load_sensor_log, save_sensor_log, SensorConfig, SensorData,
};
pub use tracker::{haversine_m, run_tracker, track_error, TrackError, TrackResult, TrackerConfig};
pub use walk::{simulate_walk, Leg, WalkParams, WalkResult};
