//! # Stride Core
//!
//! Pedestrian dead-reckoning fusion core. Everything here is pure
//! computation over in-memory state and runs in `no_std` environments:
//! - Signal smoothing (acceleration low-pass, heading moving average)
//! - Step detection with a refractory period
//! - Heading estimation from attitude yaw and compass
//! - Spherical-earth step displacement and compass octants
//! - Scalar recursive position filter
//! - Tracking controller that sequences all of the above per sample
//!
//! # Features
//! - `std` (default): standard library support for dependencies and tests
//! - `serde`: `Serialize`/`Deserialize` on configuration and data types

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod config;
pub mod controller;
pub mod displacement;
pub mod error;
pub mod heading;
pub mod position_filter;
pub mod smoother;
pub mod step_detector;
pub mod types;

// Re-export core types
pub use config::FusionConfig;
pub use controller::{FusionController, TrackState, TrackingState};
pub use displacement::{displace, Direction};
pub use error::FusionError;
pub use heading::{normalize_heading, HeadingEstimator};
pub use position_filter::{PositionFilter, PositionFilterState};
pub use smoother::{smooth_acceleration, AccelSmoother, HeadingWindow};
pub use step_detector::StepDetector;
pub use types::{
    CompassHeading, Coordinate, Diagnostics, FusionEvent, SensorReading, StepEvent, Vector3,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
