use crate::displacement::Direction;

/// Triaxial acceleration, m/s² (gravity removed).
pub type Vector3 = nalgebra::Vector3<f64>;

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A planar geographic position in degrees.
///
/// Ranges are not enforced; caller-supplied fixes are trusted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// One motion sample as delivered by the sensor source.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorReading {
    /// User (gravity-removed) acceleration.
    pub accel: Vector3,
    /// Device attitude yaw in degrees, any winding.
    pub attitude_yaw_deg: f64,
    /// Latest compass true heading, if the compass has reported one.
    pub compass_heading_deg: Option<f64>,
    /// Monotonic timestamp in seconds.
    pub timestamp: f64,
}

impl SensorReading {
    pub fn new(accel: Vector3, attitude_yaw_deg: f64, timestamp: f64) -> Self {
        Self {
            accel,
            attitude_yaw_deg,
            compass_heading_deg: None,
            timestamp,
        }
    }

    /// Build a reading from an attitude yaw expressed in radians.
    pub fn from_attitude_radians(accel: Vector3, yaw_rad: f64, timestamp: f64) -> Self {
        Self::new(accel, yaw_rad.to_degrees(), timestamp)
    }

    pub fn with_compass(mut self, heading_deg: f64) -> Self {
        self.compass_heading_deg = Some(heading_deg);
        self
    }

    /// Rejects readings that would poison the filters.
    pub fn validate(&self) -> Result<(), crate::FusionError> {
        use crate::FusionError::InvalidSample;

        if !self.timestamp.is_finite() {
            return Err(InvalidSample("non-finite timestamp"));
        }
        if !(self.accel.x.is_finite() && self.accel.y.is_finite() && self.accel.z.is_finite()) {
            return Err(InvalidSample("non-finite acceleration"));
        }
        if !self.attitude_yaw_deg.is_finite() {
            return Err(InvalidSample("non-finite attitude heading"));
        }
        if let Some(h) = self.compass_heading_deg {
            if !h.is_finite() {
                return Err(InvalidSample("non-finite compass heading"));
            }
        }
        Ok(())
    }
}

/// Asynchronous compass callback payload.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompassHeading {
    pub true_heading_deg: f64,
    /// Negative or zero accuracy means the heading is not usable.
    pub accuracy_deg: f64,
}

impl CompassHeading {
    pub const fn new(true_heading_deg: f64, accuracy_deg: f64) -> Self {
        Self {
            true_heading_deg,
            accuracy_deg,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.accuracy_deg > 0.0
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// A detected footstep.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepEvent {
    pub timestamp: f64,
    pub heading_deg: f64,
    /// 1-based count of this step within the session.
    pub step_index: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostics {
    pub heading_deg: f64,
    pub step_count: u64,
    pub uncertainty: f64,
}

/// Emitted once per accepted step.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FusionEvent {
    pub timestamp: f64,
    pub position: Coordinate,
    pub direction: Direction,
    pub diagnostics: Diagnostics,
}
