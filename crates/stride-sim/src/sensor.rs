use crate::error::SimError;
use crate::walk::WalkResult;
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::path::Path;
use stride_core::{normalize_heading, CompassHeading, SensorReading};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub noise_scale: f64,
    pub accel_noise_std: f64,       // m/s^2
    pub yaw_noise_std_deg: f64,     // degrees
    pub compass_interval_s: f64,    // time between compass fixes
    pub compass_noise_std_deg: f64, // degrees
    pub compass_accuracy_deg: f64,  // reported accuracy; <= 0 marks fixes invalid
    pub compass_dropout: f64,       // probability a fix is lost
    pub seed: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            noise_scale: 1.0,
            accel_noise_std: 0.02,
            yaw_noise_std_deg: 2.0,
            compass_interval_s: 1.0,
            compass_noise_std_deg: 5.0,
            compass_accuracy_deg: 10.0,
            compass_dropout: 0.0,
            seed: 42,
        }
    }
}

impl SensorConfig {
    /// `Normal::new` accepts any finite std-dev, so the sign is checked here.
    pub fn validate(&self) -> Result<(), SimError> {
        let scales = [
            ("noise_scale", self.noise_scale),
            ("accel_noise_std", self.accel_noise_std),
            ("yaw_noise_std_deg", self.yaw_noise_std_deg),
            ("compass_noise_std_deg", self.compass_noise_std_deg),
        ];
        for (name, value) in scales {
            if !value.is_finite() || value < 0.0 {
                return Err(SimError::InvalidSensorConfig(format!(
                    "{name} {value} must be finite and non-negative"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.compass_dropout) {
            return Err(SimError::InvalidSensorConfig(format!(
                "compass_dropout {} outside [0, 1]",
                self.compass_dropout
            )));
        }
        if !(self.compass_interval_s > 0.0) {
            return Err(SimError::InvalidSensorConfig(
                "compass_interval_s must be positive".into(),
            ));
        }
        Ok(())
    }

    fn normal(&self, std: f64, name: &str) -> Result<Normal<f64>, SimError> {
        Normal::new(0.0, self.noise_scale * std)
            .map_err(|e| SimError::InvalidSensorConfig(format!("{name}: {e}")))
    }
}

/// Motion samples plus the compass fixes delivered through the callback path.
#[derive(Debug, Clone, Default)]
pub struct SensorData {
    pub readings: Vec<SensorReading>,
    pub compass: Vec<(f64, CompassHeading)>,
}

impl SensorData {
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// Corrupt the walk's ground truth with seeded Gaussian noise.
///
/// A compass fix is reported every `compass_interval_s`. It rides on the
/// first motion sample at or after its time and is also listed in
/// `SensorData::compass` for callers that deliver it out of band.
pub fn generate_sensor_data(walk: &WalkResult, cfg: &SensorConfig) -> Result<SensorData, SimError> {
    cfg.validate()?;

    let mut rng = StdRng::seed_from_u64(cfg.seed);

    let d_accel = cfg.normal(cfg.accel_noise_std, "accel_noise_std")?;
    let d_yaw = cfg.normal(cfg.yaw_noise_std_deg, "yaw_noise_std_deg")?;
    let d_compass = cfg.normal(cfg.compass_noise_std_deg, "compass_noise_std_deg")?;

    let n = walk.len();
    let mut data = SensorData {
        readings: Vec::with_capacity(n),
        compass: Vec::new(),
    };
    let mut next_fix = 0.0;

    for i in 0..n {
        let t = walk.time[i];
        let truth_accel = walk.user_accel[i];
        let accel = Vector3::new(
            truth_accel.x + d_accel.sample(&mut rng),
            truth_accel.y + d_accel.sample(&mut rng),
            truth_accel.z + d_accel.sample(&mut rng),
        );
        let yaw = walk.heading_deg[i] + d_yaw.sample(&mut rng);
        let mut reading = SensorReading::new(accel, yaw, t);

        if t >= next_fix {
            next_fix += cfg.compass_interval_s;
            if !rng.gen_bool(cfg.compass_dropout) {
                let heading = normalize_heading(walk.heading_deg[i] + d_compass.sample(&mut rng));
                let fix = CompassHeading::new(heading, cfg.compass_accuracy_deg);
                data.compass.push((t, fix));
                if fix.is_valid() {
                    reading = reading.with_compass(heading);
                }
            }
        }

        data.readings.push(reading);
    }

    tracing::debug!(
        samples = data.readings.len(),
        compass_fixes = data.compass.len(),
        seed = cfg.seed,
        "sensor data generated"
    );
    Ok(data)
}

// ---------------------------------------------------------------------------
// Recorded logs
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct LogRow {
    timestamp: f64,
    accel_x: f64,
    accel_y: f64,
    accel_z: f64,
    yaw_deg: f64,
    compass_deg: Option<f64>,
}

/// Read a sensor log with columns
/// `timestamp,accel_x,accel_y,accel_z,yaw_deg,compass_deg`.
/// `compass_deg` may be empty.
pub fn load_sensor_log(path: impl AsRef<Path>) -> Result<SensorData, SimError> {
    let mut rdr = csv::Reader::from_path(path.as_ref())?;
    let mut data = SensorData::default();
    for row in rdr.deserialize() {
        let row: LogRow = row?;
        let mut reading = SensorReading::new(
            Vector3::new(row.accel_x, row.accel_y, row.accel_z),
            row.yaw_deg,
            row.timestamp,
        );
        if let Some(c) = row.compass_deg {
            reading = reading.with_compass(c);
        }
        data.readings.push(reading);
    }
    tracing::info!(
        path = %path.as_ref().display(),
        samples = data.readings.len(),
        "sensor log loaded"
    );
    Ok(data)
}

/// Write readings in the format `load_sensor_log` reads.
pub fn save_sensor_log(path: impl AsRef<Path>, data: &SensorData) -> Result<(), SimError> {
    let mut wtr = csv::Writer::from_path(path.as_ref())?;
    for r in &data.readings {
        wtr.serialize(LogRow {
            timestamp: r.timestamp,
            accel_x: r.accel.x,
            accel_y: r.accel.y,
            accel_z: r.accel.z,
            yaw_deg: r.attitude_yaw_deg,
            compass_deg: r.compass_heading_deg,
        })?;
    }
    wtr.flush()?;
    Ok(())
}
