use crate::types::Coordinate;

// ---------------------------------------------------------------------------
// CONFIGURATION
// ---------------------------------------------------------------------------
type Scalar = f64;

const INITIAL_UNCERTAINTY: Scalar = 1.0;

// ---------------------------------------------------------------------------
// STATE
// ---------------------------------------------------------------------------
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PositionFilterState {
    pub estimate: Coordinate,
    pub uncertainty: Scalar,
}

// ---------------------------------------------------------------------------
// MAIN FILTER
// ---------------------------------------------------------------------------

/// Scalar Bayesian smoother over position samples.
///
/// One uncertainty is shared by both axes and there is no velocity state:
/// each update blends the raw displaced position into the prior by
/// `gain = P' / (P' + r)` with `P' = P + q`.
#[derive(Clone, Copy, Debug)]
pub struct PositionFilter {
    state: Option<PositionFilterState>,
    process_noise: Scalar,
    measurement_noise: Scalar,
    last_gain: Option<Scalar>,
}

impl PositionFilter {
    pub fn new(process_noise: Scalar, measurement_noise: Scalar) -> Self {
        Self {
            state: None,
            process_noise,
            measurement_noise,
            last_gain: None,
        }
    }

    pub fn reset(&mut self, to: Coordinate) {
        self.state = Some(PositionFilterState {
            estimate: to,
            uncertainty: INITIAL_UNCERTAINTY,
        });
        self.last_gain = None;
    }

    /// Drop the prior; the next update adopts its input unchanged.
    pub fn clear(&mut self) {
        self.state = None;
        self.last_gain = None;
    }

    // =====================================================================
    // UPDATE
    // =====================================================================
    pub fn update(&mut self, raw: Coordinate) -> Coordinate {
        let prior = match self.state {
            Some(s) => s,
            None => {
                self.state = Some(PositionFilterState {
                    estimate: raw,
                    uncertainty: INITIAL_UNCERTAINTY,
                });
                return raw;
            }
        };

        // Predict: position is static, only the uncertainty grows.
        let predicted_uncertainty = prior.uncertainty + self.process_noise;

        // Correct
        let gain = predicted_uncertainty / (predicted_uncertainty + self.measurement_noise);
        let estimate = Coordinate {
            latitude: prior.estimate.latitude + gain * (raw.latitude - prior.estimate.latitude),
            longitude: prior.estimate.longitude + gain * (raw.longitude - prior.estimate.longitude),
        };
        let uncertainty = (1.0 - gain) * predicted_uncertainty;

        self.state = Some(PositionFilterState {
            estimate,
            uncertainty,
        });
        self.last_gain = Some(gain);
        estimate
    }

    // =====================================================================
    // ACCESSORS
    // =====================================================================
    pub fn state(&self) -> Option<PositionFilterState> {
        self.state
    }

    pub fn estimate(&self) -> Option<Coordinate> {
        self.state.map(|s| s.estimate)
    }

    /// Current uncertainty, or the reset prior when there is no estimate yet.
    pub fn uncertainty(&self) -> Scalar {
        self.state.map_or(INITIAL_UNCERTAINTY, |s| s.uncertainty)
    }

    pub fn last_gain(&self) -> Option<Scalar> {
        self.last_gain
    }

    /// Fixed point of the uncertainty recursion: the positive root of
    /// `P^2 + qP - qr = 0`.
    pub fn steady_state_uncertainty(&self) -> Scalar {
        let q = self.process_noise;
        let r = self.measurement_noise;
        (-q + libm::sqrt(q * q + 4.0 * q * r)) / 2.0
    }
}
