//! Signal smoothing: exponential low-pass for acceleration, moving average
//! for heading.

use crate::error::FusionError;
use crate::types::Vector3;

/// Upper bound on the heading window; the core does not allocate.
pub const MAX_HEADING_WINDOW: usize = 32;

// ---------------------------------------------------------------------------
// Acceleration
// ---------------------------------------------------------------------------

/// Exponential filter, each axis independently:
/// `new = alpha * sample + (1 - alpha) * prev`.
#[inline]
pub fn smooth_acceleration(prev: Vector3, sample: Vector3, alpha: f64) -> Vector3 {
    sample * alpha + prev * (1.0 - alpha)
}

/// Holds the previous filtered acceleration between samples.
#[derive(Debug, Clone, Copy)]
pub struct AccelSmoother {
    alpha: f64,
    prev: Vector3,
}

impl AccelSmoother {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            prev: Vector3::zeros(),
        }
    }

    pub fn filter(&mut self, sample: Vector3) -> Vector3 {
        self.prev = smooth_acceleration(self.prev, sample, self.alpha);
        self.prev
    }

    pub fn current(&self) -> Vector3 {
        self.prev
    }

    pub fn reset(&mut self) {
        self.prev = Vector3::zeros();
    }
}

// ---------------------------------------------------------------------------
// Heading
// ---------------------------------------------------------------------------

/// Bounded FIFO of heading samples returning their arithmetic mean.
///
/// The mean is not circular: 350° and 10° average to 180°. Callers keep
/// samples on a single winding.
#[derive(Debug, Clone, Copy)]
pub struct HeadingWindow {
    buf: [f64; MAX_HEADING_WINDOW],
    capacity: usize,
    head: usize,
    len: usize,
}

impl HeadingWindow {
    pub fn new(capacity: usize) -> Result<Self, FusionError> {
        if capacity == 0 || capacity > MAX_HEADING_WINDOW {
            return Err(FusionError::InvalidConfig("window_size must be in 1..=32"));
        }
        Ok(Self {
            buf: [0.0; MAX_HEADING_WINDOW],
            capacity,
            head: 0,
            len: 0,
        })
    }

    /// Append a sample, evicting the oldest on overflow, and return the mean.
    pub fn push(&mut self, sample: f64) -> Result<f64, FusionError> {
        if !sample.is_finite() {
            return Err(FusionError::InvalidSample("non-finite heading"));
        }
        self.buf[self.head] = sample;
        self.head = (self.head + 1) % self.capacity;
        if self.len < self.capacity {
            self.len += 1;
        }
        Ok(self.mean())
    }

    pub fn mean(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        // Until the ring wraps, the filled slots are 0..len.
        let sum: f64 = self.buf[..self.len].iter().sum();
        sum / self.len as f64
    }

    /// Mean direction of the window contents, in [0, 360).
    ///
    /// Unlike [`mean`](Self::mean) this is wrap-safe: 350° and 10° give 0°.
    pub fn circular_mean(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        let (mut s, mut c) = (0.0, 0.0);
        for &h in self.buf[..self.len].iter() {
            let rad = h.to_radians();
            s += libm::sin(rad);
            c += libm::cos(rad);
        }
        crate::heading::normalize_heading(libm::atan2(s, c).to_degrees())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Window contents from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let start = (self.head + self.capacity - self.len) % self.capacity;
        (0..self.len).map(move |i| self.buf[(start + i) % self.capacity])
    }

    pub fn reset(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}
