//! Step displacement on a spherical earth, and compass octants.
//!
//! Local tangent-plane approximation, valid for small per-step moves. The
//! longitude term divides by `cos(latitude)`, so steps are refused close to
//! the poles instead of propagating infinities.

use core::f64::consts::PI;

use crate::error::FusionError;
use crate::types::Coordinate;

/// Move `from` one step of `step_distance` metres along `heading_deg`
/// (0 = north, clockwise).
pub fn displace(
    from: Coordinate,
    heading_deg: f64,
    step_distance: f64,
    earth_radius: f64,
    max_abs_latitude_deg: f64,
) -> Result<Coordinate, FusionError> {
    if libm::fabs(from.latitude) > max_abs_latitude_deg {
        return Err(FusionError::NumericDegeneracy {
            latitude: from.latitude,
        });
    }

    let heading_rad = heading_deg * PI / 180.0;
    let delta_lat = (step_distance * libm::cos(heading_rad)) / earth_radius;
    let lat_rad = from.latitude * PI / 180.0;
    let delta_lon = (step_distance * libm::sin(heading_rad)) / (earth_radius * libm::cos(lat_rad));

    let next = Coordinate {
        latitude: from.latitude + delta_lat * (180.0 / PI),
        longitude: from.longitude + delta_lon * (180.0 / PI),
    };

    if !next.is_finite() {
        return Err(FusionError::NumericDegeneracy {
            latitude: from.latitude,
        });
    }
    Ok(next)
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Direction {
    North = 0,
    Northeast = 1,
    East = 2,
    Southeast = 3,
    South = 4,
    Southwest = 5,
    West = 6,
    Northwest = 7,
}

impl Direction {
    /// Octant for a heading in degrees. Any winding is accepted; the value is
    /// mapped to [-180, 180) and bucketed with half-open 45° ranges, so a
    /// boundary such as 22.5 belongs to the bucket above it.
    pub fn from_heading_deg(heading_deg: f64) -> Self {
        let signed = Self::to_signed(heading_deg);

        if (-22.5..22.5).contains(&signed) {
            Self::North
        } else if (22.5..67.5).contains(&signed) {
            Self::Northeast
        } else if (67.5..112.5).contains(&signed) {
            Self::East
        } else if (112.5..157.5).contains(&signed) {
            Self::Southeast
        } else if (157.5..180.0).contains(&signed) || (-180.0..-157.5).contains(&signed) {
            Self::South
        } else if (-157.5..-112.5).contains(&signed) {
            Self::Southwest
        } else if (-112.5..-67.5).contains(&signed) {
            Self::West
        } else if (-67.5..-22.5).contains(&signed) {
            Self::Northwest
        } else {
            // NaN
            Self::North
        }
    }

    fn to_signed(heading_deg: f64) -> f64 {
        let wrapped = crate::heading::normalize_heading(heading_deg);
        if wrapped >= 180.0 {
            wrapped - 360.0
        } else {
            wrapped
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::North => "North",
            Self::Northeast => "Northeast",
            Self::East => "East",
            Self::Southeast => "Southeast",
            Self::South => "South",
            Self::Southwest => "Southwest",
            Self::West => "West",
            Self::Northwest => "Northwest",
        }
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}
