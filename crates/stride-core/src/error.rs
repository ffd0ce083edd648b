/// Failures surfaced by the fusion core.
///
/// None of these are fatal: a rejected sample produces no event and the
/// session continues. Only `NoFixAvailable` prevents a session from starting.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum FusionError {
    #[error("no initial position fix available")]
    NoFixAvailable,

    #[error("invalid sample: {0}")]
    InvalidSample(&'static str),

    #[error("numeric degeneracy at latitude {latitude}")]
    NumericDegeneracy { latitude: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}
