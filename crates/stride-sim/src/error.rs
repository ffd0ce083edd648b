use stride_core::FusionError;

/// Errors that can occur while simulating or replaying a walk.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("fusion error: {0}")]
    Fusion(#[from] FusionError),

    #[error("unknown parameter: {0}")]
    UnknownParam(String),

    #[error("{name} = {value} outside [{min}, {max}]")]
    ParamOutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("invalid walk: {0}")]
    InvalidWalk(&'static str),

    #[error("invalid sensor config: {0}")]
    InvalidSensorConfig(String),

    #[error("sample feed closed by receiver")]
    FeedClosed,

    #[error("sensor source thread panicked")]
    SourcePanicked,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
