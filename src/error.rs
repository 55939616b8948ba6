use thiserror::Error;

/// Recoverable failures of the analytics pipeline.
///
/// Every pipeline call returns one of these instead of panicking; the
/// dashboard shows the message and withholds only the affected card.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("sample {sample}: expected {expected} bands, got {actual}")]
    SchemaMismatch {
        expected: usize,
        actual: usize,
        sample: usize,
    },

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("dimension mismatch: expected a vector of length {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("sample set is empty")]
    EmptySampleSet,

    #[error("invalid curve: {0}")]
    InvalidCurve(String),

    #[error("band {band} ({center_nm} nm) lies outside the measured wavelength range")]
    BandOutOfRange { band: usize, center_nm: f64 },

    #[error("invalid band schema: {0}")]
    InvalidSchema(String),

    #[error("sample {sample}, band {band}: reflectance {value} outside 0..=100")]
    ReflectanceOutOfRange {
        sample: usize,
        band: usize,
        value: f64,
    },

    #[error("need at least {needed} samples, got {actual}")]
    InsufficientSamples { needed: usize, actual: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unknown {kind} label '{value}'")]
    UnknownLabel { kind: &'static str, value: String },
}
