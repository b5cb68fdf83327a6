use thiserror::Error;

/// Failures while loading or validating a serialized model set.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to read model set: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode model set: {0}")]
    Decode(String),

    #[error("Failed to encode model set: {0}")]
    Encode(String),

    #[error("Unsupported model set version: {0}")]
    UnsupportedVersion(u32),

    #[error("Model set contains no models")]
    Empty,

    #[error("Model {model}: {reason}")]
    DimensionMismatch { model: String, reason: String },

    #[error("Model {model}: state {state} out of range (num states = {num_states})")]
    StateOutOfRange {
        model: String,
        state: usize,
        num_states: usize,
    },

    #[error("Invalid density parameters: {0}")]
    InvalidDensity(String),
}

/// Reasons the feature binner could not produce a matrix.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BinningError {
    #[error("No light samples in window")]
    EmptyLight,

    #[error("Window width must be positive, got {0} minutes")]
    NonPositiveWindowWidth(i32),

    #[error("Window [{start}, {end}) holds no complete bin")]
    EmptyWindow { start: i64, end: i64 },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("{field} required for {kind} event")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimezoneError {
    #[error("Unknown timezone: {0}")]
    UnknownZone(String),
}
