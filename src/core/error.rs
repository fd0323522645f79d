//! Error types shared by every stage of the controller.

use thiserror::Error;

/// Errors raised while building, training, or relaxing the network.
#[derive(Error, Debug)]
pub enum HopfieldError {
    /// The angular term of the pattern generator is undefined for this unit.
    #[error("degenerate geometry at unit ({row}, {col}): angular term undefined")]
    GeometryDegenerate { row: usize, col: usize },

    /// A value does not fit in the magnitude bits of the configured width.
    #[error("cannot encode {value} within ±{max_magnitude}")]
    EncodeOverflow { value: f64, max_magnitude: i64 },

    /// Library, state, weight or speed dimensions disagree.
    #[error("pattern size mismatch: expected {expected}, got {actual}")]
    PatternSizeMismatch { expected: usize, actual: usize },

    /// A pattern value outside {-1, +1}.
    #[error("non-bipolar value {value} at index {index}")]
    NotBipolar { index: usize, value: i8 },

    /// Training or recall attempted with no stored patterns.
    #[error("pattern library is empty")]
    EmptyLibrary,

    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// Configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HopfieldError>;
