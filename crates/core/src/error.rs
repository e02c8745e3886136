//! Error types for voxmeta

use thiserror::Error;

/// Main error type for voxmeta operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Index out of bounds: {index} in array of {len} elements")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Unsupported number of dimensions: {0}")]
    UnsupportedDimensions(usize),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Empty input: {field} cannot be empty")]
    EmptyInput { field: &'static str },

    // Data model construction errors
    #[error("Group [label:{label}] needs observations or (mean, std, count)")]
    MissingGroupInput { label: String },

    #[error("Group [label:{label}] has no raw observations")]
    MissingObservations { label: String },

    #[error("Two groups in [center:{center}] share [label:{label}]; check or merge them")]
    DuplicateLabel { center: String, label: String },

    #[error("Couldn't find [label:{label}] group in [center:{center}]")]
    LabelNotFound { center: String, label: String },

    #[error("Unknown meta-analysis model: {0} (expected fixed or random)")]
    UnknownModel(String),

    #[error("Unknown effect size method: {0} (expected cohen_d or hedge_g)")]
    UnknownMethod(String),

    // Numeric degeneracies
    #[error("Insufficient samples: counts {count1} and {count2} (each group needs at least 2)")]
    InsufficientSamples { count1: usize, count2: usize },

    #[error("No studies to pool")]
    NoStudies,

    #[error("Study {index} has non-positive variance {value}")]
    NonPositiveVariance { index: usize, value: f64 },

    #[error("Study {index} has a non-finite effect size")]
    NonFiniteEffectSize { index: usize },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error describes a numeric degeneracy at a single location
    /// rather than a malformed input.
    pub fn is_degenerate(&self) -> bool {
        matches!(
            self,
            Error::InsufficientSamples { .. }
                | Error::NoStudies
                | Error::NonPositiveVariance { .. }
                | Error::NonFiniteEffectSize { .. }
        )
    }
}

/// Result type alias for voxmeta operations
pub type Result<T> = std::result::Result<T, Error>;
