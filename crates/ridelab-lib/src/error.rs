//! Error types shared by every analysis in the engine.

use thiserror::Error;

/// Failure of a single analysis call.
///
/// None of these leave an estimator or detector in a corrupted state; the
/// caller may keep feeding samples and query again.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Fewer samples than the algorithm needs
    #[error("too few data points: need at least {required}, have {available}")]
    TooFewDataPoints { required: usize, available: usize },

    /// Input collapsed to a constant (zero fluctuation, no usable target, ...)
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// Paired sequences differ in length
    #[error("mismatched lengths: {left} vs {right}")]
    MismatchedLength { left: usize, right: usize },

    /// A required setting was not supplied by the caller
    #[error("missing configuration: {0} must be set")]
    MissingConfiguration(&'static str),

    /// Lap segmentation found no step change to split on
    #[error("no laps detected: no sustained step change in the signal")]
    NoSegmentsDetected,
}

/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

impl AnalysisError {
    pub(crate) fn too_few(required: usize, available: usize) -> Self {
        AnalysisError::TooFewDataPoints {
            required,
            available,
        }
    }

    /// True when feeding more samples may make the same call succeed.
    pub fn needs_more_data(&self) -> bool {
        matches!(self, AnalysisError::TooFewDataPoints { .. })
    }
}
