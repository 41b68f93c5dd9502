use thiserror::Error;

use super::segment::SegmentId;
use super::time::Timestamp;

#[derive(Error, Debug)]
pub enum ShuffleError {
    #[error("Invalid interval #{index}: {reason}")]
    InvalidIntervals { index: usize, reason: String },

    #[error("Invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("Continue chance must be strictly between 0 and 1, got {0}")]
    InvalidContinueChance(f64),

    #[error("Failed to extract segment {}: {message}", .id.token())]
    SegmentExtractionFailure { id: SegmentId, message: String },

    #[error(
        "Ran out of shuffled dialogue while filling interval #{interval_index} \
         ({missing}s still missing)"
    )]
    PermutationExhausted {
        interval_index: usize,
        missing: Timestamp,
    },

    #[error("Failed to compose the shuffled timeline: {0}")]
    ComposeFailure(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParseError(#[from] serde_json::Error),
}

impl ShuffleError {
    /// Whether re-running the same step can succeed without changing inputs.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ShuffleError::SegmentExtractionFailure { .. })
    }
}
