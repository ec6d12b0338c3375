//! Error handling for ara-bridge
//!
//! Only construction and configuration can fail with an error. Reads never do:
//! a reader that cannot serve a request fills silence and returns `false`.

use thiserror::Error;

use crate::model::ObjectId;

/// Result type alias for ara-bridge operations
pub type Result<T> = std::result::Result<T, AraError>;

/// Main error type for ara-bridge operations
#[derive(Error, Debug)]
pub enum AraError {
    // Reader Construction Errors
    #[error("Cannot build a reader over an empty set of playback regions")]
    EmptyRegionSet,

    #[error("Playback region {region} uses {found} Hz, reader runs at {expected} Hz")]
    SampleRateMismatch {
        expected: f64,
        found: f64,
        region: ObjectId,
    },

    #[error("Invalid sample rate: {rate} Hz")]
    InvalidSampleRate { rate: f64 },

    #[error("Sample access is disabled for audio source {source_id}")]
    SampleAccessDisabled { source_id: ObjectId },

    // Document Errors
    #[error("{kind} not found: {id}")]
    ObjectNotFound { kind: &'static str, id: ObjectId },

    #[error("{kind} has already been destroyed")]
    ObjectDestroyed { kind: &'static str },

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

impl AraError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            AraError::EmptyRegionSet => "EMPTY_REGION_SET",
            AraError::SampleRateMismatch { .. } => "SAMPLE_RATE_MISMATCH",
            AraError::InvalidSampleRate { .. } => "INVALID_SAMPLE_RATE",
            AraError::SampleAccessDisabled { .. } => "SAMPLE_ACCESS_DISABLED",
            AraError::ObjectNotFound { .. } => "OBJECT_NOT_FOUND",
            AraError::ObjectDestroyed { .. } => "OBJECT_DESTROYED",
            AraError::InvalidConfig { .. } => "INVALID_CONFIG",
            AraError::Io(_) => "IO_ERROR",
            AraError::Serialization(_) => "SERIALIZATION_ERROR",
            AraError::Wav(_) => "WAV_ERROR",
        }
    }

    /// Check if retrying later (after the document changes) can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AraError::SampleAccessDisabled { .. }
                | AraError::SampleRateMismatch { .. }
                | AraError::EmptyRegionSet
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AraError::EmptyRegionSet.error_code(), "EMPTY_REGION_SET");
        let err = AraError::InvalidConfig {
            reason: "max_block_size must be > 0".to_string(),
        };
        assert_eq!(err.error_code(), "INVALID_CONFIG");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_access_disabled_is_recoverable() {
        let err = AraError::SampleAccessDisabled {
            source_id: ObjectId::new(),
        };
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("Sample access is disabled"));
    }
}
