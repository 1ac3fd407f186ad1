//! Error Types
//!
//! Every fallible operation in the crate returns [`Result<T>`], whose error
//! side is [`ModelError`]. Bounds and shape errors indicate a programming or
//! configuration mistake and are never retried. Numerical instability aborts
//! the current forward pass instead of being papered over.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("position {position} out of range (max sequence length {max_len})")]
    PositionOutOfRange { position: usize, max_len: usize },

    #[error("non-finite value detected {stage}")]
    UnstableComputation { stage: String },

    #[error("corrupt vocabulary at line {line}: {reason}")]
    CorruptVocabulary { line: usize, reason: String },

    #[error("unknown token id: {0}")]
    UnknownTokenId(usize),

    #[error("resource unavailable: {path}: {source}")]
    ResourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ModelError {
    pub(crate) fn dims(expected: impl ToString, got: impl ToString) -> Self {
        Self::DimensionMismatch {
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }

    pub(crate) fn unstable(stage: impl Into<String>) -> Self {
        Self::UnstableComputation {
            stage: stage.into(),
        }
    }

    pub(crate) fn resource(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::ResourceUnavailable {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = ModelError::IndexOutOfRange { index: 7, len: 3 };
        assert_eq!(e.to_string(), "index 7 out of range (len 3)");

        let e = ModelError::dims("[2, 3]", "[4, 3]");
        assert_eq!(e.to_string(), "dimension mismatch: expected [2, 3], got [4, 3]");

        let e = ModelError::PositionOutOfRange {
            position: 640,
            max_len: 640,
        };
        assert_eq!(
            e.to_string(),
            "position 640 out of range (max sequence length 640)"
        );

        let e = ModelError::unstable("after self-attention");
        assert_eq!(e.to_string(), "non-finite value detected after self-attention");
    }

    #[test]
    fn test_resource_error_keeps_source() {
        use std::error::Error;

        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let e = ModelError::resource("dados/dataset.txt", io_err);
        assert!(e.to_string().starts_with("resource unavailable: dados/dataset.txt"));
        assert!(e.source().is_some());
    }
}
