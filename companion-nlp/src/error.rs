//! Error types for companion-nlp
//!
//! Every request-level error maps onto one [`FailureKind`] so that it can be
//! sent back to the requester as an explicit failure reply.

use companion_common::{Failure, FailureKind};
use std::path::PathBuf;
use thiserror::Error;

/// Service error type
#[derive(Debug, Error)]
pub enum NlpError {
    /// Analyzer invoked incorrectly or broke its output contract
    #[error("Model error: {0}")]
    Model(String),

    /// A model resource could not be read or parsed at startup
    #[error("Failed to load {resource} model from {path}: {reason}")]
    ModelLoad {
        resource: &'static str,
        path: PathBuf,
        reason: String,
    },

    /// Span outside the token sequence it refers to
    #[error("Index error: {0}")]
    Index(String),

    /// Reference identifier or its message field is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request payload has the wrong shape or does not decode
    #[error("Codec error: {0}")]
    Codec(String),

    /// Reference store backend failure
    #[error("Store error: {0}")]
    Store(companion_common::Error),

    /// Bus or task infrastructure failure
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for companion-nlp operations
pub type NlpResult<T> = Result<T, NlpError>;

impl NlpError {
    /// Failure category reported to the requester
    pub fn kind(&self) -> FailureKind {
        match self {
            NlpError::Model(_) | NlpError::ModelLoad { .. } => FailureKind::Model,
            NlpError::Index(_) => FailureKind::Index,
            NlpError::NotFound(_) => FailureKind::NotFound,
            NlpError::Codec(_) => FailureKind::Codec,
            NlpError::Store(_) | NlpError::Internal(_) => FailureKind::Internal,
        }
    }
}

impl From<companion_common::Error> for NlpError {
    fn from(err: companion_common::Error) -> Self {
        use companion_common::Error;
        match err {
            Error::Codec(msg) => NlpError::Codec(msg),
            Error::Failed(failure) => NlpError::Internal(failure.to_string()),
            err @ (Error::Config(_)
            | Error::NoHandler(_)
            | Error::AddressInUse(_)
            | Error::ReplyDropped(_)
            | Error::Internal(_)) => NlpError::Internal(err.to_string()),
            // I/O, and the database when companion-common is built with sqlx
            storage => NlpError::Store(storage),
        }
    }
}

impl From<&NlpError> for Failure {
    fn from(err: &NlpError) -> Self {
        Failure::new(err.kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(NlpError::Model("x".into()).kind(), FailureKind::Model);
        assert_eq!(NlpError::Index("x".into()).kind(), FailureKind::Index);
        assert_eq!(NlpError::NotFound("x".into()).kind(), FailureKind::NotFound);
        assert_eq!(NlpError::Codec("x".into()).kind(), FailureKind::Codec);
        assert_eq!(NlpError::Internal("x".into()).kind(), FailureKind::Internal);
    }

    #[test]
    fn test_common_codec_error_stays_codec() {
        let err: NlpError = companion_common::Error::Codec("bad frame".into()).into();
        assert!(matches!(err, NlpError::Codec(ref msg) if msg == "bad frame"));
        assert_eq!(Failure::from(&err).kind, FailureKind::Codec);
    }

    #[test]
    fn test_io_error_is_store_error() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err: NlpError = companion_common::Error::Io(io).into();
        assert_eq!(err.kind(), FailureKind::Internal);
        assert!(matches!(err, NlpError::Store(_)));
    }

    #[test]
    fn test_bus_errors_are_internal() {
        let err: NlpError = companion_common::Error::AddressInUse("nlp.tokens".into()).into();
        assert!(matches!(err, NlpError::Internal(ref msg) if msg.contains("nlp.tokens")));

        let err: NlpError = companion_common::Error::Config("bad".into()).into();
        assert!(matches!(err, NlpError::Internal(_)));
    }
}
