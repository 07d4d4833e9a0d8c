//! Error handling for the aggregation protocol
//!
//! Every failure category of the protocol has its own variant so that the
//! command-line front ends can report a distinct exit status per category.

use thiserror::Error;

/// Protocol error
#[derive(Debug, Error)]
pub enum FedError {
    /// Invalid or missing context / key material
    #[error("configuration error: {0}")]
    Config(String),

    /// Weight vector of the wrong shape or with non-finite entries
    #[error("schema error: {0}")]
    Schema(String),

    /// Operation across incompatible context or key fingerprints
    #[error("context mismatch: {0}")]
    ContextMismatch(String),

    /// Aggregation requested over zero ciphertexts
    #[error("no ciphertexts to aggregate")]
    EmptyInput,

    /// Weighted aggregation with an input that carries no sample count
    #[error("missing sample count for input {index}")]
    MissingWeight { index: usize },

    /// Weighted aggregation with a non-positive or non-finite count, or
    /// counts whose total overflows
    #[error("invalid sample count {count} for input {index}")]
    InvalidWeight { index: usize, count: f64 },

    /// Unrecognised aggregation mode literal
    #[error("invalid aggregation mode {0:?} (expected \"simple\" or \"weighted\")")]
    InvalidMode(String),

    /// Not enough multiplicative levels left for a constant multiplication
    #[error("noise budget exhausted: {0}")]
    NoiseBudgetExhausted(String),

    /// Decoded plaintext is malformed
    #[error("decode error: {0}")]
    Decode(String),

    /// Persistence failure
    #[error("i/o error: {0}")]
    Io(String),

    /// Not every intended participant delivered before the join deadline
    #[error("incomplete participant set: {received} of {expected} ciphertexts available")]
    IncompleteParticipantSet { expected: usize, received: usize },

    /// Round operation invoked out of order
    #[error("invalid stage: expected {expected}, round is at {actual}")]
    InvalidStage {
        expected: &'static str,
        actual: &'static str,
    },
}

impl FedError {
    /// Process exit status reported by the command-line tools.
    pub fn exit_code(&self) -> u8 {
        match self {
            FedError::Config(_) => 10,
            FedError::Schema(_) => 11,
            FedError::ContextMismatch(_) => 12,
            FedError::EmptyInput => 13,
            FedError::MissingWeight { .. } => 14,
            FedError::InvalidWeight { .. } => 15,
            FedError::InvalidMode(_) => 16,
            FedError::NoiseBudgetExhausted(_) => 17,
            FedError::Decode(_) => 18,
            FedError::Io(_) => 19,
            FedError::IncompleteParticipantSet { .. } => 20,
            FedError::InvalidStage { .. } => 21,
        }
    }
}

impl From<std::io::Error> for FedError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<bincode::Error> for FedError {
    fn from(err: bincode::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for FedError {
    fn from(err: serde_json::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<csv::Error> for FedError {
    fn from(err: csv::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, FedError>;

/// Create a `FedError` variant with format string support
macro_rules! fed_err {
    ($kind:ident, $($arg:tt)*) => {
        $crate::error::FedError::$kind(format!($($arg)*))
    };
}

pub(crate) use fed_err;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            FedError::Config(String::new()),
            FedError::Schema(String::new()),
            FedError::ContextMismatch(String::new()),
            FedError::EmptyInput,
            FedError::MissingWeight { index: 0 },
            FedError::InvalidWeight {
                index: 0,
                count: 0.0,
            },
            FedError::InvalidMode(String::new()),
            FedError::NoiseBudgetExhausted(String::new()),
            FedError::Decode(String::new()),
            FedError::Io(String::new()),
            FedError::IncompleteParticipantSet {
                expected: 2,
                received: 1,
            },
            FedError::InvalidStage {
                expected: "a",
                actual: "b",
            },
        ];
        let mut codes: Vec<u8> = errors.iter().map(FedError::exit_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(codes.iter().all(|&c| c != 0 && c != 1));
    }

    #[test]
    fn test_fed_err_macro() {
        let err = fed_err!(Schema, "expected {} values, got {}", 5, 3);
        assert!(matches!(
            err,
            FedError::Schema(ref m) if m == "expected 5 values, got 3"
        ));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: FedError = io.into();
        assert_eq!(err.exit_code(), 19);
    }
}
