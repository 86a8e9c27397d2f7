//! Structured error types for the markova workspace.

use thiserror::Error;

/// Unified error type for all markova operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarkovaError {
    /// Invalid input (bad arguments, mismatched dimensions, out-of-range values)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An observation sequence too short to carry transition information.
    #[error("observation sequence {sequence} too short: length {len}, need at least 2")]
    SequenceTooShort {
        /// Index of the offending sequence in the corpus. Functions that see
        /// a single sequence report 0; corpus-level callers substitute the
        /// real index.
        sequence: usize,
        /// Its length.
        len: usize,
    },

    /// The sequence has zero (or unrepresentable) probability under the model.
    #[error("observation sequence {sequence} has zero probability under the model")]
    ZeroProbability {
        /// Index of the offending sequence in the corpus, 0 when raised by a
        /// single-sequence function.
        sequence: usize,
    },

    /// A non-finite value appeared while estimating parameters.
    #[error("numerical error: {0}")]
    Numerical(String),
}

/// Convenience alias used throughout the markova workspace.
pub type Result<T> = std::result::Result<T, MarkovaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let e = MarkovaError::SequenceTooShort { sequence: 3, len: 1 };
        assert_eq!(
            e.to_string(),
            "observation sequence 3 too short: length 1, need at least 2"
        );
        let e = MarkovaError::ZeroProbability { sequence: 0 };
        assert!(e.to_string().contains("zero probability"));
        let e = MarkovaError::InvalidInput("empty corpus".into());
        assert_eq!(e.to_string(), "invalid input: empty corpus");
    }
}
