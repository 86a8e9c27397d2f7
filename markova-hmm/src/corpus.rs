//! Helpers over a training corpus: an ordered list of observation sequences.

use markova_core::{MarkovaError, Result};

/// Concatenate every sequence of `sequences`, preserving corpus order and the
/// order within each sequence.
pub fn flatten<O, S: AsRef<[O]>>(sequences: &[S]) -> Vec<&O> {
    sequences.iter().flat_map(|s| s.as_ref().iter()).collect()
}

/// Reject an empty corpus or any sequence with fewer than two observations.
///
/// Runs before any statistics are accumulated so that a bad sequence never
/// leaves partial work behind.
pub fn validate_training_corpus<O, S: AsRef<[O]>>(sequences: &[S]) -> Result<()> {
    if sequences.is_empty() {
        return Err(MarkovaError::InvalidInput(
            "training corpus contains no sequences".into(),
        ));
    }
    for (sequence, s) in sequences.iter().enumerate() {
        let len = s.as_ref().len();
        if len < 2 {
            return Err(MarkovaError::SequenceTooShort { sequence, len });
        }
    }
    Ok(())
}
