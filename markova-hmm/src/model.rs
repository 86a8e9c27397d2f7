//! The Hidden Markov Model container.
//!
//! An [`Hmm`] holds a row-major transition matrix, an initial-state
//! distribution, and one emission distribution per state. Values are
//! immutable once built: learning produces a new model rather than patching an
//! existing one.

use markova_core::{MarkovaError, Result, Summarizable};

use crate::forward_backward::{Computation, ForwardBackward};
use crate::opdf::Opdf;

/// Tolerance for probability rows summing to one.
const SUM_TOLERANCE: f64 = 1e-6;

/// A Hidden Markov Model with emission distributions of type `D`.
///
/// With the `serde` feature, deserialization goes through [`Hmm::new`], so a
/// decoded model satisfies the same invariants as a constructed one.
#[derive(Debug, Clone, PartialEq)]
pub struct Hmm<D> {
    /// Number of hidden states.
    n_states: usize,
    /// Initial state probabilities pi[i] (length `n_states`).
    initial: Vec<f64>,
    /// Transition matrix A[i][j] = P(state_j | state_i), stored row-major
    /// as `Vec<f64>` of size `n_states * n_states`.
    transition: Vec<f64>,
    /// Emission distribution of each state.
    opdfs: Vec<D>,
}

impl<D: Opdf> Hmm<D> {
    /// Create a new HMM after validating dimensions and probability constraints.
    ///
    /// The number of states is taken from `opdfs.len()`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `opdfs` is empty
    /// - Vector dimensions do not match the number of states
    /// - Any probability is negative or non-finite
    /// - `initial` or any transition row does not sum to ~1.0 (tolerance 1e-6)
    pub fn new(initial: Vec<f64>, transition: Vec<f64>, opdfs: Vec<D>) -> Result<Self> {
        let n_states = opdfs.len();
        if n_states == 0 {
            return Err(MarkovaError::InvalidInput("n_states must be > 0".into()));
        }
        if initial.len() != n_states {
            return Err(MarkovaError::InvalidInput(format!(
                "initial length {} != n_states {}",
                initial.len(),
                n_states
            )));
        }
        if transition.len() != n_states * n_states {
            return Err(MarkovaError::InvalidInput(format!(
                "transition length {} != n_states*n_states {}",
                transition.len(),
                n_states * n_states
            )));
        }
        if initial
            .iter()
            .chain(&transition)
            .any(|p| !p.is_finite() || *p < 0.0)
        {
            return Err(MarkovaError::InvalidInput(
                "probabilities must be finite and non-negative".into(),
            ));
        }

        let pi_sum: f64 = initial.iter().sum();
        if (pi_sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(MarkovaError::InvalidInput(format!(
                "initial probabilities sum to {pi_sum}, expected ~1.0"
            )));
        }

        for i in 0..n_states {
            let row_sum: f64 = transition[i * n_states..(i + 1) * n_states].iter().sum();
            if (row_sum - 1.0).abs() > SUM_TOLERANCE {
                return Err(MarkovaError::InvalidInput(format!(
                    "transition row {i} sums to {row_sum}, expected ~1.0"
                )));
            }
        }

        Ok(Self {
            n_states,
            initial,
            transition,
            opdfs,
        })
    }

    /// An HMM with uniform initial and transition probabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if `opdfs` is empty.
    pub fn uniform(opdfs: Vec<D>) -> Result<Self> {
        let n = opdfs.len();
        if n == 0 {
            return Err(MarkovaError::InvalidInput("n_states must be > 0".into()));
        }
        let p = 1.0 / n as f64;
        Self::new(vec![p; n], vec![p; n * n], opdfs)
    }

    /// Number of hidden states.
    pub fn n_states(&self) -> usize {
        self.n_states
    }

    /// Initial probability of state `i`.
    pub fn initial(&self, i: usize) -> f64 {
        self.initial[i]
    }

    /// The whole initial-state distribution.
    pub fn initial_distribution(&self) -> &[f64] {
        &self.initial
    }

    /// Probability of moving from state `i` to state `j`.
    pub fn transition(&self, i: usize, j: usize) -> f64 {
        self.transition[i * self.n_states + j]
    }

    /// Outgoing transition probabilities of state `i`.
    pub fn transition_row(&self, i: usize) -> &[f64] {
        &self.transition[i * self.n_states..(i + 1) * self.n_states]
    }

    /// The row-major transition matrix.
    pub fn transition_matrix(&self) -> &[f64] {
        &self.transition
    }

    /// Emission distribution of state `i`.
    pub fn opdf(&self, i: usize) -> &D {
        &self.opdfs[i]
    }

    /// Emission distributions of all states, indexed by state.
    pub fn opdfs(&self) -> &[D] {
        &self.opdfs
    }

    /// Natural log of the probability of `observations` under this model.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty sequence or one with zero probability.
    pub fn ln_probability(
        &self,
        observations: &[D::Observation],
        computation: Computation,
    ) -> Result<f64> {
        ForwardBackward::compute(self, observations, computation).map(|fb| fb.ln_probability())
    }

    /// Probability of `observations` under this model.
    ///
    /// May underflow to zero for long sequences even when
    /// [`ln_probability`](Self::ln_probability) is finite.
    pub fn probability(
        &self,
        observations: &[D::Observation],
        computation: Computation,
    ) -> Result<f64> {
        self.ln_probability(observations, computation).map(f64::exp)
    }
}

impl<D> Summarizable for Hmm<D> {
    fn summary(&self) -> String {
        let pi = self
            .initial
            .iter()
            .map(|p| format!("{p:.3}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("HMM: {} states, pi=[{}]", self.n_states, pi)
    }
}

/// Serialized form of [`Hmm`]; the state count is implied by `opdfs`.
#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct HmmRepr<I, T, O> {
    initial: I,
    transition: T,
    opdfs: O,
}

#[cfg(feature = "serde")]
impl<D: serde::Serialize> serde::Serialize for Hmm<D> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let repr = HmmRepr {
            initial: &self.initial,
            transition: &self.transition,
            opdfs: &self.opdfs,
        };
        serde::Serialize::serialize(&repr, serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de, D: Opdf + serde::Deserialize<'de>> serde::Deserialize<'de> for Hmm<D> {
    fn deserialize<De: serde::Deserializer<'de>>(
        deserializer: De,
    ) -> std::result::Result<Self, De::Error> {
        let repr: HmmRepr<Vec<f64>, Vec<f64>, Vec<D>> =
            serde::Deserialize::deserialize(deserializer)?;
        Self::new(repr.initial, repr.transition, repr.opdfs).map_err(serde::de::Error::custom)
    }
}
