//! Forward-backward computation for a single observation sequence.
//!
//! Three interchangeable strategies are provided, selected by [`Computation`]:
//!
//! - [`Computation::Direct`] multiplies raw probabilities. Exact, but `alpha`
//!   underflows to zero after a few hundred steps.
//! - [`Computation::Scaled`] normalizes `alpha[t]` to sum to one at every step
//!   and divides `beta[t]` by the same factor `c_t`, so that
//!   `ln P = Σ_t ln c_t`.
//! - [`Computation::Log`] keeps `alpha` and `beta` as natural logarithms and
//!   combines terms with log-sum-exp.
//!
//! Downstream statistics ([`crate::estimate`]) interpret the tables according
//! to the strategy, so xi and gamma do not depend on the choice.

use markova_core::{LogProb, MarkovaError, Result};

use crate::model::Hmm;
use crate::opdf::Opdf;

/// Numerical strategy used for the forward and backward recursions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Computation {
    /// Unscaled probabilities; suitable for short sequences.
    Direct,
    /// Per-step normalized probabilities.
    #[default]
    Scaled,
    /// Log-space probabilities.
    Log,
}

/// Forward and backward tables of one observation sequence.
///
/// Interpretation of [`alpha`](Self::alpha) and [`beta`](Self::beta) depends
/// on [`computation`](Self::computation): raw probabilities for `Direct`,
/// per-step scaled values for `Scaled`, natural logarithms for `Log`.
#[derive(Debug, Clone)]
pub struct ForwardBackward {
    computation: Computation,
    alpha: Vec<Vec<f64>>,
    beta: Vec<Vec<f64>>,
    /// Sequence probability; only exact for `Direct`, may underflow otherwise.
    probability: f64,
    ln_probability: f64,
}

impl ForwardBackward {
    /// Run the forward and backward recursions of `hmm` over `observations`.
    ///
    /// # Errors
    ///
    /// Returns [`MarkovaError::InvalidInput`] for an empty sequence and
    /// [`MarkovaError::ZeroProbability`] (with sequence index 0) when the
    /// sequence probability is zero or not representable under the chosen
    /// strategy.
    pub fn compute<D: Opdf>(
        hmm: &Hmm<D>,
        observations: &[D::Observation],
        computation: Computation,
    ) -> Result<Self> {
        if observations.is_empty() {
            return Err(MarkovaError::InvalidInput(
                "observation sequence is empty".into(),
            ));
        }
        match computation {
            Computation::Direct => Self::direct(hmm, observations),
            Computation::Scaled => Self::scaled(hmm, observations),
            Computation::Log => Self::log_space(hmm, observations),
        }
    }

    // -----------------------------------------------------------------------
    // Direct
    // -----------------------------------------------------------------------

    fn direct<D: Opdf>(hmm: &Hmm<D>, observations: &[D::Observation]) -> Result<Self> {
        let n = hmm.n_states();
        let t_len = observations.len();
        let emission = emission_table(hmm, observations);

        // Initialization: alpha[0][i] = pi[i] * b_i(o_0)
        let mut alpha = vec![vec![0.0; n]; t_len];
        for i in 0..n {
            alpha[0][i] = hmm.initial(i) * emission[0][i];
        }

        // Induction
        for t in 1..t_len {
            for j in 0..n {
                let acc: f64 = (0..n).map(|i| alpha[t - 1][i] * hmm.transition(i, j)).sum();
                alpha[t][j] = acc * emission[t][j];
            }
        }

        let probability: f64 = alpha[t_len - 1].iter().sum();
        if !(probability > 0.0 && probability.is_finite()) {
            return Err(MarkovaError::ZeroProbability { sequence: 0 });
        }

        // beta[T-1][i] = 1, then backwards
        let mut beta = vec![vec![1.0; n]; t_len];
        for t in (0..t_len - 1).rev() {
            for i in 0..n {
                beta[t][i] = (0..n)
                    .map(|j| hmm.transition(i, j) * emission[t + 1][j] * beta[t + 1][j])
                    .sum();
            }
        }

        Ok(Self {
            computation: Computation::Direct,
            alpha,
            beta,
            probability,
            ln_probability: probability.ln(),
        })
    }

    // -----------------------------------------------------------------------
    // Scaled
    // -----------------------------------------------------------------------

    fn scaled<D: Opdf>(hmm: &Hmm<D>, observations: &[D::Observation]) -> Result<Self> {
        let n = hmm.n_states();
        let t_len = observations.len();
        let emission = emission_table(hmm, observations);

        let mut alpha = vec![vec![0.0; n]; t_len];
        let mut factors = vec![0.0; t_len];

        for i in 0..n {
            alpha[0][i] = hmm.initial(i) * emission[0][i];
        }
        factors[0] = rescale(&mut alpha[0])?;

        for t in 1..t_len {
            for j in 0..n {
                let acc: f64 = (0..n).map(|i| alpha[t - 1][i] * hmm.transition(i, j)).sum();
                alpha[t][j] = acc * emission[t][j];
            }
            factors[t] = rescale(&mut alpha[t])?;
        }

        let mut beta = vec![vec![1.0 / factors[t_len - 1]; n]; t_len];
        for t in (0..t_len - 1).rev() {
            for i in 0..n {
                let acc: f64 = (0..n)
                    .map(|j| hmm.transition(i, j) * emission[t + 1][j] * beta[t + 1][j])
                    .sum();
                beta[t][i] = acc / factors[t];
            }
        }

        let ln_probability: f64 = factors.iter().map(|c| c.ln()).sum();

        Ok(Self {
            computation: Computation::Scaled,
            alpha,
            beta,
            probability: ln_probability.exp(),
            ln_probability,
        })
    }

    // -----------------------------------------------------------------------
    // Log-space
    // -----------------------------------------------------------------------

    fn log_space<D: Opdf>(hmm: &Hmm<D>, observations: &[D::Observation]) -> Result<Self> {
        let n = hmm.n_states();
        let t_len = observations.len();
        let ln_emission: Vec<Vec<LogProb>> = observations
            .iter()
            .map(|o| {
                hmm.opdfs()
                    .iter()
                    .map(|d| LogProb(d.ln_probability(o)))
                    .collect()
            })
            .collect();
        let ln_transition: Vec<LogProb> = hmm
            .transition_matrix()
            .iter()
            .map(|&a| LogProb::from_weight(a))
            .collect();

        let mut alpha = vec![vec![f64::NEG_INFINITY; n]; t_len];
        for i in 0..n {
            alpha[0][i] = LogProb::from_weight(hmm.initial(i))
                .ln_mul(ln_emission[0][i])
                .0;
        }

        for t in 1..t_len {
            for j in 0..n {
                let acc = LogProb::ln_sum(
                    (0..n).map(|i| LogProb(alpha[t - 1][i]).ln_mul(ln_transition[i * n + j])),
                );
                alpha[t][j] = acc.ln_mul(ln_emission[t][j]).0;
            }
        }

        let ln_probability = LogProb::ln_sum(alpha[t_len - 1].iter().map(|&a| LogProb(a))).0;
        if !ln_probability.is_finite() {
            return Err(MarkovaError::ZeroProbability { sequence: 0 });
        }

        // beta[T-1][i] = ln(1) = 0
        let mut beta = vec![vec![0.0; n]; t_len];
        for t in (0..t_len - 1).rev() {
            for i in 0..n {
                beta[t][i] = LogProb::ln_sum((0..n).map(|j| {
                    ln_transition[i * n + j]
                        .ln_mul(ln_emission[t + 1][j])
                        .ln_mul(LogProb(beta[t + 1][j]))
                }))
                .0;
            }
        }

        Ok(Self {
            computation: Computation::Log,
            alpha,
            beta,
            probability: ln_probability.exp(),
            ln_probability,
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The strategy that produced these tables.
    pub fn computation(&self) -> Computation {
        self.computation
    }

    /// Forward table, indexed `[t][state]`.
    pub fn alpha(&self) -> &[Vec<f64>] {
        &self.alpha
    }

    /// Backward table, indexed `[t][state]`.
    pub fn beta(&self) -> &[Vec<f64>] {
        &self.beta
    }

    /// Probability of the sequence. Exact for [`Computation::Direct`];
    /// recovered from the log-probability (and possibly zero) otherwise.
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Natural log of the sequence probability.
    pub fn ln_probability(&self) -> f64 {
        self.ln_probability
    }

    /// Length of the sequence the tables were computed for.
    pub fn len(&self) -> usize {
        self.alpha.len()
    }

    /// Whether the tables are empty. Never true for a computed sequence.
    pub fn is_empty(&self) -> bool {
        self.alpha.is_empty()
    }
}

/// `emission[t][i] = b_i(o_t)`.
fn emission_table<D: Opdf>(hmm: &Hmm<D>, observations: &[D::Observation]) -> Vec<Vec<f64>> {
    observations
        .iter()
        .map(|o| hmm.opdfs().iter().map(|d| d.probability(o)).collect())
        .collect()
}

/// Normalize `row` to sum to one and return the scaling factor.
fn rescale(row: &mut [f64]) -> Result<f64> {
    let factor: f64 = row.iter().sum();
    if !(factor > 0.0 && factor.is_finite()) {
        return Err(MarkovaError::ZeroProbability { sequence: 0 });
    }
    for v in row.iter_mut() {
        *v /= factor;
    }
    Ok(factor)
}
