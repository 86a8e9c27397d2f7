//! Baum-Welch (EM) re-estimation of HMM parameters.
//!
//! [`BaumWelch::iterate`] performs one EM step: it computes xi and gamma for
//! every sequence of the corpus under the current model, accumulates them
//! across the corpus, and builds a new model from the totals.
//! [`BaumWelch::learn`] chains a fixed number of such steps.
//!
//! The input model is only borrowed, so a step is a pure function of
//! `(model, corpus)`.

use markova_core::{MarkovaError, Result};
use tracing::debug;

use crate::corpus::{flatten, validate_training_corpus};
use crate::estimate::{sequence_statistics, SequenceStatistics};
use crate::forward_backward::Computation;
use crate::model::Hmm;
use crate::opdf::Opdf;
use crate::MaybeSync;

/// Configuration for Baum-Welch learning.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BaumWelchConfig {
    /// Number of EM iterations performed by `learn`.
    pub iterations: usize,
    /// Forward-backward strategy.
    pub computation: Computation,
    /// Stop early once the corpus log-likelihood improves by less than this.
    /// `None` always runs `iterations` steps.
    pub tolerance: Option<f64>,
}

impl Default for BaumWelchConfig {
    fn default() -> Self {
        Self {
            iterations: 9,
            computation: Computation::Scaled,
            tolerance: None,
        }
    }
}

impl BaumWelchConfig {
    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `tolerance` is negative or not finite.
    pub fn validate(&self) -> Result<()> {
        if let Some(tol) = self.tolerance {
            if !(tol >= 0.0 && tol.is_finite()) {
                return Err(MarkovaError::InvalidInput(format!(
                    "tolerance must be finite and non-negative, got {tol}"
                )));
            }
        }
        Ok(())
    }
}

/// Outcome of [`BaumWelch::learn_with_report`].
#[derive(Debug, Clone)]
pub struct LearnReport<D> {
    /// The final model.
    pub hmm: Hmm<D>,
    /// Corpus log-likelihood of the model each iteration started from.
    pub log_likelihoods: Vec<f64>,
    /// Number of iterations actually performed.
    pub iterations: usize,
    /// Whether learning stopped early on the tolerance.
    pub converged: bool,
}

/// Baum-Welch learner.
#[derive(Debug, Clone, Default)]
pub struct BaumWelch {
    config: BaumWelchConfig,
}

impl BaumWelch {
    /// Create a learner from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: BaumWelchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// A learner running `iterations` steps with the default strategy.
    pub fn with_iterations(iterations: usize) -> Self {
        Self {
            config: BaumWelchConfig {
                iterations,
                ..Default::default()
            },
        }
    }

    /// A learner from a signed iteration count.
    ///
    /// # Errors
    ///
    /// Returns an error if `count` is negative.
    pub fn with_iteration_count(count: i64) -> Result<Self> {
        let iterations = usize::try_from(count).map_err(|_| {
            MarkovaError::InvalidInput(format!(
                "iteration count must be non-negative, got {count}"
            ))
        })?;
        Ok(Self::with_iterations(iterations))
    }

    /// Use `computation` for the forward-backward step.
    pub fn computation(mut self, computation: Computation) -> Self {
        self.config.computation = computation;
        self
    }

    /// The learner's configuration.
    pub fn config(&self) -> &BaumWelchConfig {
        &self.config
    }

    /// Perform one Baum-Welch iteration and return the re-estimated model.
    ///
    /// Every sequence must contain at least two observations.
    ///
    /// # Errors
    ///
    /// Returns an error if the corpus is empty, a sequence is too short, a
    /// sequence has zero probability under `hmm`, or an emission distribution
    /// fails to fit. No model is returned on error.
    pub fn iterate<D, S>(&self, hmm: &Hmm<D>, sequences: &[S]) -> Result<Hmm<D>>
    where
        D: Opdf + MaybeSync,
        S: AsRef<[D::Observation]> + MaybeSync,
    {
        self.step(hmm, sequences).map(|(next, _)| next)
    }

    /// Apply [`iterate`](Self::iterate) `iterations` times, feeding each
    /// result into the next step.
    ///
    /// With zero iterations the initial model is returned unchanged.
    pub fn learn<D, S>(&self, initial: &Hmm<D>, sequences: &[S]) -> Result<Hmm<D>>
    where
        D: Opdf + MaybeSync,
        S: AsRef<[D::Observation]> + MaybeSync,
    {
        self.learn_with_report(initial, sequences).map(|report| report.hmm)
    }

    /// Like [`learn`](Self::learn), also reporting the log-likelihood trace.
    pub fn learn_with_report<D, S>(
        &self,
        initial: &Hmm<D>,
        sequences: &[S],
    ) -> Result<LearnReport<D>>
    where
        D: Opdf + MaybeSync,
        S: AsRef<[D::Observation]> + MaybeSync,
    {
        let mut hmm = initial.clone();
        let mut log_likelihoods = Vec::with_capacity(self.config.iterations);
        let mut converged = false;

        for iteration in 0..self.config.iterations {
            let (next, ll) = self.step(&hmm, sequences)?;
            debug!(iteration, log_likelihood = ll, "baum-welch iteration");
            hmm = next;

            let improvement = log_likelihoods.last().map(|prev| ll - prev);
            log_likelihoods.push(ll);

            if let (Some(tol), Some(delta)) = (self.config.tolerance, improvement) {
                if delta.abs() < tol {
                    debug!(iteration, delta, "baum-welch converged");
                    converged = true;
                    break;
                }
            }
        }

        Ok(LearnReport {
            hmm,
            iterations: log_likelihoods.len(),
            log_likelihoods,
            converged,
        })
    }

    /// One EM step. Also returns the corpus log-likelihood under `hmm`.
    fn step<D, S>(&self, hmm: &Hmm<D>, sequences: &[S]) -> Result<(Hmm<D>, f64)>
    where
        D: Opdf + MaybeSync,
        S: AsRef<[D::Observation]> + MaybeSync,
    {
        validate_training_corpus(sequences)?;

        let stats = self.corpus_statistics(hmm, sequences)?;
        let n = hmm.n_states();

        // a[i][j] = num[i][j] / den[i]
        // den[i] = expected number of transitions out of state i
        // num[i][j] = expected number of transitions from state i to j
        let mut num = vec![0.0; n * n];
        let mut den = vec![0.0; n];
        for s in &stats {
            for (t, xi_t) in s.xi.iter().enumerate() {
                for i in 0..n {
                    den[i] += s.gamma[t][i];
                    for j in 0..n {
                        num[i * n + j] += xi_t[i * n + j];
                    }
                }
            }
        }

        let mut transition = Vec::with_capacity(n * n);
        for i in 0..n {
            if den[i] == 0.0 {
                debug!(state = i, "state not reachable, keeping prior transitions");
                transition.extend_from_slice(hmm.transition_row(i));
            } else {
                transition.extend(num[i * n..(i + 1) * n].iter().map(|v| v / den[i]));
            }
        }

        let n_seq = stats.len() as f64;
        let mut initial = vec![0.0; n];
        for s in &stats {
            for i in 0..n {
                initial[i] += s.gamma[0][i] / n_seq;
            }
        }

        let observations = flatten(sequences);
        let opdfs = (0..n)
            .map(|i| refit(hmm.opdf(i), i, &observations, &stats))
            .collect::<Result<Vec<D>>>()?;

        let ll: f64 = stats.iter().map(|s| s.ln_probability).sum();
        let next = Hmm::new(initial, transition, opdfs).map_err(|e| {
            MarkovaError::Numerical(format!("re-estimated model is invalid: {e}"))
        })?;
        Ok((next, ll))
    }

    /// Statistics of every sequence, in corpus order.
    fn corpus_statistics<D, S>(
        &self,
        hmm: &Hmm<D>,
        sequences: &[S],
    ) -> Result<Vec<SequenceStatistics>>
    where
        D: Opdf + MaybeSync,
        S: AsRef<[D::Observation]> + MaybeSync,
    {
        let computation = self.config.computation;

        // Collect every outcome before failing so that the reported sequence
        // is the first failing one in corpus order.
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            let outcomes: Vec<Result<SequenceStatistics>> = sequences
                .par_iter()
                .map(|seq| sequence_statistics(hmm, seq.as_ref(), computation))
                .collect();
            outcomes
                .into_iter()
                .enumerate()
                .map(|(index, outcome)| outcome.map_err(|e| at_sequence(e, index)))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        sequences
            .iter()
            .enumerate()
            .map(|(index, seq)| {
                sequence_statistics(hmm, seq.as_ref(), computation)
                    .map_err(|e| at_sequence(e, index))
            })
            .collect()
    }
}

/// Re-fit a copy of state `state`'s emission distribution to every observation
/// of the corpus, weighted by its occupancy of that state.
fn refit<D: Opdf>(
    opdf: &D,
    state: usize,
    observations: &[&D::Observation],
    stats: &[SequenceStatistics],
) -> Result<D> {
    let mut weights: Vec<f64> = stats
        .iter()
        .flat_map(|s| s.gamma.iter().map(move |g| g[state]))
        .collect();
    let sum: f64 = weights.iter().sum();
    if !sum.is_finite() {
        return Err(MarkovaError::Numerical(format!(
            "occupancy weights of state {state} sum to {sum}"
        )));
    }
    if sum == 0.0 {
        debug!(state, "state never occupied, keeping prior emissions");
        return Ok(opdf.clone());
    }
    for w in weights.iter_mut() {
        *w /= sum;
    }

    let mut fitted = opdf.clone();
    fitted.fit(observations, &weights)?;
    Ok(fitted)
}

/// Attach the corpus index to a sequence-scoped error.
fn at_sequence(err: MarkovaError, index: usize) -> MarkovaError {
    match err {
        MarkovaError::SequenceTooShort { len, .. } => MarkovaError::SequenceTooShort {
            sequence: index,
            len,
        },
        MarkovaError::ZeroProbability { .. } => MarkovaError::ZeroProbability { sequence: index },
        other => other,
    }
}
