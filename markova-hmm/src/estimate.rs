//! Expected sufficient statistics of one observation sequence.
//!
//! `xi[t][i * n + j]` is the expected number of transitions from state `i` at
//! time `t` to state `j` at time `t + 1`, given the whole sequence.
//! `gamma[t][i]` is the probability of occupying state `i` at time `t`.
//!
//! Gamma is derived from xi rather than directly from alpha and beta, so that
//! it stays consistent with xi whatever scaling produced the tables.

use markova_core::{LogProb, MarkovaError, Result};

use crate::forward_backward::{Computation, ForwardBackward};
use crate::model::Hmm;
use crate::opdf::Opdf;

/// Pairwise transition expectations, `[t][i * n_states + j]` for `t < T - 1`.
pub type Xi = Vec<Vec<f64>>;

/// State occupancy expectations, `[t][i]` for `t < T`.
pub type Gamma = Vec<Vec<f64>>;

/// Estimate xi from the forward-backward tables of `observations`.
///
/// # Errors
///
/// Returns [`MarkovaError::SequenceTooShort`] if the sequence has fewer than
/// two observations, and [`MarkovaError::InvalidInput`] if the tables do not
/// match the sequence or the model. Sequence-scoped errors carry index 0;
/// [`BaumWelch`](crate::BaumWelch) re-labels them with the corpus position.
pub fn estimate_xi<D: Opdf>(
    observations: &[D::Observation],
    fb: &ForwardBackward,
    hmm: &Hmm<D>,
) -> Result<Xi> {
    let t_len = observations.len();
    if t_len < 2 {
        return Err(MarkovaError::SequenceTooShort {
            sequence: 0,
            len: t_len,
        });
    }
    let n = hmm.n_states();
    if fb.len() != t_len || fb.alpha()[0].len() != n {
        return Err(MarkovaError::InvalidInput(format!(
            "forward-backward tables are {}x{}, expected {}x{}",
            fb.len(),
            fb.alpha()[0].len(),
            t_len,
            n
        )));
    }

    let alpha = fb.alpha();
    let beta = fb.beta();
    let mut xi = vec![vec![0.0; n * n]; t_len - 1];

    match fb.computation() {
        Computation::Direct | Computation::Scaled => {
            // Scaled tables already carry the 1/P normalization.
            let p = match fb.computation() {
                Computation::Direct => fb.probability(),
                _ => 1.0,
            };
            for t in 0..t_len - 1 {
                let o = &observations[t + 1];
                let b: Vec<f64> = hmm.opdfs().iter().map(|d| d.probability(o)).collect();
                for i in 0..n {
                    for j in 0..n {
                        xi[t][i * n + j] =
                            alpha[t][i] * hmm.transition(i, j) * b[j] * beta[t + 1][j] / p;
                    }
                }
            }
        }
        Computation::Log => {
            let ln_inv_p = LogProb(-fb.ln_probability());
            for t in 0..t_len - 1 {
                let o = &observations[t + 1];
                let ln_b: Vec<LogProb> = hmm
                    .opdfs()
                    .iter()
                    .map(|d| LogProb(d.ln_probability(o)))
                    .collect();
                for i in 0..n {
                    for j in 0..n {
                        xi[t][i * n + j] = LogProb(alpha[t][i])
                            .ln_mul(LogProb::from_weight(hmm.transition(i, j)))
                            .ln_mul(ln_b[j])
                            .ln_mul(LogProb(beta[t + 1][j]))
                            .ln_mul(ln_inv_p)
                            .to_prob();
                    }
                }
            }
        }
    }

    Ok(xi)
}

/// Derive gamma from xi.
///
/// `gamma[t][i] = Σ_j xi[t][i][j]` for `t < T - 1`; the last step has no
/// outgoing transition, so `gamma[T-1][j] = Σ_i xi[T-2][i][j]`.
///
/// # Errors
///
/// Returns [`MarkovaError::SequenceTooShort`] (index 0, length 1) for an empty
/// xi, and [`MarkovaError::InvalidInput`] if a row is not
/// `n_states * n_states` long.
pub fn estimate_gamma(xi: &[Vec<f64>], n_states: usize) -> Result<Gamma> {
    let Some(last) = xi.last() else {
        return Err(MarkovaError::SequenceTooShort {
            sequence: 0,
            len: 1,
        });
    };
    let n = n_states;
    if let Some(t) = xi.iter().position(|row| row.len() != n * n) {
        return Err(MarkovaError::InvalidInput(format!(
            "xi[{t}] has {} entries, expected {}",
            xi[t].len(),
            n * n
        )));
    }

    let mut gamma = vec![vec![0.0; n]; xi.len() + 1];
    for (t, row) in xi.iter().enumerate() {
        for i in 0..n {
            gamma[t][i] = row[i * n..(i + 1) * n].iter().sum();
        }
    }
    for j in 0..n {
        gamma[xi.len()][j] = (0..n).map(|i| last[i * n + j]).sum();
    }

    Ok(gamma)
}

/// Xi, gamma, and log-likelihood of one sequence under one model.
#[derive(Debug, Clone)]
pub struct SequenceStatistics {
    /// Transition expectations, see [`estimate_xi`].
    pub xi: Xi,
    /// State occupancy expectations, see [`estimate_gamma`].
    pub gamma: Gamma,
    /// Natural log of the sequence probability.
    pub ln_probability: f64,
}

/// Run forward-backward and both estimators over one sequence.
///
/// # Errors
///
/// Fails like [`ForwardBackward::compute`] and [`estimate_xi`]; as there,
/// sequence-scoped errors carry index 0.
pub fn sequence_statistics<D: Opdf>(
    hmm: &Hmm<D>,
    observations: &[D::Observation],
    computation: Computation,
) -> Result<SequenceStatistics> {
    if observations.len() < 2 {
        return Err(MarkovaError::SequenceTooShort {
            sequence: 0,
            len: observations.len(),
        });
    }
    let fb = ForwardBackward::compute(hmm, observations, computation)?;
    let xi = estimate_xi(observations, &fb, hmm)?;
    let gamma = estimate_gamma(&xi, hmm.n_states())?;
    Ok(SequenceStatistics {
        xi,
        gamma,
        ln_probability: fb.ln_probability(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opdf::OpdfDiscrete;

    const ALL: [Computation; 3] = [Computation::Direct, Computation::Scaled, Computation::Log];

    fn two_state() -> Hmm<OpdfDiscrete> {
        Hmm::new(
            vec![0.6, 0.4],
            vec![0.7, 0.3, 0.4, 0.6],
            vec![
                OpdfDiscrete::new(vec![0.9, 0.1]).unwrap(),
                OpdfDiscrete::new(vec![0.2, 0.8]).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn xi_rejects_single_observation() {
        let hmm = two_state();
        for computation in ALL {
            let fb = ForwardBackward::compute(&hmm, &[0], computation).unwrap();
            assert_eq!(
                estimate_xi(&[0], &fb, &hmm).unwrap_err(),
                MarkovaError::SequenceTooShort {
                    sequence: 0,
                    len: 1
                }
            );
        }
    }

    #[test]
    fn xi_rejects_mismatched_tables() {
        let hmm = two_state();
        let fb = ForwardBackward::compute(&hmm, &[0, 1, 0], Computation::Direct).unwrap();
        assert!(matches!(
            estimate_xi(&[0, 1], &fb, &hmm),
            Err(MarkovaError::InvalidInput(_))
        ));
    }

    #[test]
    fn xi_two_step_hand_computation() {
        let hmm = two_state();
        let fb = ForwardBackward::compute(&hmm, &[0, 1], Computation::Direct).unwrap();
        let xi = estimate_xi(&[0, 1], &fb, &hmm).unwrap();
        // xi[0][0][1] = alpha[0][0] * a01 * b1(1) * 1 / P = 0.54 * 0.3 * 0.8 / 0.209
        assert_eq!(xi.len(), 1);
        assert!((xi[0][1] - 0.54 * 0.3 * 0.8 / 0.209).abs() < 1e-12);
        assert!((xi[0].iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn gamma_rejects_empty_xi() {
        assert!(matches!(
            estimate_gamma(&[], 2),
            Err(MarkovaError::SequenceTooShort { len: 1, .. })
        ));
        assert!(matches!(
            estimate_gamma(&[vec![0.5; 3]], 2),
            Err(MarkovaError::InvalidInput(_))
        ));
    }

    #[test]
    fn gamma_marginalizes_xi() {
        // one transition step, 2 states: xi = [[0.1, 0.2], [0.3, 0.4]]
        let xi = vec![vec![0.1, 0.2, 0.3, 0.4]];
        let gamma = estimate_gamma(&xi, 2).unwrap();
        assert_eq!(gamma.len(), 2);
        // rows: over destination
        assert!((gamma[0][0] - 0.3).abs() < 1e-12);
        assert!((gamma[0][1] - 0.7).abs() < 1e-12);
        // final step: over source
        assert!((gamma[1][0] - 0.4).abs() < 1e-12);
        assert!((gamma[1][1] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn gamma_is_a_distribution_at_every_step() {
        let hmm = two_state();
        let obs = [0, 0, 1, 0, 1, 1, 1, 0];
        for computation in ALL {
            let stats = sequence_statistics(&hmm, &obs, computation).unwrap();
            assert_eq!(stats.gamma.len(), obs.len());
            for (t, row) in stats.gamma.iter().enumerate() {
                let s: f64 = row.iter().sum();
                assert!((s - 1.0).abs() < 1e-9, "{computation:?} t={t}: {s}");
            }
        }
    }

    #[test]
    fn strategies_produce_the_same_statistics() {
        let hmm = two_state();
        let obs = [1, 0, 0, 1, 1, 0, 1, 0, 0];
        let direct = sequence_statistics(&hmm, &obs, Computation::Direct).unwrap();
        for computation in [Computation::Scaled, Computation::Log] {
            let other = sequence_statistics(&hmm, &obs, computation).unwrap();
            for (a, b) in direct.xi.iter().flatten().zip(other.xi.iter().flatten()) {
                assert!((a - b).abs() < 1e-10, "{computation:?}: xi {a} vs {b}");
            }
            for (a, b) in direct.gamma.iter().flatten().zip(other.gamma.iter().flatten()) {
                assert!((a - b).abs() < 1e-10, "{computation:?}: gamma {a} vs {b}");
            }
        }
    }

    #[test]
    fn gamma_matches_alpha_beta_posterior() {
        let hmm = two_state();
        let obs = [0, 1, 1, 0, 0];
        let fb = ForwardBackward::compute(&hmm, &obs, Computation::Direct).unwrap();
        let gamma = estimate_gamma(&estimate_xi(&obs, &fb, &hmm).unwrap(), 2).unwrap();
        for t in 0..obs.len() {
            for i in 0..2 {
                let posterior = fb.alpha()[t][i] * fb.beta()[t][i] / fb.probability();
                assert!((gamma[t][i] - posterior).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn statistics_report_index_zero() {
        let hmm = Hmm::new(
            vec![1.0, 0.0],
            vec![1.0, 0.0, 0.0, 1.0],
            vec![
                OpdfDiscrete::new(vec![1.0, 0.0]).unwrap(),
                OpdfDiscrete::new(vec![0.0, 1.0]).unwrap(),
            ],
        )
        .unwrap();
        for computation in ALL {
            assert_eq!(
                sequence_statistics(&hmm, &[0, 1], computation).unwrap_err(),
                MarkovaError::ZeroProbability { sequence: 0 }
            );
        }
    }

    #[test]
    fn statistics_reject_short_sequence() {
        let hmm = two_state();
        assert!(matches!(
            sequence_statistics(&hmm, &[1], Computation::Scaled),
            Err(MarkovaError::SequenceTooShort { len: 1, .. })
        ));
    }
}
