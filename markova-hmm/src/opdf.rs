//! Emission distributions ("observation probability distribution functions").
//!
//! The Baum-Welch learner only needs two capabilities from a per-state
//! emission distribution: evaluate the probability (or density) of an
//! observation, and re-fit itself to a weighted set of observations. Both are
//! captured by the [`Opdf`] trait.

use std::f64::consts::PI;

use markova_core::{MarkovaError, Result};

/// Variance floor applied when fitting a Gaussian to degenerate data.
const MIN_VARIANCE: f64 = 1e-10;

/// A per-state emission distribution.
pub trait Opdf: Clone {
    /// The observation type this distribution is defined over.
    type Observation;

    /// Probability (discrete) or density (continuous) of `observation`.
    /// Always non-negative.
    fn probability(&self, observation: &Self::Observation) -> f64;

    /// Natural log of [`probability`](Self::probability).
    fn ln_probability(&self, observation: &Self::Observation) -> f64 {
        self.probability(observation).ln()
    }

    /// Re-fit the distribution to `observations`, weighted by `weights`.
    ///
    /// `weights` is aligned by index with `observations` and expected to sum
    /// to one. Individual weights may be exactly zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the slices differ in length, are empty, or carry
    /// negative / non-finite weights.
    fn fit(&mut self, observations: &[&Self::Observation], weights: &[f64]) -> Result<()>;
}

/// Check the observation/weight pairing and return the weight total.
fn check_weights(n_observations: usize, weights: &[f64]) -> Result<f64> {
    if n_observations == 0 {
        return Err(MarkovaError::InvalidInput(
            "cannot fit a distribution to zero observations".into(),
        ));
    }
    if weights.len() != n_observations {
        return Err(MarkovaError::InvalidInput(format!(
            "weights length {} != observations length {}",
            weights.len(),
            n_observations
        )));
    }
    if let Some((k, w)) = weights
        .iter()
        .enumerate()
        .find(|(_, w)| !w.is_finite() || **w < 0.0)
    {
        return Err(MarkovaError::InvalidInput(format!(
            "weight[{k}] = {w} is not a finite non-negative number"
        )));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(MarkovaError::InvalidInput("weights sum to zero".into()));
    }
    Ok(total)
}

// ---------------------------------------------------------------------------
// Discrete (categorical) emissions
// ---------------------------------------------------------------------------

/// Categorical distribution over the symbols `0..n_symbols`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OpdfDiscrete {
    probabilities: Vec<f64>,
}

impl OpdfDiscrete {
    /// Create a categorical distribution from symbol probabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if `probabilities` is empty, has a negative or
    /// non-finite entry, or does not sum to ~1.0 (tolerance 1e-6).
    pub fn new(probabilities: Vec<f64>) -> Result<Self> {
        if probabilities.is_empty() {
            return Err(MarkovaError::InvalidInput("n_symbols must be > 0".into()));
        }
        if probabilities.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(MarkovaError::InvalidInput(
                "symbol probabilities must be finite and non-negative".into(),
            ));
        }
        let sum: f64 = probabilities.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(MarkovaError::InvalidInput(format!(
                "symbol probabilities sum to {sum}, expected ~1.0"
            )));
        }
        Ok(Self { probabilities })
    }

    /// Uniform distribution over `n_symbols` symbols.
    ///
    /// # Errors
    ///
    /// Returns an error if `n_symbols` is zero.
    pub fn uniform(n_symbols: usize) -> Result<Self> {
        if n_symbols == 0 {
            return Err(MarkovaError::InvalidInput("n_symbols must be > 0".into()));
        }
        Ok(Self {
            probabilities: vec![1.0 / n_symbols as f64; n_symbols],
        })
    }

    /// Number of symbols.
    pub fn n_symbols(&self) -> usize {
        self.probabilities.len()
    }

    /// Symbol probabilities, indexed by symbol.
    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }
}

impl Opdf for OpdfDiscrete {
    type Observation = usize;

    /// Out-of-range symbols have probability zero.
    fn probability(&self, observation: &usize) -> f64 {
        self.probabilities.get(*observation).copied().unwrap_or(0.0)
    }

    fn fit(&mut self, observations: &[&usize], weights: &[f64]) -> Result<()> {
        let total = check_weights(observations.len(), weights)?;
        let n_symbols = self.probabilities.len();

        let mut counts = vec![0.0; n_symbols];
        for (t, (&&o, &w)) in observations.iter().zip(weights).enumerate() {
            if o >= n_symbols {
                return Err(MarkovaError::InvalidInput(format!(
                    "observation[{t}] = {o} out of range (n_symbols = {n_symbols})"
                )));
            }
            counts[o] += w;
        }
        for c in counts.iter_mut() {
            *c /= total;
        }

        self.probabilities = counts;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Gaussian emissions
// ---------------------------------------------------------------------------

/// Univariate normal distribution over real-valued observations.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OpdfGaussian {
    mean: f64,
    variance: f64,
}

impl OpdfGaussian {
    /// Create a normal distribution. `variance` must be positive and finite.
    pub fn new(mean: f64, variance: f64) -> Result<Self> {
        if !mean.is_finite() {
            return Err(MarkovaError::InvalidInput(
                "OpdfGaussian: mean must be finite".into(),
            ));
        }
        if !(variance > 0.0 && variance.is_finite()) {
            return Err(MarkovaError::InvalidInput(
                "OpdfGaussian: variance must be positive".into(),
            ));
        }
        Ok(Self { mean, variance })
    }

    /// Standard normal distribution N(0, 1).
    pub fn standard() -> Self {
        Self {
            mean: 0.0,
            variance: 1.0,
        }
    }

    /// Mean of the distribution.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Variance of the distribution (always positive).
    pub fn variance(&self) -> f64 {
        self.variance
    }
}

impl Default for OpdfGaussian {
    fn default() -> Self {
        Self::standard()
    }
}

impl Opdf for OpdfGaussian {
    type Observation = f64;

    fn probability(&self, observation: &f64) -> f64 {
        let d = observation - self.mean;
        (-0.5 * d * d / self.variance).exp() / (2.0 * PI * self.variance).sqrt()
    }

    fn ln_probability(&self, observation: &f64) -> f64 {
        let d = observation - self.mean;
        -0.5 * ((2.0 * PI * self.variance).ln() + d * d / self.variance)
    }

    fn fit(&mut self, observations: &[&f64], weights: &[f64]) -> Result<()> {
        let total = check_weights(observations.len(), weights)?;

        let mean = observations
            .iter()
            .zip(weights)
            .map(|(&&x, &w)| x * w)
            .sum::<f64>()
            / total;
        let variance = observations
            .iter()
            .zip(weights)
            .map(|(&&x, &w)| w * (x - mean).powi(2))
            .sum::<f64>()
            / total;

        if !mean.is_finite() || !variance.is_finite() {
            return Err(MarkovaError::Numerical(
                "OpdfGaussian: fitted parameters are not finite".into(),
            ));
        }

        self.mean = mean;
        self.variance = variance.max(MIN_VARIANCE);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Validated deserialization
// ---------------------------------------------------------------------------

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct OpdfDiscreteRepr {
    probabilities: Vec<f64>,
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for OpdfDiscrete {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let repr: OpdfDiscreteRepr = serde::Deserialize::deserialize(deserializer)?;
        Self::new(repr.probabilities).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct OpdfGaussianRepr {
    mean: f64,
    variance: f64,
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for OpdfGaussian {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let repr: OpdfGaussianRepr = serde::Deserialize::deserialize(deserializer)?;
        Self::new(repr.mean, repr.variance).map_err(serde::de::Error::custom)
    }
}
