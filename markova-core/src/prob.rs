//! Log-space probability type for numerically stable computation.
//!
//! [`LogProb`] represents probabilities (or densities) as natural logarithms,
//! which prevents underflow in long chains of small factors such as the
//! forward and backward recursions of a Hidden Markov Model.

/// A probability stored as its natural logarithm: `ln(p)`.
///
/// Negative infinity represents impossibility (p = 0). Values above zero are
/// allowed so that probability densities greater than one can be carried.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct LogProb(pub f64);

impl LogProb {
    /// Take the logarithm of any non-negative weight. Zero maps to
    /// [`LogProb::impossible`].
    pub fn from_weight(w: f64) -> Self {
        Self(w.ln())
    }

    /// Convert back to a raw probability.
    pub fn to_prob(self) -> f64 {
        self.0.exp()
    }

    /// Multiply two probabilities in log-space (addition of log values).
    pub fn ln_mul(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }

    /// Log-sum-exp over any number of terms.
    ///
    /// An empty iterator sums to [`LogProb::impossible`].
    pub fn ln_sum<I: IntoIterator<Item = Self>>(terms: I) -> Self {
        let terms: Vec<f64> = terms.into_iter().map(|lp| lp.0).collect();
        let max = terms.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if max == f64::NEG_INFINITY {
            return Self::impossible();
        }
        let sum: f64 = terms.iter().map(|&x| (x - max).exp()).sum();
        Self(max + sum.ln())
    }

    /// Impossible event: `ln(0) = -∞`.
    pub const fn impossible() -> Self {
        Self(f64::NEG_INFINITY)
    }
}
