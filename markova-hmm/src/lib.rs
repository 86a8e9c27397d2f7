//! Hidden Markov Models and Baum-Welch parameter estimation.
//!
//! - **Model** — [`Hmm`], generic over a per-state emission distribution
//! - **Emissions** — the [`Opdf`] capability plus [`OpdfDiscrete`] and [`OpdfGaussian`]
//! - **Forward-backward** — [`ForwardBackward`] with direct, scaled, and log-space
//!   [`Computation`] strategies
//! - **Statistics** — xi/gamma estimation in [`estimate`]
//! - **Learning** — [`BaumWelch`] (one EM step via `iterate`, a fixed number of
//!   steps via `learn`)
//! - **Initial guess** — k-means clustering of observations in [`kmeans`]
//!
//! # Quick start
//!
//! ```
//! use markova_hmm::{BaumWelch, Hmm, OpdfDiscrete};
//!
//! let hmm = Hmm::new(
//!     vec![0.6, 0.4],
//!     vec![0.7, 0.3, 0.4, 0.6],
//!     vec![
//!         OpdfDiscrete::new(vec![0.9, 0.1]).unwrap(),
//!         OpdfDiscrete::new(vec![0.2, 0.8]).unwrap(),
//!     ],
//! )
//! .unwrap();
//!
//! let corpus: Vec<Vec<usize>> = vec![vec![0, 0, 1, 0], vec![1, 1, 0, 1, 1]];
//! let learned = BaumWelch::with_iterations(5).learn(&hmm, &corpus).unwrap();
//! assert_eq!(learned.n_states(), 2);
//! ```

pub mod baum_welch;
pub mod corpus;
pub mod estimate;
pub mod forward_backward;
pub mod kmeans;
pub mod model;
pub mod opdf;

pub use baum_welch::{BaumWelch, BaumWelchConfig, LearnReport};
pub use corpus::flatten;
pub use forward_backward::{Computation, ForwardBackward};
pub use model::Hmm;
pub use opdf::{Opdf, OpdfDiscrete, OpdfGaussian};

/// `Sync` when the `parallel` feature is enabled, a no-op bound otherwise.
#[cfg(feature = "parallel")]
pub trait MaybeSync: Sync {}
#[cfg(feature = "parallel")]
impl<T: Sync + ?Sized> MaybeSync for T {}

/// `Sync` when the `parallel` feature is enabled, a no-op bound otherwise.
#[cfg(not(feature = "parallel"))]
pub trait MaybeSync {}
#[cfg(not(feature = "parallel"))]
impl<T: ?Sized> MaybeSync for T {}
