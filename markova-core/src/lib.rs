//! Shared primitives and traits for the markova workspace.
//!
//! `markova-core` provides the foundation the model crates build on:
//!
//! - **Error types** — [`MarkovaError`] and [`Result`] for structured error handling
//! - **Probabilities** — [`LogProb`] for log-space arithmetic
//! - **Traits** — small capability traits such as [`Summarizable`]

pub mod error;
pub mod prob;
pub mod traits;

pub use error::{MarkovaError, Result};
pub use prob::LogProb;
pub use traits::*;
