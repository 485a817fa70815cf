//! # nmm-inference
//!
//! Monte Carlo study of prior recovery in the normal-means problem.
//!
//! This crate provides:
//! - the mixture-prior data generator
//! - the closed-form empirical Bayes estimate
//! - goodness-of-fit statistics (one-sample KS, 1-D Wasserstein)
//! - the sequential simulation driver and its configuration
//! - `.npz` persistence of the accumulated result arrays
//!
//! ## Architecture
//!
//! The driver depends on the `GenerativeModel` trait from nmm-core; the
//! native `LatentModel` from nmm-latent is only the default factory.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Synthetic normal-means data from a mixture prior.
pub mod data;
/// Moment-based empirical Bayes prior estimate.
pub mod empirical_bayes;
/// Kolmogorov-Smirnov test and Wasserstein distance.
pub mod gof;
/// `.npz` and JSON output.
pub mod persist;
/// Simulation configuration and trial loop.
pub mod simulation;

pub use data::{MixtureSample, generate_mixture};
pub use empirical_bayes::EmpiricalBayes;
pub use gof::{KsTest, ks_test, wasserstein_distance};
pub use persist::{load_npz, save_npz, write_summary_json};
pub use simulation::{
    EstimateFit, ModelConfig, Phase, SimulationConfig, SimulationDriver, SimulationResult,
    TrialSummary, run_simulation,
};
