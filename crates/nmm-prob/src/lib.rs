//! Probability building blocks for nmm.
//!
//! This crate hosts the probability math shared by the latent model and the
//! simulation harness:
//! - Normal log-density and CDF
//! - the two-component Gaussian mixture prior (CDF and sampling)
//! - the asymptotic Kolmogorov distribution used by the KS test
//! - small numeric helpers (stable softplus/sigmoid/log-sum-exp)

pub mod kolmogorov;
pub mod math;
pub mod mixture;
pub mod normal;

pub use mixture::MixtureParams;
