//! Synthetic data generation.
//!
//! Draw order is part of the contract: all component selections, then all
//! latent means, then all observation noises. Changing it changes every
//! downstream number of a seeded run.

use nmm_core::Result;
use nmm_prob::MixtureParams;
use rand::Rng;
use rand_distr::StandardNormal;

/// One synthetic dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureSample {
    /// Component mean selected for each unit (before prior noise).
    pub component_means: Vec<f64>,
    /// Latent means `mu_i ~ N(component_mean_i, sigma)`.
    pub mu: Vec<f64>,
    /// Observations `x_i = mu_i + N(0, 1)`.
    pub x: Vec<f64>,
}

/// Draw `n` latent means from the mixture prior and one unit-variance
/// observation per mean.
pub fn generate_mixture<R: Rng + ?Sized>(
    n: usize,
    params: &MixtureParams,
    rng: &mut R,
) -> Result<MixtureSample> {
    params.validate()?;
    let component_means = params.sample_components(n, rng);
    let mu = params.perturb(&component_means, rng)?;
    let x = mu.iter().map(|&m| m + rng.sample::<f64, _>(StandardNormal)).collect();
    Ok(MixtureSample { component_means, mu, x })
}
