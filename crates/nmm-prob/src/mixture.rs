//! Two-component Gaussian mixture prior.
//!
//! With probability `p1` a draw comes from `N(mu1, sigma)`, otherwise from
//! `N(mu2, sigma)`. Both components share the spread `sigma`.

use nmm_core::{Error, Result};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::normal::std_cdf;

/// Parameters of the mixture prior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixtureParams {
    /// Mean of the first component.
    pub mu1: f64,
    /// Mean of the second component.
    pub mu2: f64,
    /// Probability of the first component.
    pub p1: f64,
    /// Shared standard deviation.
    pub sigma: f64,
}

impl Default for MixtureParams {
    fn default() -> Self {
        Self { mu1: 0.0, mu2: 3.0, p1: 0.4, sigma: 0.5 }
    }
}

impl MixtureParams {
    /// Reject non-finite means, `p1` outside `[0, 1]` and non-positive `sigma`.
    pub fn validate(&self) -> Result<()> {
        if !self.mu1.is_finite() || !self.mu2.is_finite() {
            return Err(Error::Validation(format!(
                "mixture means must be finite, got mu1={} mu2={}",
                self.mu1, self.mu2
            )));
        }
        if !(0.0..=1.0).contains(&self.p1) {
            return Err(Error::Validation(format!("p1 must be in [0, 1], got {}", self.p1)));
        }
        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(Error::Validation(format!(
                "sigma must be finite and > 0, got {}",
                self.sigma
            )));
        }
        Ok(())
    }

    /// Mixture CDF `p1 Φ((x-mu1)/σ) + (1-p1) Φ((x-mu2)/σ)`.
    pub fn cdf(&self, x: f64) -> f64 {
        self.p1 * std_cdf((x - self.mu1) / self.sigma)
            + (1.0 - self.p1) * std_cdf((x - self.mu2) / self.sigma)
    }

    /// Mean of the mixture.
    pub fn mean(&self) -> f64 {
        self.p1 * self.mu1 + (1.0 - self.p1) * self.mu2
    }

    /// Variance of the mixture.
    pub fn variance(&self) -> f64 {
        let d = self.mu1 - self.mu2;
        self.sigma * self.sigma + self.p1 * (1.0 - self.p1) * d * d
    }

    /// Draw `n` component selections: `mu1` with probability `p1`, else `mu2`.
    pub fn sample_components<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<f64> {
        (0..n).map(|_| if rng.random_bool(self.p1) { self.mu1 } else { self.mu2 }).collect()
    }

    /// Perturb each selected component mean with `N(0, sigma)` noise.
    pub fn perturb<R: Rng + ?Sized>(&self, component_means: &[f64], rng: &mut R) -> Result<Vec<f64>> {
        let noise = Normal::new(0.0, self.sigma)
            .map_err(|e| Error::Validation(format!("invalid sigma {}: {}", self.sigma, e)))?;
        Ok(component_means.iter().map(|&m| m + noise.sample(rng)).collect())
    }
}
