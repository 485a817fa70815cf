//! Closed-form empirical Bayes estimate of a Normal prior.
//!
//! With `x_i = mu_i + e_i`, `e_i ~ N(0, 1)` and `mu_i ~ N(m, v)`, the
//! marginal is `N(m, v + 1)`, so `m = mean(x)` and `v = var(x) - 1`.

use nmm_core::{Error, Result};
use nmm_prob::math::{mean, variance};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Known observation noise variance.
pub const NOISE_VARIANCE: f64 = 1.0;

/// Moment estimate of the prior `N(mean, variance)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmpiricalBayes {
    /// Estimated prior mean.
    pub mean: f64,
    /// Estimated prior variance; negative when `var(x) < 1`.
    pub variance: f64,
}

impl EmpiricalBayes {
    /// Estimate from observations. The variance is not clamped.
    pub fn estimate(x: &[f64]) -> Result<Self> {
        if x.is_empty() {
            return Err(Error::Validation("empirical Bayes needs at least one observation".to_string()));
        }
        Ok(Self { mean: mean(x), variance: variance(x) - NOISE_VARIANCE })
    }

    /// Prior standard deviation. Fails when the estimated variance is negative.
    pub fn sd(&self) -> Result<f64> {
        if self.variance.is_nan() || self.variance < 0.0 {
            return Err(Error::Computation(format!(
                "empirical Bayes prior variance is negative ({}): observed variance is below the noise variance",
                self.variance
            )));
        }
        Ok(self.variance.sqrt())
    }

    /// Draw `n` values from the estimated prior.
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<f64>> {
        let normal = Normal::new(self.mean, self.sd()?)
            .map_err(|e| Error::Computation(format!("invalid empirical Bayes prior: {}", e)))?;
        Ok((0..n).map(|_| normal.sample(rng)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_estimate_moments() {
        // population variance 5.2, mean 3
        let x = [0.0, 1.0, 3.0, 5.0, 6.0];
        let eb = EmpiricalBayes::estimate(&x).unwrap();
        assert_relative_eq!(eb.mean, 3.0);
        assert_relative_eq!(eb.variance, 5.2 - 1.0, epsilon = 1e-12);
        assert_relative_eq!(eb.sd().unwrap(), 4.2f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_sd_nonnegative_when_var_at_least_one() {
        let x = [-1.0, 1.0]; // var = 1 exactly
        let eb = EmpiricalBayes::estimate(&x).unwrap();
        assert_eq!(eb.sd().unwrap(), 0.0);
        let x = [-3.0, 1.0, 4.0];
        assert!(EmpiricalBayes::estimate(&x).unwrap().sd().unwrap() >= 0.0);
    }

    #[test]
    fn test_negative_variance_is_an_error() {
        let x = [0.1, -0.1, 0.2];
        let eb = EmpiricalBayes::estimate(&x).unwrap();
        assert!(eb.variance < 0.0);
        assert!(matches!(eb.sd(), Err(Error::Computation(_))));
        let mut rng = StdRng::seed_from_u64(0);
        assert!(eb.sample(10, &mut rng).is_err());
        assert!(EmpiricalBayes::estimate(&[]).is_err());
    }

    #[test]
    fn test_sample_len() {
        let eb = EmpiricalBayes { mean: 1.0, variance: 4.0 };
        let mut rng = StdRng::seed_from_u64(0);
        let s = eb.sample(500, &mut rng).unwrap();
        assert_eq!(s.len(), 500);
        assert!(s.iter().all(|v| v.is_finite()));
    }
}
