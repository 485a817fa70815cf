//! Unadjusted Langevin dynamics on latent particles.
//!
//! Target: the exact latent posterior `π(z | x) ∝ p(x | g(z)) N(z; 0, I)`.
//! One step moves every row of `z` independently:
//!
//! `z ← z + h ∇_z log π(z | x) + sqrt(2h) ξ`, `ξ ~ N(0, I)`.
//!
//! The score `∇_z log p(x | g(z))` is obtained by backpropagating the
//! likelihood gradient through the decoder.

use nalgebra::DMatrix;
use nmm_core::{Error, Result};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::likelihood::ConditionalLikelihood;
use crate::network::Mlp;

/// Langevin sampler with a fixed step size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Langevin {
    step_size: f64,
}

impl Langevin {
    /// Sampler with step size `h > 0`.
    pub fn new(step_size: f64) -> Result<Self> {
        if !step_size.is_finite() || step_size <= 0.0 {
            return Err(Error::Validation(format!(
                "Langevin step size must be finite and > 0, got {}",
                step_size
            )));
        }
        Ok(Self { step_size })
    }

    /// Step size `h`.
    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    /// Gradient of `log π(z | x)` with respect to every row of `z`.
    pub fn score<L: ConditionalLikelihood>(
        decoder: &Mlp,
        likelihood: &L,
        x: &DMatrix<f64>,
        z: &DMatrix<f64>,
    ) -> DMatrix<f64> {
        let (theta, trace) = decoder.forward_trace(z);
        let g_theta = likelihood.grad_theta(x, &theta);
        decoder.backward_input(&trace, &g_theta) - z
    }

    /// Advance all particles by one step.
    pub fn step<L: ConditionalLikelihood, R: Rng + ?Sized>(
        &self,
        decoder: &Mlp,
        likelihood: &L,
        x: &DMatrix<f64>,
        z: &mut DMatrix<f64>,
        rng: &mut R,
    ) -> Result<()> {
        let score = Self::score(decoder, likelihood, x, z);
        let noise_scale = (2.0 * self.step_size).sqrt();
        for (zi, gi) in z.iter_mut().zip(score.iter()) {
            let xi: f64 = rng.sample(StandardNormal);
            *zi += self.step_size * gi + noise_scale * xi;
        }
        if z.iter().any(|v| !v.is_finite()) {
            return Err(Error::Computation(
                "Langevin particles diverged (non-finite latent state)".to_string(),
            ));
        }
        Ok(())
    }

    /// Advance all particles by `n_steps` steps.
    pub fn run<L: ConditionalLikelihood, R: Rng + ?Sized>(
        &self,
        decoder: &Mlp,
        likelihood: &L,
        x: &DMatrix<f64>,
        z: &mut DMatrix<f64>,
        n_steps: usize,
        rng: &mut R,
    ) -> Result<()> {
        for _ in 0..n_steps {
            self.step(decoder, likelihood, x, z, rng)?;
        }
        Ok(())
    }
}
