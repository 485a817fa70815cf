//! Common data types for nmm

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Learning rates passed to [`GenerativeModel::init`](crate::GenerativeModel::init).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningRates {
    /// Step size of the variational (encoder + decoder) phase.
    pub lr: f64,
    /// Step size of the bias-correction (decoder only) phase.
    pub lr_bc: f64,
}

impl Default for LearningRates {
    fn default() -> Self {
        Self { lr: 0.01, lr_bc: 0.01 }
    }
}

/// Training configuration for the variational fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Number of passes over the data.
    pub epochs: usize,
    /// Minibatch size. `None` means full batch.
    pub batch_size: Option<usize>,
    /// Estimate the marginal negative log-likelihood after training.
    pub eval_nll: bool,
    /// Emit per-epoch progress at `debug` level.
    pub verbose: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self { epochs: 1000, batch_size: None, eval_nll: false, verbose: false }
    }
}

/// Configuration of the bias-correction phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiasCorrectionConfig {
    /// Number of passes over the data.
    pub epochs: usize,
    /// Leading epochs during which only the latent particles move.
    pub warmups: usize,
    /// Minibatch size. `None` means full batch.
    pub batch_size: Option<usize>,
    /// Langevin steps per minibatch before the decoder update.
    pub burnin: usize,
    /// Langevin step size `h`.
    pub step_size: f64,
    /// Estimate the marginal negative log-likelihood after training.
    pub eval_nll: bool,
    /// Emit per-epoch progress at `debug` level.
    pub verbose: bool,
}

impl Default for BiasCorrectionConfig {
    fn default() -> Self {
        Self {
            epochs: 1000,
            warmups: 100,
            batch_size: None,
            burnin: 10,
            step_size: 0.01,
            eval_nll: false,
            verbose: false,
        }
    }
}

/// Lifecycle of a generative model instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelState {
    /// Constructed, parameters not yet initialised.
    Uninitialized,
    /// Parameters initialised, not trained.
    Initialized,
    /// Variational fit completed.
    Fitted,
    /// Bias correction completed.
    BiasCorrected,
}

/// Outcome of [`GenerativeModel::fit`](crate::GenerativeModel::fit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    /// Epochs run.
    pub epochs: usize,
    /// Mean negative ELBO over the last epoch.
    pub final_loss: f64,
    /// Importance-sampled marginal NLL, when requested.
    pub nll: Option<f64>,
}

/// Outcome of [`GenerativeModel::fit_bc`](crate::GenerativeModel::fit_bc).
#[derive(Debug, Clone)]
pub struct BiasCorrectionReport {
    /// Epochs run (warmups included).
    pub epochs: usize,
    /// Mean reconstruction NLL at the particles over the last epoch.
    pub final_loss: f64,
    /// Importance-sampled marginal NLL, when requested.
    pub nll: Option<f64>,
    /// Final latent particles: `nchain` rows per observation, grouped by
    /// observation.
    pub particles: DMatrix<f64>,
}

/// Draws from the learned prior.
#[derive(Debug, Clone)]
pub struct PriorSample {
    /// Decoded means, `n x data_dim`.
    pub mu: DMatrix<f64>,
    /// Latent draws, `n x latent_dim`.
    pub z: DMatrix<f64>,
}

impl PriorSample {
    /// First column of `mu` as a flat vector (the 1-D case).
    pub fn mu_column(&self, j: usize) -> Vec<f64> {
        self.mu.column(j).iter().copied().collect()
    }
}
