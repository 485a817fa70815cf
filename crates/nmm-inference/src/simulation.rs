//! Monte Carlo driver for prior recovery.
//!
//! Each trial draws a fresh ground-truth prior sample and a fresh dataset,
//! fits the empirical Bayes estimate and a freshly constructed generative
//! model (variational fit, then bias correction), scores every estimate
//! against the truth and writes one row per estimate into the result
//! tables.
//!
//! Trials run strictly one after another. Randomness flows through two
//! explicit streams owned by the driver: the data stream (generator and
//! empirical Bayes) and the model stream (initialisation, training,
//! sampling). A trial's output depends only on the state of both streams
//! when it starts.

use std::path::Path;
use std::time::Instant;

use nalgebra::DMatrix;
use ndarray::{Array2, ArrayView1};
use nmm_core::traits::GenerativeModel;
use nmm_core::types::{BiasCorrectionConfig, FitConfig, LearningRates};
use nmm_core::{Error, Result};
use nmm_latent::{ConditionalNormal, LatentModel, ModelOptions, VaeDecoder, VaeEncoder};
use nmm_prob::MixtureParams;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::data::generate_mixture;
use crate::empirical_bayes::EmpiricalBayes;
use crate::gof::{ks_test, wasserstein_distance};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Architecture and optimiser settings of the per-trial model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Encoder hidden widths.
    pub encoder_hidden: Vec<usize>,
    /// Decoder hidden widths.
    pub decoder_hidden: Vec<usize>,
    /// Latent dimension.
    pub latent_dim: usize,
    /// Importance samples per observation for NLL estimates.
    pub sim_z: usize,
    /// Langevin chains per observation in the bias correction.
    pub nchain: usize,
    /// Learning rate of the variational fit.
    pub lr: f64,
    /// Learning rate of the bias correction.
    pub lr_bc: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            encoder_hidden: vec![50, 100, 50],
            decoder_hidden: vec![50, 100, 50],
            latent_dim: 1,
            sim_z: 100,
            nchain: 100,
            lr: 0.01,
            lr_bc: 0.01,
        }
    }
}

impl ModelConfig {
    /// Learning rates for [`GenerativeModel::init`].
    pub fn rates(&self) -> LearningRates {
        LearningRates { lr: self.lr, lr_bc: self.lr_bc }
    }

    /// Fresh, uninitialised latent model for scalar observations.
    pub fn build(&self) -> Result<LatentModel> {
        let mut enc_layers = Vec::with_capacity(self.encoder_hidden.len() + 1);
        enc_layers.push(1);
        enc_layers.extend_from_slice(&self.encoder_hidden);
        let mut dec_layers = self.decoder_hidden.clone();
        dec_layers.push(1);

        LatentModel::new(
            ConditionalNormal::new(1)?,
            VaeEncoder::new(enc_layers, self.latent_dim),
            VaeDecoder::new(dec_layers, self.latent_dim, 1),
            ModelOptions { sim_z: self.sim_z, nchain: self.nchain },
        )
    }
}

/// Full simulation configuration. Missing JSON fields take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed of the data stream.
    pub seed: u64,
    /// Seed of the model stream.
    pub model_seed: u64,
    /// Observations per trial.
    pub n: usize,
    /// Number of trials.
    pub n_sim: usize,
    /// Size of every prior sample (truth and estimates).
    pub est_nsamp: usize,
    /// True prior.
    pub mixture: MixtureParams,
    /// Per-trial model.
    pub model: ModelConfig,
    /// Variational fit.
    pub fit: FitConfig,
    /// Bias correction.
    pub bias_correction: BiasCorrectionConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 123,
            model_seed: 123,
            n: 1000,
            n_sim: 100,
            est_nsamp: 5000,
            mixture: MixtureParams::default(),
            model: ModelConfig::default(),
            fit: FitConfig::default(),
            bias_correction: BiasCorrectionConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Load from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Reject configurations the driver cannot run.
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [("n", self.n), ("n_sim", self.n_sim), ("est_nsamp", self.est_nsamp)] {
            if v == 0 {
                return Err(Error::Validation(format!("{} must be > 0", name)));
            }
        }
        self.mixture.validate()?;

        let m = &self.model;
        if m.latent_dim == 0 || m.sim_z == 0 || m.nchain == 0 {
            return Err(Error::Validation("latent_dim, sim_z and nchain must be > 0".to_string()));
        }
        for (name, lr) in [("lr", m.lr), ("lr_bc", m.lr_bc)] {
            if !lr.is_finite() || lr <= 0.0 {
                return Err(Error::Validation(format!("{} must be finite and > 0, got {}", name, lr)));
            }
        }

        if self.fit.epochs == 0 || self.bias_correction.epochs == 0 {
            return Err(Error::Validation("epochs must be > 0".to_string()));
        }
        if self.fit.batch_size == Some(0) || self.bias_correction.batch_size == Some(0) {
            return Err(Error::Validation("batch_size must be > 0".to_string()));
        }
        let bc = &self.bias_correction;
        if bc.warmups > bc.epochs {
            return Err(Error::Validation(format!(
                "warmups ({}) must not exceed epochs ({})",
                bc.warmups, bc.epochs
            )));
        }
        if !bc.step_size.is_finite() || bc.step_size <= 0.0 {
            return Err(Error::Validation(format!(
                "step_size must be finite and > 0, got {}",
                bc.step_size
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Goodness of fit of one estimated prior sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimateFit {
    /// KS statistic against the true mixture CDF.
    pub ks_statistic: f64,
    /// KS p-value.
    pub ks_pvalue: f64,
    /// Wasserstein distance to the ground-truth sample.
    pub wasserstein: f64,
}

/// Per-trial diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSummary {
    /// Trial index.
    pub trial: usize,
    /// Variational estimate.
    pub vae: EstimateFit,
    /// Bias-corrected estimate.
    pub bc: EstimateFit,
    /// Empirical Bayes estimate.
    pub eb: EstimateFit,
    /// Final negative ELBO of the variational fit.
    pub vae_loss: f64,
    /// Final reconstruction NLL of the bias correction.
    pub bc_loss: f64,
    /// Wall time of the trial in seconds.
    pub wall_s: f64,
}

/// Accumulated output: one row per trial, `est_nsamp` columns.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    /// Ground-truth prior draws.
    pub mu0_dat: Array2<f64>,
    /// Prior draws from the variational fit.
    pub mu_est_vae_dat: Array2<f64>,
    /// Prior draws after bias correction.
    pub mu_est_bc_dat: Array2<f64>,
    /// Prior draws from the empirical Bayes estimate.
    pub mu_est_eb_dat: Array2<f64>,
    /// Diagnostics, one entry per trial.
    pub trials: Vec<TrialSummary>,
}

impl SimulationResult {
    /// Archive keys, in storage order.
    pub const KEYS: [&'static str; 4] = ["mu0_dat", "mu_est_vae_dat", "mu_est_bc_dat", "mu_est_eb_dat"];

    fn zeros(n_sim: usize, est_nsamp: usize) -> Self {
        Self {
            mu0_dat: Array2::zeros((n_sim, est_nsamp)),
            mu_est_vae_dat: Array2::zeros((n_sim, est_nsamp)),
            mu_est_bc_dat: Array2::zeros((n_sim, est_nsamp)),
            mu_est_eb_dat: Array2::zeros((n_sim, est_nsamp)),
            trials: Vec::with_capacity(n_sim),
        }
    }

    /// `(n_sim, est_nsamp)`.
    pub fn shape(&self) -> (usize, usize) {
        self.mu0_dat.dim()
    }

    /// The four tables paired with their archive keys.
    pub fn arrays(&self) -> [(&'static str, &Array2<f64>); 4] {
        [
            (Self::KEYS[0], &self.mu0_dat),
            (Self::KEYS[1], &self.mu_est_vae_dat),
            (Self::KEYS[2], &self.mu_est_bc_dat),
            (Self::KEYS[3], &self.mu_est_eb_dat),
        ]
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Where the driver is in the trial loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not started.
    Start,
    /// Drawing truth, data and the empirical Bayes estimate.
    Generating,
    /// Variational fit.
    FittingVae,
    /// Scoring the variational estimate.
    EvaluatingVae,
    /// Bias correction.
    FittingBc,
    /// Scoring the bias-corrected estimate.
    EvaluatingBc,
    /// Writing result rows.
    Recording,
    /// Between trials.
    NextTrial,
    /// All trials recorded.
    Done,
}

struct TrialOutput {
    mu0: Vec<f64>,
    vae: Vec<f64>,
    bc: Vec<f64>,
    eb: Vec<f64>,
    summary: TrialSummary,
}

/// Sequential trial loop.
pub struct SimulationDriver {
    config: SimulationConfig,
    data_rng: StdRng,
    model_rng: StdRng,
    phase: Phase,
}

impl SimulationDriver {
    /// Validate `config` and seed both random streams.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let data_rng = StdRng::seed_from_u64(config.seed);
        let model_rng = StdRng::seed_from_u64(config.model_seed);
        Ok(Self { config, data_rng, model_rng, phase: Phase::Start })
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Configuration in use.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    fn enter(&mut self, trial: usize, phase: Phase) {
        tracing::debug!(trial, phase = ?phase, "phase");
        self.phase = phase;
    }

    /// Run all trials with the native [`LatentModel`].
    pub fn run(&mut self) -> Result<SimulationResult> {
        self.run_with(ModelConfig::build)
    }

    /// Run all trials, building each trial's model with `factory`.
    ///
    /// Any error aborts the run; no partial result is returned.
    pub fn run_with<M, F>(&mut self, mut factory: F) -> Result<SimulationResult>
    where
        M: GenerativeModel,
        F: FnMut(&ModelConfig) -> Result<M>,
    {
        if self.phase != Phase::Start {
            return Err(Error::Validation("simulation driver can only run once".to_string()));
        }
        let (n_sim, est_nsamp) = (self.config.n_sim, self.config.est_nsamp);
        let mut result = SimulationResult::zeros(n_sim, est_nsamp);

        for i in 0..n_sim {
            let out = self.run_trial(i, &mut factory)?;

            self.enter(i, Phase::Recording);
            for (table, row) in [
                (&mut result.mu0_dat, &out.mu0),
                (&mut result.mu_est_vae_dat, &out.vae),
                (&mut result.mu_est_bc_dat, &out.bc),
                (&mut result.mu_est_eb_dat, &out.eb),
            ] {
                if row.len() != est_nsamp {
                    return Err(Error::Computation(format!(
                        "trial {} produced {} draws, expected {}",
                        i,
                        row.len(),
                        est_nsamp
                    )));
                }
                table.row_mut(i).assign(&ArrayView1::from(row.as_slice()));
            }
            tracing::info!("===> Simulation {} finished in {} seconds\n", i, out.summary.wall_s);
            result.trials.push(out.summary);
            self.enter(i, Phase::NextTrial);
        }

        self.enter(n_sim, Phase::Done);
        Ok(result)
    }

    fn evaluate(&self, truth: &[f64], estimate: &[f64]) -> Result<EstimateFit> {
        let mixture = self.config.mixture;
        let ks = ks_test(estimate, |x| mixture.cdf(x))?;
        let wasserstein = wasserstein_distance(truth, estimate)?;
        Ok(EstimateFit { ks_statistic: ks.statistic, ks_pvalue: ks.pvalue, wasserstein })
    }

    fn log_fit(fit: &EstimateFit) {
        tracing::info!("        => KS = {}, p-val = {}", fit.ks_statistic, fit.ks_pvalue);
        tracing::info!("        => W = {}\n", fit.wasserstein);
    }

    fn run_trial<M, F>(&mut self, i: usize, factory: &mut F) -> Result<TrialOutput>
    where
        M: GenerativeModel,
        F: FnMut(&ModelConfig) -> Result<M>,
    {
        tracing::info!("===> Simulation {}\n", i);
        let t0 = Instant::now();
        let (n, est_nsamp) = (self.config.n, self.config.est_nsamp);
        let mixture = self.config.mixture;

        self.enter(i, Phase::Generating);
        let mu0 = generate_mixture(est_nsamp, &mixture, &mut self.data_rng)?.mu;
        let data = generate_mixture(n, &mixture, &mut self.data_rng)?;
        let eb_est = EmpiricalBayes::estimate(&data.x)?;
        let eb = eb_est.sample(est_nsamp, &mut self.data_rng)?;
        let eb_fit = self.evaluate(&mu0, &eb)?;
        tracing::debug!(
            trial = i,
            mean = eb_est.mean,
            variance = eb_est.variance,
            ks = eb_fit.ks_statistic,
            w = eb_fit.wasserstein,
            "empirical Bayes"
        );

        let xt = DMatrix::from_column_slice(n, 1, &data.x);
        let mut model = factory(&self.config.model)?;
        model.init(self.config.model.rates(), &mut self.model_rng)?;

        tracing::info!("     => VAE");
        self.enter(i, Phase::FittingVae);
        let vae_report = model.fit(&xt, &self.config.fit, &mut self.model_rng)?;
        self.enter(i, Phase::EvaluatingVae);
        let vae = model.simulate_prior(est_nsamp, &mut self.model_rng)?.mu_column(0);
        let vae_fit = self.evaluate(&mu0, &vae)?;
        Self::log_fit(&vae_fit);

        tracing::info!("     => Bias correction");
        self.enter(i, Phase::FittingBc);
        let bc_report = model.fit_bc(&xt, &self.config.bias_correction, &mut self.model_rng)?;
        self.enter(i, Phase::EvaluatingBc);
        let bc = model.simulate_prior(est_nsamp, &mut self.model_rng)?.mu_column(0);
        let bc_fit = self.evaluate(&mu0, &bc)?;
        Self::log_fit(&bc_fit);

        let summary = TrialSummary {
            trial: i,
            vae: vae_fit,
            bc: bc_fit,
            eb: eb_fit,
            vae_loss: vae_report.final_loss,
            bc_loss: bc_report.final_loss,
            wall_s: t0.elapsed().as_secs_f64(),
        };
        Ok(TrialOutput { mu0, vae, bc, eb, summary })
    }
}

/// Run the full study with the native latent model.
pub fn run_simulation(config: &SimulationConfig) -> Result<SimulationResult> {
    SimulationDriver::new(config.clone())?.run()
}
