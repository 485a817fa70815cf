use nalgebra::DMatrix;
use nmm_core::traits::GenerativeModel;
use nmm_core::types::{
    BiasCorrectionConfig, BiasCorrectionReport, FitConfig, FitReport, LearningRates, ModelState,
    PriorSample,
};
use nmm_core::{Error, Result};
use nmm_prob::math::logsumexp;
use nmm_prob::normal::std_logpdf;
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::adam::Adam;
use crate::langevin::Langevin;
use crate::likelihood::{ConditionalLikelihood, ConditionalNormal};
use crate::network::{Mlp, MlpGrad};
use crate::vae::{VaeDecoder, VaeEncoder};

/// Sampling options fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelOptions {
    /// Importance samples per observation when estimating the marginal NLL.
    pub sim_z: usize,
    /// Langevin chains per observation, both in the bias correction and in
    /// [`LatentModel::simulate_posterior`].
    pub nchain: usize,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self { sim_z: 100, nchain: 100 }
    }
}

/// Draws from the latent posterior, `nchain` rows per observation
/// (observation-major).
#[derive(Debug, Clone)]
pub struct PosteriorSample {
    /// Latent particles.
    pub z: DMatrix<f64>,
    /// Decoded means.
    pub mu: DMatrix<f64>,
}

#[derive(Debug, Clone)]
struct Networks {
    encoder: Mlp,
    decoder: Mlp,
    opt_encoder: Adam,
    opt_decoder: Adam,
    opt_bc: Adam,
}

/// Gaussian-latent generative model with a VAE fit and a Langevin bias
/// correction.
#[derive(Debug, Clone)]
pub struct LatentModel<L: ConditionalLikelihood = ConditionalNormal> {
    likelihood: L,
    encoder_spec: VaeEncoder,
    decoder_spec: VaeDecoder,
    options: ModelOptions,
    nets: Option<Networks>,
    state: ModelState,
}

fn standard_normal_matrix<R: Rng + ?Sized>(nrows: usize, ncols: usize, rng: &mut R) -> DMatrix<f64> {
    DMatrix::from_fn(nrows, ncols, |_, _| rng.sample(StandardNormal))
}

/// Row indices of `nchain` consecutive copies of each observation.
fn chain_rows<'a>(obs: impl IntoIterator<Item = &'a usize>, nchain: usize) -> Vec<usize> {
    obs.into_iter().flat_map(|&i| (i * nchain..(i + 1) * nchain)).collect()
}

/// `data` with every row repeated `nchain` times, observation-major.
fn repeat_rows(data: &DMatrix<f64>, nchain: usize) -> DMatrix<f64> {
    let rows: Vec<usize> = (0..data.nrows()).flat_map(|i| std::iter::repeat_n(i, nchain)).collect();
    data.select_rows(rows.iter())
}

/// Mean negative ELBO of a minibatch at fixed reparameterisation noise
/// `eps` (`rows x latent_dim`), with encoder and decoder gradients.
fn neg_elbo<L: ConditionalLikelihood>(
    likelihood: &L,
    encoder: &Mlp,
    decoder: &Mlp,
    xb: &DMatrix<f64>,
    eps: &DMatrix<f64>,
) -> (f64, MlpGrad, MlpGrad) {
    let k = eps.ncols();
    let inv_b = 1.0 / xb.nrows() as f64;

    let (enc_out, enc_trace) = encoder.forward_trace(xb);
    let m = enc_out.columns(0, k).into_owned();
    let log_sd = enc_out.columns(k, k).into_owned();
    let sd = log_sd.map(f64::exp);
    let z = &m + sd.component_mul(eps);

    let (theta, dec_trace) = decoder.forward_trace(&z);
    let log_p = likelihood.log_prob(xb, &theta);

    // KL(N(m, sd^2) || N(0, 1)) summed over latent dims.
    let mut kl = 0.0;
    for ((&mi, &si), &li) in m.iter().zip(sd.iter()).zip(log_sd.iter()) {
        kl += 0.5 * (mi * mi + si * si - 1.0 - 2.0 * li);
    }
    let loss = (kl - log_p.sum()) * inv_b;

    let g_theta = likelihood.grad_theta(xb, &theta) * (-inv_b);
    let (dec_grad, g_z) = decoder.backward(&dec_trace, &g_theta);

    let g_m = &g_z + &m * inv_b;
    let mut g_log_sd = g_z.component_mul(&sd).component_mul(eps);
    g_log_sd.zip_apply(&sd, |g, s| *g += (s * s - 1.0) * inv_b);

    let mut g_enc = DMatrix::<f64>::zeros(xb.nrows(), 2 * k);
    g_enc.columns_mut(0, k).copy_from(&g_m);
    g_enc.columns_mut(k, k).copy_from(&g_log_sd);
    let (enc_grad, _) = encoder.backward(&enc_trace, &g_enc);
    (loss, enc_grad, dec_grad)
}

fn resolve_batch_size(batch_size: Option<usize>, n: usize) -> Result<usize> {
    match batch_size {
        Some(0) => Err(Error::Validation("batch_size must be > 0".to_string())),
        Some(b) => Ok(b.min(n)),
        None => Ok(n),
    }
}

fn progress_stride(epochs: usize) -> usize {
    (epochs / 10).max(1)
}

impl<L: ConditionalLikelihood> LatentModel<L> {
    /// Assemble a model from its parts; checks that the widths line up.
    pub fn new(
        likelihood: L,
        encoder: VaeEncoder,
        decoder: VaeDecoder,
        options: ModelOptions,
    ) -> Result<Self> {
        if encoder.latent_dim != decoder.latent_dim {
            return Err(Error::Validation(format!(
                "encoder latent_dim ({}) != decoder latent_dim ({})",
                encoder.latent_dim, decoder.latent_dim
            )));
        }
        if encoder.data_dim() != likelihood.data_dim() {
            return Err(Error::Validation(format!(
                "encoder input width ({}) != likelihood data_dim ({})",
                encoder.data_dim(),
                likelihood.data_dim()
            )));
        }
        if decoder.data_dim() != likelihood.data_dim() || decoder.npar != likelihood.npar() {
            return Err(Error::Validation(format!(
                "decoder emits {}x{} parameters, likelihood expects {}x{}",
                decoder.data_dim(),
                decoder.npar,
                likelihood.data_dim(),
                likelihood.npar()
            )));
        }
        if options.sim_z == 0 || options.nchain == 0 {
            return Err(Error::Validation("sim_z and nchain must be > 0".to_string()));
        }
        Ok(Self {
            likelihood,
            encoder_spec: encoder,
            decoder_spec: decoder,
            options,
            nets: None,
            state: ModelState::Uninitialized,
        })
    }

    /// Latent dimension.
    pub fn latent_dim(&self) -> usize {
        self.encoder_spec.latent_dim
    }

    /// Sampling options.
    pub fn options(&self) -> ModelOptions {
        self.options
    }

    fn nets(&self) -> Result<&Networks> {
        self.nets
            .as_ref()
            .ok_or_else(|| Error::Validation("model used before init()".to_string()))
    }

    fn check_data(&self, data: &DMatrix<f64>) -> Result<()> {
        if data.nrows() == 0 {
            return Err(Error::Validation("data must have at least one row".to_string()));
        }
        if data.ncols() != self.likelihood.data_dim() {
            return Err(Error::Validation(format!(
                "data has {} columns, model expects {}",
                data.ncols(),
                self.likelihood.data_dim()
            )));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(Error::Validation("data contains non-finite values".to_string()));
        }
        Ok(())
    }

    /// Encoder output split into mean and log-sd blocks.
    fn encode(&self, encoder: &Mlp, x: &DMatrix<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
        let k = self.latent_dim();
        let out = encoder.forward(x);
        (out.columns(0, k).into_owned(), out.columns(k, k).into_owned())
    }

    /// One reparameterised draw per row from `q(z | x)`.
    fn sample_q<R: Rng + ?Sized>(&self, encoder: &Mlp, x: &DMatrix<f64>, rng: &mut R) -> DMatrix<f64> {
        let (m, log_sd) = self.encode(encoder, x);
        let eps = standard_normal_matrix(m.nrows(), m.ncols(), rng);
        m + log_sd.map(f64::exp).component_mul(&eps)
    }

    /// One Adam step on a minibatch; returns its mean negative ELBO.
    fn elbo_step<R: Rng + ?Sized>(&mut self, xb: &DMatrix<f64>, rng: &mut R) -> Result<f64> {
        let eps = standard_normal_matrix(xb.nrows(), self.latent_dim(), rng);
        let likelihood = &self.likelihood;
        let nets = self
            .nets
            .as_mut()
            .ok_or_else(|| Error::Validation("model used before init()".to_string()))?;

        let (loss, enc_grad, dec_grad) = neg_elbo(likelihood, &nets.encoder, &nets.decoder, xb, &eps);
        if !loss.is_finite() {
            return Err(Error::Computation(format!("VAE loss is not finite ({})", loss)));
        }
        nets.decoder.apply_adam(&mut nets.opt_decoder, &dec_grad)?;
        nets.encoder.apply_adam(&mut nets.opt_encoder, &enc_grad)?;
        Ok(loss)
    }

    /// Importance-sampled estimate of `-mean_i log p(x_i)` using `sim_z`
    /// draws from `q(z | x_i)` per observation.
    pub fn marginal_nll<R: Rng + ?Sized>(&self, data: &DMatrix<f64>, rng: &mut R) -> Result<f64> {
        self.check_data(data)?;
        let nets = self.nets()?;
        let k = self.latent_dim();
        let n_is = self.options.sim_z;
        let (m, log_sd) = self.encode(&nets.encoder, data);

        let mut total = 0.0;
        let mut log_w = vec![0.0; n_is];
        for i in 0..data.nrows() {
            let eps = standard_normal_matrix(n_is, k, rng);
            let mut z = eps.clone();
            for (j, mut col) in z.column_iter_mut().enumerate() {
                let (mj, sj) = (m[(i, j)], log_sd[(i, j)].exp());
                col.apply(|v| *v = mj + sj * *v);
            }
            let xi = DMatrix::from_fn(n_is, data.ncols(), |_, c| data[(i, c)]);
            let theta = nets.decoder.forward(&z);
            let log_p = self.likelihood.log_prob(&xi, &theta);
            for (r, w) in log_w.iter_mut().enumerate() {
                let mut log_prior = 0.0;
                let mut log_q = 0.0;
                for j in 0..k {
                    log_prior += std_logpdf(z[(r, j)]);
                    log_q += std_logpdf(eps[(r, j)]) - log_sd[(i, j)];
                }
                *w = log_p[r] + log_prior - log_q;
            }
            total -= logsumexp(&log_w) - (n_is as f64).ln();
        }
        let nll = total / data.nrows() as f64;
        if !nll.is_finite() {
            return Err(Error::Computation(format!("marginal NLL is not finite ({})", nll)));
        }
        Ok(nll)
    }

    /// Run `nchain` Langevin chains per observation for `n_steps` steps,
    /// each started from a draw of `q(z | x)`.
    pub fn simulate_posterior<R: Rng + ?Sized>(
        &self,
        data: &DMatrix<f64>,
        n_steps: usize,
        step_size: f64,
        rng: &mut R,
    ) -> Result<PosteriorSample> {
        if self.state < ModelState::Fitted {
            return Err(Error::Validation("simulate_posterior() requires a fitted model".to_string()));
        }
        self.check_data(data)?;
        let nets = self.nets()?;
        let sampler = Langevin::new(step_size)?;

        let x_rep = repeat_rows(data, self.options.nchain);
        let mut z = self.sample_q(&nets.encoder, &x_rep, rng);
        sampler.run(&nets.decoder, &self.likelihood, &x_rep, &mut z, n_steps, rng)?;
        let mu = self.likelihood.mean(&nets.decoder.forward(&z));
        Ok(PosteriorSample { z, mu })
    }
}

impl LatentModel<ConditionalNormal> {
    /// Default architecture for scalar data: encoder `[1, 50, 100, 50]`,
    /// decoder `[50, 100, 50, 1]`, one latent dimension.
    pub fn scalar_default(options: ModelOptions) -> Result<Self> {
        Self::new(
            ConditionalNormal::new(1)?,
            VaeEncoder::new(vec![1, 50, 100, 50], 1),
            VaeDecoder::new(vec![50, 100, 50, 1], 1, 1),
            options,
        )
    }
}

impl<L: ConditionalLikelihood> GenerativeModel for LatentModel<L> {
    fn init(&mut self, rates: LearningRates, rng: &mut StdRng) -> Result<()> {
        let encoder = self.encoder_spec.build(rng)?;
        let decoder = self.decoder_spec.build(rng)?;
        self.nets = Some(Networks {
            encoder,
            decoder,
            opt_encoder: Adam::new(rates.lr)?,
            opt_decoder: Adam::new(rates.lr)?,
            opt_bc: Adam::new(rates.lr_bc)?,
        });
        self.state = ModelState::Initialized;
        Ok(())
    }

    fn fit(
        &mut self,
        data: &DMatrix<f64>,
        config: &FitConfig,
        rng: &mut StdRng,
    ) -> Result<FitReport> {
        if self.state < ModelState::Initialized {
            return Err(Error::Validation("fit() called before init()".to_string()));
        }
        self.check_data(data)?;
        let n = data.nrows();
        let batch_size = resolve_batch_size(config.batch_size, n)?;
        let stride = progress_stride(config.epochs);

        let mut idx: Vec<usize> = (0..n).collect();
        let mut final_loss = f64::NAN;
        for epoch in 0..config.epochs {
            idx.shuffle(rng);
            let mut epoch_loss = 0.0;
            for batch in idx.chunks(batch_size) {
                let xb = data.select_rows(batch.iter());
                epoch_loss += self.elbo_step(&xb, rng)? * batch.len() as f64;
            }
            final_loss = epoch_loss / n as f64;
            if config.verbose && (epoch + 1) % stride == 0 {
                tracing::debug!(epoch = epoch + 1, loss = final_loss, "vae epoch");
            }
        }

        self.state = ModelState::Fitted;
        let nll = if config.eval_nll { Some(self.marginal_nll(data, rng)?) } else { None };
        Ok(FitReport { epochs: config.epochs, final_loss, nll })
    }

    fn fit_bc(
        &mut self,
        data: &DMatrix<f64>,
        config: &BiasCorrectionConfig,
        rng: &mut StdRng,
    ) -> Result<BiasCorrectionReport> {
        if self.state < ModelState::Fitted {
            return Err(Error::Validation("fit_bc() called before fit()".to_string()));
        }
        if config.warmups > config.epochs {
            return Err(Error::Validation(format!(
                "warmups ({}) must not exceed epochs ({})",
                config.warmups, config.epochs
            )));
        }
        self.check_data(data)?;
        let sampler = Langevin::new(config.step_size)?;
        let n = data.nrows();
        let batch_size = resolve_batch_size(config.batch_size, n)?;
        let stride = progress_stride(config.epochs);

        let nchain = self.options.nchain;
        let x_rep = repeat_rows(data, nchain);
        let mut particles = {
            let nets = self.nets()?;
            self.sample_q(&nets.encoder, &x_rep, rng)
        };

        let likelihood = &self.likelihood;
        let nets = self
            .nets
            .as_mut()
            .ok_or_else(|| Error::Validation("model used before init()".to_string()))?;

        let mut idx: Vec<usize> = (0..n).collect();
        let mut final_loss = f64::NAN;
        for epoch in 0..config.epochs {
            idx.shuffle(rng);
            let mut epoch_loss = 0.0;
            for batch in idx.chunks(batch_size) {
                let rows = chain_rows(batch, nchain);
                let xb = x_rep.select_rows(rows.iter());
                let mut zb = particles.select_rows(rows.iter());
                sampler.run(&nets.decoder, likelihood, &xb, &mut zb, config.burnin, rng)?;
                for (r, &i) in rows.iter().enumerate() {
                    particles.row_mut(i).copy_from(&zb.row(r));
                }

                let (theta, trace) = nets.decoder.forward_trace(&zb);
                let loss = -likelihood.log_prob(&xb, &theta).mean();
                if !loss.is_finite() {
                    return Err(Error::Computation(format!(
                        "bias-correction loss is not finite ({})",
                        loss
                    )));
                }
                epoch_loss += loss * batch.len() as f64;

                if epoch >= config.warmups {
                    let g_theta = likelihood.grad_theta(&xb, &theta) * (-1.0 / rows.len() as f64);
                    let (grad, _) = nets.decoder.backward(&trace, &g_theta);
                    nets.decoder.apply_adam(&mut nets.opt_bc, &grad)?;
                }
            }
            final_loss = epoch_loss / n as f64;
            if config.verbose && (epoch + 1) % stride == 0 {
                tracing::debug!(
                    epoch = epoch + 1,
                    loss = final_loss,
                    warmup = epoch < config.warmups,
                    "bias-correction epoch"
                );
            }
        }

        self.state = ModelState::BiasCorrected;
        let nll = if config.eval_nll { Some(self.marginal_nll(data, rng)?) } else { None };
        Ok(BiasCorrectionReport { epochs: config.epochs, final_loss, nll, particles })
    }

    fn simulate_prior(&self, n: usize, rng: &mut StdRng) -> Result<PriorSample> {
        let nets = self.nets()?;
        let z = standard_normal_matrix(n, self.latent_dim(), rng);
        let mu = self.likelihood.mean(&nets.decoder.forward(&z));
        Ok(PriorSample { mu, z })
    }

    fn state(&self) -> ModelState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nmm_prob::math::{mean, variance};
    use rand::SeedableRng;

    fn small_model() -> LatentModel {
        LatentModel::new(
            ConditionalNormal::new(1).unwrap(),
            VaeEncoder::new(vec![1, 8], 1),
            VaeDecoder::new(vec![8, 1], 1, 1),
            ModelOptions { sim_z: 20, nchain: 3 },
        )
        .unwrap()
    }

    fn shifted_data(n: usize, shift: f64, rng: &mut StdRng) -> DMatrix<f64> {
        DMatrix::from_fn(n, 1, |_, _| shift + rng.sample::<f64, _>(StandardNormal))
    }

    #[test]
    fn test_construction_checks_widths() {
        let lik = ConditionalNormal::new(1).unwrap();
        let opts = ModelOptions::default();
        assert!(
            LatentModel::new(lik, VaeEncoder::new(vec![2, 4], 1), VaeDecoder::new(vec![4, 1], 1, 1), opts)
                .is_err()
        );
        assert!(
            LatentModel::new(lik, VaeEncoder::new(vec![1, 4], 2), VaeDecoder::new(vec![4, 1], 1, 1), opts)
                .is_err()
        );
        assert!(
            LatentModel::new(lik, VaeEncoder::new(vec![1, 4], 1), VaeDecoder::new(vec![4, 1], 1, 2), opts)
                .is_err()
        );
        assert!(LatentModel::scalar_default(opts).is_ok());
    }

    #[test]
    fn test_elbo_gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(13);
        let lik = ConditionalNormal::new(1).unwrap();
        let encoder = VaeEncoder::new(vec![1, 5], 1).build(&mut rng).unwrap();
        let decoder = VaeDecoder::new(vec![4, 1], 1, 1).build(&mut rng).unwrap();
        let xb = DMatrix::from_row_slice(4, 1, &[-0.8, 0.2, 1.5, 3.1]);
        let eps = DMatrix::from_row_slice(4, 1, &[0.3, -1.1, 0.7, 0.05]);

        let (_, enc_grad, dec_grad) = neg_elbo(&lik, &encoder, &decoder, &xb, &eps);
        let h = 1e-6;

        for (slot, g) in enc_grad.slices().iter().enumerate() {
            for k in 0..g.len() {
                let mut plus = encoder.clone();
                plus.params_mut()[slot][k] += h;
                let mut minus = encoder.clone();
                minus.params_mut()[slot][k] -= h;
                let fd = (neg_elbo(&lik, &plus, &decoder, &xb, &eps).0
                    - neg_elbo(&lik, &minus, &decoder, &xb, &eps).0)
                    / (2.0 * h);
                assert_relative_eq!(fd, g[k], epsilon = 1e-6, max_relative = 1e-4);
            }
        }

        for (slot, g) in dec_grad.slices().iter().enumerate() {
            for k in 0..g.len() {
                let mut plus = decoder.clone();
                plus.params_mut()[slot][k] += h;
                let mut minus = decoder.clone();
                minus.params_mut()[slot][k] -= h;
                let fd = (neg_elbo(&lik, &encoder, &plus, &xb, &eps).0
                    - neg_elbo(&lik, &encoder, &minus, &xb, &eps).0)
                    / (2.0 * h);
                assert_relative_eq!(fd, g[k], epsilon = 1e-6, max_relative = 1e-4);
            }
        }
    }

    #[test]
    fn test_lifecycle_order_is_enforced() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut model = small_model();
        let data = shifted_data(20, 0.0, &mut rng);
        assert_eq!(model.state(), ModelState::Uninitialized);
        assert!(model.fit(&data, &FitConfig::default(), &mut rng).is_err());
        assert!(model.simulate_prior(5, &mut rng).is_err());

        model.init(LearningRates::default(), &mut rng).unwrap();
        assert!(model.fit_bc(&data, &BiasCorrectionConfig::default(), &mut rng).is_err());
        assert!(model.simulate_posterior(&data, 1, 0.01, &mut rng).is_err());
        assert_eq!(model.simulate_prior(5, &mut rng).unwrap().mu.nrows(), 5);
    }

    #[test]
    fn test_fit_reduces_loss_and_recovers_location() {
        let mut rng = StdRng::seed_from_u64(5);
        let data = shifted_data(200, 3.0, &mut rng);
        let mut model = small_model();
        model.init(LearningRates { lr: 0.02, lr_bc: 0.01 }, &mut rng).unwrap();

        let short = FitConfig { epochs: 1, batch_size: Some(50), eval_nll: false, verbose: false };
        let first = model.fit(&data, &short, &mut rng).unwrap();
        let long = FitConfig { epochs: 300, batch_size: Some(50), eval_nll: true, verbose: true };
        let last = model.fit(&data, &long, &mut rng).unwrap();
        assert!(last.final_loss < first.final_loss, "{} !< {}", last.final_loss, first.final_loss);
        assert_eq!(model.state(), ModelState::Fitted);
        let nll = last.nll.unwrap();
        assert!(nll.is_finite() && nll > 0.0);

        let prior = model.simulate_prior(2000, &mut rng).unwrap();
        let mu = prior.mu_column(0);
        assert!((mean(&mu) - 3.0).abs() < 0.5, "prior mean {}", mean(&mu));
    }

    #[test]
    fn test_bias_correction_runs_and_moves_state() {
        let mut rng = StdRng::seed_from_u64(9);
        let data = shifted_data(60, -1.0, &mut rng);
        let mut model = small_model();
        model.init(LearningRates::default(), &mut rng).unwrap();
        model
            .fit(&data, &FitConfig { epochs: 20, batch_size: None, eval_nll: false, verbose: false }, &mut rng)
            .unwrap();

        let bad = BiasCorrectionConfig { epochs: 2, warmups: 3, ..Default::default() };
        assert!(model.fit_bc(&data, &bad, &mut rng).is_err());

        let cfg = BiasCorrectionConfig {
            epochs: 10,
            warmups: 2,
            batch_size: Some(16),
            burnin: 3,
            step_size: 0.01,
            eval_nll: true,
            verbose: false,
        };
        let report = model.fit_bc(&data, &cfg, &mut rng).unwrap();
        assert_eq!(model.state(), ModelState::BiasCorrected);
        assert_eq!((report.particles.nrows(), report.particles.ncols()), (60 * 3, 1));
        assert!(report.final_loss.is_finite());
        assert!(report.nll.unwrap().is_finite());

        let post = model.simulate_posterior(&data, 5, 0.01, &mut rng).unwrap();
        assert_eq!(post.z.nrows(), 60 * 3);
        assert_eq!(post.mu.nrows(), 60 * 3);
    }

    fn bias_corrected_prior(nchain: usize) -> (BiasCorrectionReport, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(31);
        let data = shifted_data(25, 1.5, &mut rng);
        let mut model = LatentModel::new(
            ConditionalNormal::new(1).unwrap(),
            VaeEncoder::new(vec![1, 8], 1),
            VaeDecoder::new(vec![8, 1], 1, 1),
            ModelOptions { sim_z: 5, nchain },
        )
        .unwrap();
        model.init(LearningRates::default(), &mut rng).unwrap();
        model
            .fit(&data, &FitConfig { epochs: 5, batch_size: None, eval_nll: false, verbose: false }, &mut rng)
            .unwrap();
        let cfg = BiasCorrectionConfig { epochs: 6, warmups: 1, burnin: 2, ..Default::default() };
        let report = model.fit_bc(&data, &cfg, &mut rng).unwrap();
        let prior = model.simulate_prior(20, &mut rng).unwrap().mu_column(0);
        (report, prior)
    }

    #[test]
    fn test_bias_correction_runs_nchain_chains_per_observation() {
        let (one, prior_one) = bias_corrected_prior(1);
        let (four, prior_four) = bias_corrected_prior(4);
        assert_eq!(one.particles.nrows(), 25);
        assert_eq!(four.particles.nrows(), 25 * 4);
        assert!(four.final_loss.is_finite());
        assert_ne!(prior_one, prior_four);
    }

    #[test]
    fn test_chain_rows_are_observation_major() {
        assert_eq!(chain_rows(&[2, 0], 3), vec![6, 7, 8, 0, 1, 2]);
        let data = DMatrix::from_row_slice(2, 1, &[1.0, 2.0]);
        assert_eq!(repeat_rows(&data, 2).as_slice(), &[1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_warmup_only_leaves_decoder_untouched() {
        let mut rng = StdRng::seed_from_u64(21);
        let data = shifted_data(30, 1.0, &mut rng);
        let mut model = small_model();
        model.init(LearningRates::default(), &mut rng).unwrap();
        model
            .fit(&data, &FitConfig { epochs: 5, batch_size: None, eval_nll: false, verbose: false }, &mut rng)
            .unwrap();

        let z = DMatrix::from_row_slice(3, 1, &[-1.0, 0.0, 1.0]);
        let before = model.nets().unwrap().decoder.forward(&z);
        let cfg = BiasCorrectionConfig { epochs: 4, warmups: 4, burnin: 2, ..Default::default() };
        model.fit_bc(&data, &cfg, &mut rng).unwrap();
        let after = model.nets().unwrap().decoder.forward(&z);
        assert_eq!(before, after);
    }

    #[test]
    fn test_same_seed_same_prior_draws() {
        let run = || {
            let mut rng = StdRng::seed_from_u64(77);
            let data = shifted_data(40, 2.0, &mut rng);
            let mut model = small_model();
            model.init(LearningRates::default(), &mut rng).unwrap();
            model
                .fit(&data, &FitConfig { epochs: 10, batch_size: Some(8), eval_nll: false, verbose: false }, &mut rng)
                .unwrap();
            model.simulate_prior(50, &mut rng).unwrap().mu_column(0)
        };
        let a = run();
        let b = run();
        assert_eq!(a, b);
        assert!(variance(&a) >= 0.0);
    }
}
