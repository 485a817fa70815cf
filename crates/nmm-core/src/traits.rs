//! Core traits for nmm
//!
//! The simulation driver depends on [`GenerativeModel`], not on a concrete
//! network implementation, so the latent model can be swapped without
//! touching the trial loop.

use nalgebra::DMatrix;
use rand::rngs::StdRng;

use crate::Result;
use crate::types::{
    BiasCorrectionConfig, BiasCorrectionReport, FitConfig, FitReport, LearningRates, ModelState,
    PriorSample,
};

/// Latent-variable generative model with a learnable prior.
///
/// Lifecycle: `Uninitialized -> Initialized -> Fitted -> BiasCorrected`.
/// Every stochastic operation draws from the caller-supplied generator so
/// that a run is fully determined by the seeds of its streams.
pub trait GenerativeModel {
    /// Initialise parameters and optimiser state.
    fn init(&mut self, rates: LearningRates, rng: &mut StdRng) -> Result<()>;

    /// Variational fit on `data` (`n x data_dim`).
    fn fit(&mut self, data: &DMatrix<f64>, config: &FitConfig, rng: &mut StdRng)
    -> Result<FitReport>;

    /// Bias-correction phase; requires a prior [`fit`](Self::fit).
    fn fit_bc(
        &mut self,
        data: &DMatrix<f64>,
        config: &BiasCorrectionConfig,
        rng: &mut StdRng,
    ) -> Result<BiasCorrectionReport>;

    /// Draw `n` samples from the current learned prior.
    fn simulate_prior(&self, n: usize, rng: &mut StdRng) -> Result<PriorSample>;

    /// Current lifecycle state.
    fn state(&self) -> ModelState;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use rand::SeedableRng;

    /// Point-mass prior at a fixed location.
    struct DummyModel {
        state: ModelState,
        location: f64,
    }

    impl GenerativeModel for DummyModel {
        fn init(&mut self, _rates: LearningRates, _rng: &mut StdRng) -> Result<()> {
            self.state = ModelState::Initialized;
            Ok(())
        }

        fn fit(
            &mut self,
            data: &DMatrix<f64>,
            config: &FitConfig,
            _rng: &mut StdRng,
        ) -> Result<FitReport> {
            if self.state < ModelState::Initialized {
                return Err(Error::Validation("fit before init".to_string()));
            }
            self.location = data.mean();
            self.state = ModelState::Fitted;
            Ok(FitReport { epochs: config.epochs, final_loss: 0.0, nll: None })
        }

        fn fit_bc(
            &mut self,
            data: &DMatrix<f64>,
            config: &BiasCorrectionConfig,
            _rng: &mut StdRng,
        ) -> Result<BiasCorrectionReport> {
            self.state = ModelState::BiasCorrected;
            Ok(BiasCorrectionReport {
                epochs: config.epochs,
                final_loss: 0.0,
                nll: None,
                particles: DMatrix::zeros(data.nrows(), 1),
            })
        }

        fn simulate_prior(&self, n: usize, _rng: &mut StdRng) -> Result<PriorSample> {
            Ok(PriorSample {
                mu: DMatrix::from_element(n, 1, self.location),
                z: DMatrix::zeros(n, 1),
            })
        }

        fn state(&self) -> ModelState {
            self.state
        }
    }

    #[test]
    fn test_dummy_lifecycle() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut m = DummyModel { state: ModelState::Uninitialized, location: 0.0 };
        let data = DMatrix::from_row_slice(2, 1, &[1.0, 3.0]);
        assert!(m.fit(&data, &FitConfig::default(), &mut rng).is_err());

        m.init(LearningRates::default(), &mut rng).unwrap();
        m.fit(&data, &FitConfig::default(), &mut rng).unwrap();
        assert_eq!(m.state(), ModelState::Fitted);
        let s = m.simulate_prior(4, &mut rng).unwrap();
        assert_eq!(s.mu_column(0), vec![2.0; 4]);
    }
}
