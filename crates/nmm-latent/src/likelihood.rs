use nalgebra::{DMatrix, DVector};
use nmm_core::{Error, Result};
use nmm_prob::normal::LN_SQRT_2PI;

/// Observation model `p(x | θ)` attached to the decoder output.
///
/// `θ` has `data_dim * npar` columns; rows are observations.
pub trait ConditionalLikelihood {
    /// Width of one observation.
    fn data_dim(&self) -> usize;

    /// Number of distribution parameters per data dimension.
    fn npar(&self) -> usize;

    /// Row-wise `log p(x_i | θ_i)`.
    fn log_prob(&self, x: &DMatrix<f64>, theta: &DMatrix<f64>) -> DVector<f64>;

    /// `∂ log p(x | θ) / ∂θ`, same shape as `theta`.
    fn grad_theta(&self, x: &DMatrix<f64>, theta: &DMatrix<f64>) -> DMatrix<f64>;

    /// Location of `x` implied by `θ` (`n x data_dim`).
    fn mean(&self, theta: &DMatrix<f64>) -> DMatrix<f64>;
}

/// `x | θ ~ N(θ, I)`: unit-variance Normal with decoded mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionalNormal {
    dimu: usize,
}

impl ConditionalNormal {
    /// Normal likelihood for `dimu`-dimensional observations.
    pub fn new(dimu: usize) -> Result<Self> {
        if dimu == 0 {
            return Err(Error::Validation("dimu must be > 0".to_string()));
        }
        Ok(Self { dimu })
    }
}

impl ConditionalLikelihood for ConditionalNormal {
    fn data_dim(&self) -> usize {
        self.dimu
    }

    fn npar(&self) -> usize {
        1
    }

    fn log_prob(&self, x: &DMatrix<f64>, theta: &DMatrix<f64>) -> DVector<f64> {
        let d = self.dimu as f64;
        DVector::from_iterator(
            x.nrows(),
            x.row_iter().zip(theta.row_iter()).map(|(xi, ti)| {
                let sq: f64 = xi.iter().zip(ti.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
                -0.5 * sq - d * LN_SQRT_2PI
            }),
        )
    }

    fn grad_theta(&self, x: &DMatrix<f64>, theta: &DMatrix<f64>) -> DMatrix<f64> {
        x - theta
    }

    fn mean(&self, theta: &DMatrix<f64>) -> DMatrix<f64> {
        theta.clone()
    }
}
