use nmm_core::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::network::Mlp;

/// Amortised posterior `q(z | x) = N(m(x), diag(exp(s(x))^2))`.
///
/// `layers` starts with the data width, followed by the hidden widths; the
/// output layer of `2 * latent_dim` units (mean, log-sd) is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaeEncoder {
    /// Input width followed by hidden widths, e.g. `[1, 50, 100, 50]`.
    pub layers: Vec<usize>,
    /// Latent dimension.
    pub latent_dim: usize,
}

/// Generator `θ = g(z)`.
///
/// `layers` lists the hidden widths followed by the data width; the network
/// maps `latent_dim -> hidden... -> data_dim * npar`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaeDecoder {
    /// Hidden widths followed by the data width, e.g. `[50, 100, 50, 1]`.
    pub layers: Vec<usize>,
    /// Latent dimension.
    pub latent_dim: usize,
    /// Likelihood parameters per data dimension.
    pub npar: usize,
}

impl VaeEncoder {
    /// Encoder spec.
    pub fn new(layers: Vec<usize>, latent_dim: usize) -> Self {
        Self { layers, latent_dim }
    }

    /// Data width accepted by the encoder.
    pub fn data_dim(&self) -> usize {
        self.layers.first().copied().unwrap_or(0)
    }

    /// Instantiate the network.
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Mlp> {
        if self.layers.is_empty() || self.latent_dim == 0 {
            return Err(Error::Validation(format!(
                "encoder needs an input width and latent_dim > 0, got layers={:?} latent_dim={}",
                self.layers, self.latent_dim
            )));
        }
        let mut sizes = self.layers.clone();
        sizes.push(2 * self.latent_dim);
        Mlp::new(&sizes, rng)
    }
}

impl VaeDecoder {
    /// Decoder spec.
    pub fn new(layers: Vec<usize>, latent_dim: usize, npar: usize) -> Self {
        Self { layers, latent_dim, npar }
    }

    /// Data width produced by the decoder.
    pub fn data_dim(&self) -> usize {
        self.layers.last().copied().unwrap_or(0)
    }

    /// Instantiate the network.
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Mlp> {
        let Some((&data_dim, hidden)) = self.layers.split_last() else {
            return Err(Error::Validation("decoder needs at least the data width".to_string()));
        };
        if self.latent_dim == 0 || self.npar == 0 {
            return Err(Error::Validation(format!(
                "decoder needs latent_dim > 0 and npar > 0, got latent_dim={} npar={}",
                self.latent_dim, self.npar
            )));
        }
        let mut sizes = Vec::with_capacity(self.layers.len() + 1);
        sizes.push(self.latent_dim);
        sizes.extend_from_slice(hidden);
        sizes.push(data_dim * self.npar);
        Mlp::new(&sizes, rng)
    }
}
