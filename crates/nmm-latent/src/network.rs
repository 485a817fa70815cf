//! Dense feed-forward network.
//!
//! Rows are observations: a batch is an `n x in` matrix, layer `l` holds
//! weights `W_l` (`out x in`) and bias `b_l`, and computes
//! `A_l = H_l W_l^T + 1 b_l^T`. Hidden layers apply softplus; the output
//! layer is linear.

use nalgebra::{DMatrix, DVector};
use nmm_core::{Error, Result};
use nmm_prob::math::{sigmoid, softplus};
use rand::Rng;

use crate::adam::Adam;

/// Multilayer perceptron.
#[derive(Debug, Clone)]
pub struct Mlp {
    weights: Vec<DMatrix<f64>>,
    biases: Vec<DVector<f64>>,
}

/// Intermediate values of a forward pass, needed by [`Mlp::backward`].
#[derive(Debug, Clone)]
pub struct MlpTrace {
    /// Input of each layer.
    inputs: Vec<DMatrix<f64>>,
    /// Pre-activation of each layer.
    pre: Vec<DMatrix<f64>>,
}

/// Parameter gradients, laid out like the network.
#[derive(Debug, Clone)]
pub struct MlpGrad {
    /// Weight gradients (`out x in` per layer).
    pub weights: Vec<DMatrix<f64>>,
    /// Bias gradients per layer.
    pub biases: Vec<DVector<f64>>,
}

impl MlpGrad {
    /// Flat views in the same order as [`Mlp::params_mut`].
    pub fn slices(&self) -> Vec<&[f64]> {
        self.weights
            .iter()
            .map(|w| w.as_slice())
            .chain(self.biases.iter().map(|b| b.as_slice()))
            .collect()
    }
}

fn affine(h: &DMatrix<f64>, w: &DMatrix<f64>, b: &DVector<f64>) -> DMatrix<f64> {
    let mut a = h * w.transpose();
    for (mut col, &bj) in a.column_iter_mut().zip(b.iter()) {
        col.add_scalar_mut(bj);
    }
    a
}

impl Mlp {
    /// Build a network with layer widths `sizes` (input first, output last).
    ///
    /// Weights use Xavier-uniform initialisation, biases start at zero.
    pub fn new<R: Rng + ?Sized>(sizes: &[usize], rng: &mut R) -> Result<Self> {
        if sizes.len() < 2 {
            return Err(Error::Validation(format!(
                "network needs at least input and output widths, got {:?}",
                sizes
            )));
        }
        if sizes.contains(&0) {
            return Err(Error::Validation(format!("layer widths must be > 0, got {:?}", sizes)));
        }

        let mut weights = Vec::with_capacity(sizes.len() - 1);
        let mut biases = Vec::with_capacity(sizes.len() - 1);
        for pair in sizes.windows(2) {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
            weights.push(DMatrix::from_fn(fan_out, fan_in, |_, _| rng.random_range(-limit..limit)));
            biases.push(DVector::zeros(fan_out));
        }
        Ok(Self { weights, biases })
    }

    /// Input width.
    pub fn input_dim(&self) -> usize {
        self.weights[0].ncols()
    }

    /// Output width.
    pub fn output_dim(&self) -> usize {
        self.weights[self.weights.len() - 1].nrows()
    }

    /// Number of layers (weight matrices).
    pub fn n_layers(&self) -> usize {
        self.weights.len()
    }

    /// Total number of scalar parameters.
    pub fn n_params(&self) -> usize {
        self.weights.iter().map(|w| w.len()).sum::<usize>()
            + self.biases.iter().map(|b| b.len()).sum::<usize>()
    }

    /// Forward pass without bookkeeping.
    pub fn forward(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        let last = self.weights.len() - 1;
        let mut h = x.clone();
        for (l, (w, b)) in self.weights.iter().zip(&self.biases).enumerate() {
            h = affine(&h, w, b);
            if l < last {
                h.apply(|v| *v = softplus(*v));
            }
        }
        h
    }

    /// Forward pass that records what [`backward`](Self::backward) needs.
    pub fn forward_trace(&self, x: &DMatrix<f64>) -> (DMatrix<f64>, MlpTrace) {
        let last = self.weights.len() - 1;
        let mut inputs = Vec::with_capacity(self.weights.len());
        let mut pre = Vec::with_capacity(self.weights.len());
        let mut h = x.clone();
        for (l, (w, b)) in self.weights.iter().zip(&self.biases).enumerate() {
            let a = affine(&h, w, b);
            inputs.push(h);
            h = if l < last { a.map(softplus) } else { a.clone() };
            pre.push(a);
        }
        (h, MlpTrace { inputs, pre })
    }

    /// Backpropagate `grad_out = dL/d(output)`.
    ///
    /// Returns the parameter gradients and `dL/d(input)`.
    pub fn backward(&self, trace: &MlpTrace, grad_out: &DMatrix<f64>) -> (MlpGrad, DMatrix<f64>) {
        let n_layers = self.weights.len();
        let mut gw = Vec::with_capacity(n_layers);
        let mut gb = Vec::with_capacity(n_layers);
        let mut g = grad_out.clone();
        for l in (0..n_layers).rev() {
            if l + 1 < n_layers {
                g.zip_apply(&trace.pre[l], |gi, a| *gi *= sigmoid(a));
            }
            gw.push(g.transpose() * &trace.inputs[l]);
            gb.push(g.row_sum().transpose());
            g = &g * &self.weights[l];
        }
        gw.reverse();
        gb.reverse();
        (MlpGrad { weights: gw, biases: gb }, g)
    }

    /// `dL/d(input)` only; skips the parameter gradients.
    pub fn backward_input(&self, trace: &MlpTrace, grad_out: &DMatrix<f64>) -> DMatrix<f64> {
        let n_layers = self.weights.len();
        let mut g = grad_out.clone();
        for l in (0..n_layers).rev() {
            if l + 1 < n_layers {
                g.zip_apply(&trace.pre[l], |gi, a| *gi *= sigmoid(a));
            }
            g = &g * &self.weights[l];
        }
        g
    }

    /// Mutable flat views of all parameters: weights first, then biases.
    pub fn params_mut(&mut self) -> Vec<&mut [f64]> {
        let mut out: Vec<&mut [f64]> = Vec::with_capacity(2 * self.weights.len());
        out.extend(self.weights.iter_mut().map(|w| w.as_mut_slice()));
        out.extend(self.biases.iter_mut().map(|b| b.as_mut_slice()));
        out
    }

    /// One optimiser step with precomputed gradients.
    pub fn apply_adam(&mut self, opt: &mut Adam, grad: &MlpGrad) -> Result<()> {
        opt.step(self.params_mut(), &grad.slices())
    }
}
