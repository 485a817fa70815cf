//! # nmm-latent
//!
//! A latent-variable generative model `z ~ N(0, I)`, `θ = g(z)`,
//! `x | θ ~ p(x | θ)` whose decoder `g` defines a learnable prior over `θ`.
//!
//! Training runs in two phases:
//! - a variational fit (encoder + decoder, negative ELBO, Adam);
//! - a bias-correction fit that moves one persistent latent particle per
//!   observation with Langevin dynamics under the exact posterior and refits
//!   the decoder on those particles.
//!
//! All networks are small dense MLPs on `nalgebra` matrices with analytic
//! backpropagation. Every random draw goes through a caller-supplied
//! [`StdRng`](rand::rngs::StdRng).

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Adam optimiser over flat parameter slices.
pub mod adam;
/// Langevin dynamics on latent particles.
pub mod langevin;
/// Observation models `p(x | θ)`.
pub mod likelihood;
/// The latent model and its [`GenerativeModel`](nmm_core::GenerativeModel) impl.
pub mod model;
/// Dense MLP with softplus hidden activations.
pub mod network;
/// Encoder/decoder architecture specs.
pub mod vae;

pub use adam::Adam;
pub use langevin::Langevin;
pub use likelihood::{ConditionalLikelihood, ConditionalNormal};
pub use model::{LatentModel, ModelOptions, PosteriorSample};
pub use network::{Mlp, MlpGrad, MlpTrace};
pub use vae::{VaeDecoder, VaeEncoder};
