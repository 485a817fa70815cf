//! # nmm-core
//!
//! Shared building blocks for the normal-means mixture simulation:
//! the error type, configuration and report types, and the
//! [`GenerativeModel`](traits::GenerativeModel) adapter trait that the
//! simulation driver programs against.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::GenerativeModel;
pub use types::{
    BiasCorrectionConfig, BiasCorrectionReport, FitConfig, FitReport, LearningRates, ModelState,
    PriorSample,
};
