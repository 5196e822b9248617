//! Variational inference of latent Gaussian-process trajectories from
//! multivariate spike-count data.
//!
//! Each channel's log rate is a linear read-out of shared latent
//! trajectories plus an autoregressive spike-history regression; the
//! observations are Poisson counts and each latent carries a
//! squared-exponential GP prior over the time grid.
//!
//! Inference maximizes the evidence lower bound by block-coordinate damped
//! Newton over the regression coefficients, the loadings, and the Gaussian
//! posterior mean, with a closed-form Woodbury update of the posterior
//! covariance and optional hyperparameter adaptation. Every iterative step
//! is accepted or rolled back against the previous iteration's bound, so
//! the recorded trace never decreases.

pub mod bound;
pub mod common;
pub mod config;
pub mod engine;
pub mod prior;
pub mod rate;
pub mod sim;
pub mod state;
pub mod woodbury;

mod hyper;

pub use config::FitOptions;
pub use engine::{FitData, FitInit, FitOutput, VariationalEngine};
