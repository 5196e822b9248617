use crate::common::*;

use gp_util::kernel::sqexp_cov;
use gp_util::linalg::svd_pinv;

/// Relative cutoff for singular values when inverting the prior covariance
const PINV_RCOND: f64 = 1e-12;

/// Gaussian-process prior for one latent dimension.
///
/// `precision` is a generalized inverse of `cov`; the two are only ever
/// regenerated together, so they cannot drift out of sync.
#[derive(Debug, Clone)]
pub struct LatentPrior {
    /// marginal variance
    pub variance: f64,
    /// inverse of the squared lengthscale
    pub decay: f64,
    /// covariance over time bins, (T, T), symmetric
    pub cov: Mat,
    /// generalized inverse of `cov`, (T, T)
    pub precision: Mat,
}

/// Strategy for building the per-latent prior from its hyperparameters.
///
/// The inference engine only consumes `{cov, precision}`; whether the
/// precision comes from a dense pseudo-inverse or a low-rank factorization
/// is up to the builder.
pub trait PriorBuilder {
    fn build(&self, n_bins: usize, variance: f64, decay: f64) -> anyhow::Result<LatentPrior>;
}

/// Dense squared-exponential prior with an SVD generalized inverse.
pub struct SqExpPrior;

impl PriorBuilder for SqExpPrior {
    fn build(&self, n_bins: usize, variance: f64, decay: f64) -> anyhow::Result<LatentPrior> {
        if !(variance > 0.0) || !(decay > 0.0) {
            anyhow::bail!(
                "prior hyperparameters must be positive (variance {}, decay {})",
                variance,
                decay
            );
        }
        let cov = sqexp_cov(n_bins, decay, variance);
        let precision = svd_pinv(&cov, PINV_RCOND)?;
        Ok(LatentPrior {
            variance,
            decay,
            cov,
            precision,
        })
    }
}
