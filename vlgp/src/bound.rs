use crate::common::*;
use crate::prior::LatentPrior;

/// Relative eigenvalue cutoff for the pseudo-log-determinant. Must match
/// the cutoff policy of the prior's generalized inverse: both have to
/// agree on what counts as the support of a rank-deficient covariance.
const LOGDET_RCOND: f64 = 1e-12;

/// Pseudo-log-determinant of a symmetric PSD matrix through its
/// eigenvalues.
///
/// Eigenvalues below `LOGDET_RCOND` times the largest are outside the
/// support and contribute nothing, mirroring the SVD generalized inverse
/// that produced the precision. A matrix with no positive eigenvalues
/// yields a hugely negative but finite value that the acceptance tests
/// then reject, instead of a NaN propagating.
fn logdet_psd(vv: &Mat) -> f64 {
    let eigen = vv.clone().symmetric_eigen();
    let e_max = eigen.eigenvalues.max();
    if !(e_max > 0.0) {
        return f64::MIN_POSITIVE.ln() * vv.nrows() as f64;
    }

    let cutoff = LOGDET_RCOND * e_max;
    eigen
        .eigenvalues
        .iter()
        .filter(|&&e| e > cutoff)
        .map(|&e| e.ln())
        .sum()
}

/// Evidence lower bound. Pure function of the current parameters and the
/// rate matrix, which must already reflect those parameters.
///
/// Poisson term: `Σ y ∘ (Rβ + Mα) − rate`; per latent, the Gaussian
/// penalty `−½ dᵀΩd − ½ tr(ΩV) + ½ log|V|` with `d = m_l − μ_l`.
#[allow(clippy::too_many_arguments)]
pub fn lower_bound(
    spikes: &Mat,
    regressor: &Mat,
    beta: &Mat,
    alpha: &Mat,
    prior_mean: &Mat,
    priors: &[LatentPrior],
    post_mean: &Mat,
    post_cov: &[Mat],
    rate: &Mat,
) -> f64 {
    let eta = regressor * beta + post_mean * alpha;
    let mut bound = spikes.component_mul(&eta).sum() - rate.sum();

    for (l, prior) in priors.iter().enumerate() {
        let dd = post_mean.column(l) - prior_mean.column(l);
        let quad = dd.dot(&(&prior.precision * &dd));
        // tr(ΩV) as an elementwise product; both factors are symmetric
        let trace = prior.precision.component_mul(&post_cov[l]).sum();
        bound += -0.5 * quad - 0.5 * trace + 0.5 * logdet_psd(&post_cov[l]);
    }

    bound
}
