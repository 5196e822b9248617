use crate::common::*;

use nalgebra::{Cholesky, Dyn};

/// Woodbury factorization of the effective posterior curvature for one
/// latent: with `W = diag(w)` the rate-derived weights and `Σ` the prior
/// covariance,
///
/// `B = I + √W Σ √W`
///
/// is Cholesky-factored once, and both the inverse-curvature action
/// `(Σ⁻¹ + W)⁻¹` and the closed-form posterior covariance
/// `Σ − Σ√W B⁻¹ √W Σ` come out of triangular solves against it. No dense
/// inversion of `Σ` or of the (T, T) Hessian is ever formed.
pub struct WoodburyFactor<'a> {
    prior_cov: &'a Mat,
    wsqrt: DVec,
    chol: Cholesky<f64, Dyn>,
}

impl<'a> WoodburyFactor<'a> {
    /// Returns `None` when `B` cannot be factored, which the callers treat
    /// as a singular system (skip the block, no state change).
    pub fn new(prior_cov: &'a Mat, weights: &DVec) -> Option<Self> {
        let wsqrt = weights.map(|w| w.max(0.0).sqrt());

        let tt = prior_cov.nrows();
        let mut bb = Mat::identity(tt, tt);
        for i in 0..tt {
            for j in 0..tt {
                bb[(i, j)] += wsqrt[i] * prior_cov[(i, j)] * wsqrt[j];
            }
        }

        let chol = bb.cholesky()?;
        Some(WoodburyFactor {
            prior_cov,
            wsqrt,
            chol,
        })
    }

    /// Apply the effective inverse curvature:
    /// `(Σ⁻¹ + W)⁻¹ g = Σg − Σ√W B⁻¹ √W Σg`
    pub fn inv_apply(&self, grad: &DVec) -> DVec {
        let sg = self.prior_cov * grad;
        let inner = self.chol.solve(&sg.component_mul(&self.wsqrt));
        &sg - self.prior_cov * inner.component_mul(&self.wsqrt)
    }

    /// Closed-form posterior covariance `Σ − Σ√W B⁻¹ √W Σ`, symmetrized.
    /// PSD whenever `Σ` is PSD.
    pub fn posterior_cov(&self) -> Mat {
        // √W Σ : scale rows
        let mut ws_sigma = self.prior_cov.clone();
        for (i, mut row) in ws_sigma.row_iter_mut().enumerate() {
            row *= self.wsqrt[i];
        }

        let solved = self.chol.solve(&ws_sigma);
        let vv = self.prior_cov - ws_sigma.transpose() * solved;

        // pin the symmetry invariant against rounding
        let mut sym = vv.transpose();
        sym += &vv;
        sym * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use gp_util::kernel::sqexp_cov;

    fn spd_prior(n: usize) -> Mat {
        sqexp_cov(n, 0.5, 1.0)
    }

    #[test]
    fn inv_apply_matches_direct_solve() {
        let n = 8;
        let sigma = spd_prior(n);
        let weights = DVec::from_fn(n, |i, _| 0.3 + 0.1 * i as f64);
        let factor = WoodburyFactor::new(&sigma, &weights).unwrap();

        // H = Σ⁻¹ + W, built directly for the comparison
        let sigma_inv = sigma.clone().try_inverse().unwrap();
        let hh = &sigma_inv + Mat::from_diagonal(&weights);

        let g = DVec::from_fn(n, |i, _| (i as f64 - 3.0) / 4.0);
        let direct = hh.lu().solve(&g).unwrap();
        let woodbury = factor.inv_apply(&g);

        for i in 0..n {
            assert_abs_diff_eq!(woodbury[i], direct[i], epsilon = 1e-8);
        }
    }

    #[test]
    fn posterior_cov_is_symmetric_psd() {
        let n = 12;
        let sigma = spd_prior(n);
        let weights = DVec::from_element(n, 2.0);
        let factor = WoodburyFactor::new(&sigma, &weights).unwrap();
        let vv = factor.posterior_cov();

        for i in 0..n {
            for j in 0..i {
                assert_abs_diff_eq!(vv[(i, j)], vv[(j, i)], epsilon = 1e-12);
            }
        }
        let eigen = vv.symmetric_eigen();
        assert!(eigen.eigenvalues.iter().all(|&e| e > -1e-10));
    }

    #[test]
    fn zero_weights_leave_the_prior_unchanged() {
        let n = 6;
        let sigma = spd_prior(n);
        let weights = DVec::zeros(n);
        let factor = WoodburyFactor::new(&sigma, &weights).unwrap();
        let vv = factor.posterior_cov();
        for i in 0..n {
            for j in 0..n {
                assert_abs_diff_eq!(vv[(i, j)], sigma[(i, j)], epsilon = 1e-12);
            }
        }
    }
}
