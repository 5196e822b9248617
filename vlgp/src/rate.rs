use crate::common::*;

/// Smallest rate we allow; the Poisson term takes `log` of nothing, but
/// gradients and the lower bound divide and subtract by the rate, so it
/// must stay strictly positive.
pub const RATE_FLOOR: f64 = f64::EPSILON;

/// Second-order-corrected expected rate for one `(t, n)` entry:
///
/// `exp( r_t·β_n + m_t·α_n + ½ Σ_l α_ln² V_l[t,t] )`
///
/// NaN collapses to the floor, overflow clamps to `f64::MAX`; the result
/// is always strictly positive and finite.
pub fn corrected_rate(
    t: usize,
    n: usize,
    regressor: &Mat,
    beta: &Mat,
    post_mean: &Mat,
    alpha: &Mat,
    post_cov: &[Mat],
) -> f64 {
    let mut lp = 0.0;
    for k in 0..regressor.ncols() {
        lp += regressor[(t, k)] * beta[(k, n)];
    }
    for l in 0..alpha.nrows() {
        let a = alpha[(l, n)];
        lp += post_mean[(t, l)] * a + 0.5 * a * a * post_cov[l][(t, t)];
    }

    let rate = lp.exp();
    if rate.is_nan() {
        RATE_FLOOR
    } else if rate.is_infinite() {
        f64::MAX
    } else if rate <= 0.0 {
        RATE_FLOOR
    } else {
        rate
    }
}

/// Expected-rate matrix, (T, N).
///
/// Derived state: every entry must reflect the current parameter values
/// before any gradient, Hessian, or lower-bound computation reads it, so
/// callers refresh exactly the slice touched by their last mutation.
pub struct RateState {
    rate: Mat,
}

impl RateState {
    pub fn new(
        regressor: &Mat,
        beta: &Mat,
        post_mean: &Mat,
        alpha: &Mat,
        post_cov: &[Mat],
    ) -> Self {
        let tt = regressor.nrows();
        let nn = beta.ncols();
        let mut state = RateState {
            rate: Mat::zeros(tt, nn),
        };
        state.refresh_all(regressor, beta, post_mean, alpha, post_cov);
        state
    }

    pub fn value(&self) -> &Mat {
        &self.rate
    }

    pub fn refresh_all(
        &mut self,
        regressor: &Mat,
        beta: &Mat,
        post_mean: &Mat,
        alpha: &Mat,
        post_cov: &[Mat],
    ) {
        for n in 0..self.rate.ncols() {
            self.refresh_column(n, regressor, beta, post_mean, alpha, post_cov);
        }
    }

    pub fn refresh_column(
        &mut self,
        n: usize,
        regressor: &Mat,
        beta: &Mat,
        post_mean: &Mat,
        alpha: &Mat,
        post_cov: &[Mat],
    ) {
        for t in 0..self.rate.nrows() {
            self.rate[(t, n)] = corrected_rate(t, n, regressor, beta, post_mean, alpha, post_cov);
        }
    }

    /// Snapshot one column for a possible rollback.
    pub fn save_column(&self, n: usize) -> DVec {
        self.rate.column(n).clone_owned()
    }

    pub fn restore_column(&mut self, n: usize, saved: &DVec) {
        self.rate.column_mut(n).copy_from(saved);
    }

    /// Snapshot the whole matrix for a possible rollback.
    pub fn save(&self) -> Mat {
        self.rate.clone()
    }

    pub fn restore(&mut self, saved: &Mat) {
        self.rate.copy_from(saved);
    }

    #[cfg(test)]
    pub fn overwrite_for_test(&mut self, rate: Mat) {
        self.rate = rate;
    }
}
