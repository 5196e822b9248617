use crate::bound::lower_bound;
use crate::common::*;
use crate::config::FitOptions;
use crate::prior::{LatentPrior, PriorBuilder, SqExpPrior};
use crate::rate::RateState;
use crate::state::{max_abs_change, Coefficients, PosteriorState, Snapshot, StepSizes};
use crate::woodbury::WoodburyFactor;

use indicatif::{ProgressBar, ProgressDrawTarget};
use std::time::{Duration, Instant};

/// Step-size shrink factor on a rejected step
pub(crate) const DEFLATION: f64 = 0.5;
/// Step-size growth factor when a step beats its quadratic prediction
const INFLATION: f64 = 1.5;
/// Fraction of the predicted improvement a step must exceed to earn growth
const IMPROVEMENT_THRESHOLD: f64 = 0.75;
/// Relative singular-value cutoff for the least-squares beta initializer
const LSTSQ_RCOND: f64 = 1e-9;

/// Read-only inputs for one fit. The engine borrows them unchanged for its
/// whole lifetime.
pub struct FitData<'a> {
    /// spike counts, (T, N)
    pub spikes: &'a Mat,
    /// autoregressive design matrix, (T, 1 + p*N)
    pub regressor: &'a Mat,
    /// GP prior mean, (T, L)
    pub prior_mean: &'a Mat,
    /// prior marginal variance per latent, length L
    pub prior_variance: Vec<f64>,
    /// prior inverse squared lengthscale per latent, length L
    pub prior_decay: Vec<f64>,
}

/// Optional initial values for the optimized blocks. Missing blocks fall
/// back to a seeded random loading matrix, a least-squares regression fit,
/// and the prior mean.
#[derive(Default)]
pub struct FitInit {
    pub alpha: Option<Mat>,
    pub beta: Option<Mat>,
    pub posterior_mean: Option<Mat>,
}

/// Everything a fit returns, including the initial values actually used
/// and the full lower-bound trace.
pub struct FitOutput {
    pub posterior_mean: Mat,
    pub posterior_cov: Vec<Mat>,
    pub alpha: Mat,
    pub beta: Mat,
    pub alpha0: Mat,
    pub beta0: Mat,
    pub lower_bound: Vec<f64>,
    pub elapsed: Duration,
    pub converged: bool,
    pub iterations: usize,
}

/// Block-coordinate variational optimizer.
///
/// Each outer iteration runs damped Newton updates over the regression
/// coefficients (per channel), the loadings (per latent), and the posterior
/// means (per latent), then the closed-form Woodbury covariance update, and
/// periodically a hyperparameter step. Every update is guarded by an
/// accept/reject test against the previous iteration's lower bound: a step
/// that yields NaN or a decrease is rolled back (and, for the Newton
/// blocks, its step size shrunk), so the recorded trace is non-decreasing
/// by construction.
pub struct VariationalEngine<'a> {
    pub(crate) spikes: &'a Mat,
    pub(crate) regressor: &'a Mat,
    pub(crate) prior_mean: &'a Mat,
    pub(crate) builder: Box<dyn PriorBuilder>,
    pub(crate) priors: Vec<LatentPrior>,
    pub(crate) posterior: PosteriorState,
    pub(crate) coeff: Coefficients,
    pub(crate) rate: RateState,
    pub(crate) steps: StepSizes,
    pub(crate) good: Snapshot,
    pub(crate) trace: Vec<f64>,
    pub(crate) opts: FitOptions,
    alpha0: Mat,
    beta0: Mat,
}

impl<'a> VariationalEngine<'a> {
    /// Engine with the dense squared-exponential prior builder.
    pub fn new(data: FitData<'a>, init: FitInit, opts: FitOptions) -> anyhow::Result<Self> {
        Self::with_builder(data, init, opts, Box::new(SqExpPrior))
    }

    pub fn with_builder(
        data: FitData<'a>,
        init: FitInit,
        opts: FitOptions,
        builder: Box<dyn PriorBuilder>,
    ) -> anyhow::Result<Self> {
        opts.validate()?;

        let tt = data.spikes.nrows();
        let nn = data.spikes.ncols();
        let ll = data.prior_mean.ncols();

        if tt == 0 || nn == 0 || ll == 0 {
            anyhow::bail!("empty problem: T {}, N {}, L {}", tt, nn, ll);
        }
        if data.regressor.nrows() != tt {
            anyhow::bail!(
                "design matrix has {} rows for {} time bins",
                data.regressor.nrows(),
                tt
            );
        }
        if data.prior_mean.nrows() != tt {
            anyhow::bail!("prior mean has {} rows for {} time bins", data.prior_mean.nrows(), tt);
        }
        if data.prior_variance.len() != ll || data.prior_decay.len() != ll {
            anyhow::bail!("need one variance and one decay per latent");
        }

        let priors: Vec<LatentPrior> = data
            .prior_variance
            .iter()
            .zip(data.prior_decay.iter())
            .map(|(&v, &w)| builder.build(tt, v, w))
            .collect::<anyhow::Result<_>>()?;

        let alpha0 = match init.alpha {
            Some(a) => {
                if a.shape() != (ll, nn) {
                    anyhow::bail!("initial alpha must be ({}, {})", ll, nn);
                }
                a
            }
            None => {
                let mut a = gp_util::sampling::rnorm_seeded(ll, nn, opts.seed);
                for mut row in a.row_iter_mut() {
                    let norm = row.norm();
                    if norm > 0.0 {
                        row *= opts.loading_norm / norm;
                    }
                }
                a
            }
        };

        let beta0 = match init.beta {
            Some(b) => {
                if b.nrows() != data.regressor.ncols() || b.ncols() != nn {
                    anyhow::bail!(
                        "initial beta must be ({}, {})",
                        data.regressor.ncols(),
                        nn
                    );
                }
                b
            }
            None => gp_util::linalg::lstsq(data.regressor, data.spikes, LSTSQ_RCOND)?,
        };

        let post_mean = match init.posterior_mean {
            Some(m) => {
                if m.shape() != (tt, ll) {
                    anyhow::bail!("initial posterior mean must be ({}, {})", tt, ll);
                }
                m
            }
            None => data.prior_mean.clone(),
        };

        let posterior = PosteriorState {
            mean: post_mean,
            cov: priors.iter().map(|p| p.cov.clone()).collect(),
        };
        let coeff = Coefficients {
            alpha: alpha0.clone(),
            beta: beta0.clone(),
        };
        let rate = RateState::new(
            data.regressor,
            &coeff.beta,
            &posterior.mean,
            &coeff.alpha,
            &posterior.cov,
        );
        let good = Snapshot::of(&coeff, &posterior);

        let mut engine = VariationalEngine {
            spikes: data.spikes,
            regressor: data.regressor,
            prior_mean: data.prior_mean,
            builder,
            priors,
            posterior,
            coeff,
            rate,
            steps: StepSizes::new(nn, ll),
            good,
            trace: vec![],
            opts,
            alpha0,
            beta0,
        };
        let lb0 = engine.bound();
        engine.trace.push(lb0);
        Ok(engine)
    }

    /// Run to convergence or the iteration cap.
    pub fn fit(&mut self) -> FitOutput {
        let start = Instant::now();

        let pb = ProgressBar::new(self.opts.max_iterations as u64);
        if self.opts.verbose {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }

        let mut converged = false;
        let mut it = 1;
        while !converged && it < self.opts.max_iterations {
            let reference = *self.trace.last().expect("trace seeded at construction");

            if !self.opts.fix_regression {
                self.update_regression(reference);
            }
            if !self.opts.fix_loading {
                self.update_loading(reference);
            }
            if !self.opts.fix_posterior_mean {
                self.update_posterior_mean(reference);
            }
            if !self.opts.fix_posterior_cov {
                self.update_posterior_cov(reference);
            }
            if self.opts.adapt_hyper && it % self.opts.hyper_interval == 0 {
                self.adapt_hyperparameters(reference);
            }

            let lb = self.bound();
            self.trace.push(lb);

            let chg_beta = if self.opts.fix_regression {
                0.0
            } else {
                max_abs_change(&self.good.beta, &self.coeff.beta)
            };
            let chg_alpha = if self.opts.fix_loading {
                0.0
            } else {
                max_abs_change(&self.good.alpha, &self.coeff.alpha)
            };
            let chg_mean = if self.opts.fix_posterior_mean {
                0.0
            } else {
                max_abs_change(&self.good.post_mean, &self.posterior.mean)
            };
            let chg_cov = if self.opts.fix_posterior_cov {
                0.0
            } else {
                self.good
                    .post_cov
                    .iter()
                    .zip(self.posterior.cov.iter())
                    .map(|(a, b)| max_abs_change(a, b))
                    .fold(0.0, f64::max)
            };
            let change = chg_beta.max(chg_alpha).max(chg_mean).max(chg_cov);

            if change < self.opts.tolerance {
                converged = true;
            }
            if self.opts.verbose {
                info!(
                    "iteration {}: bound {:.6}, increment {:.3e}, max change {:.3e}",
                    it,
                    lb,
                    lb - reference,
                    change
                );
            }

            self.good.update(&self.coeff, &self.posterior);
            pb.inc(1);
            it += 1;
        }

        pb.finish_and_clear();
        if !converged {
            warn!("no convergence within {} iterations", self.opts.max_iterations);
        }

        FitOutput {
            posterior_mean: self.posterior.mean.clone(),
            posterior_cov: self.posterior.cov.clone(),
            alpha: self.coeff.alpha.clone(),
            beta: self.coeff.beta.clone(),
            alpha0: self.alpha0.clone(),
            beta0: self.beta0.clone(),
            lower_bound: self.trace.clone(),
            elapsed: start.elapsed(),
            converged,
            iterations: it - 1,
        }
    }

    pub(crate) fn bound(&self) -> f64 {
        lower_bound(
            self.spikes,
            self.regressor,
            &self.coeff.beta,
            &self.coeff.alpha,
            self.prior_mean,
            &self.priors,
            &self.posterior.mean,
            &self.posterior.cov,
            self.rate.value(),
        )
    }

    fn refresh_rate_column(&mut self, n: usize) {
        self.rate.refresh_column(
            n,
            self.regressor,
            &self.coeff.beta,
            &self.posterior.mean,
            &self.coeff.alpha,
            &self.posterior.cov,
        );
    }

    pub(crate) fn refresh_rate_all(&mut self) {
        self.rate.refresh_all(
            self.regressor,
            &self.coeff.beta,
            &self.posterior.mean,
            &self.coeff.alpha,
            &self.posterior.cov,
        );
    }

    /// Damped Newton update of the regression coefficients, one channel at
    /// a time. Touches only that channel's beta column and rate column.
    fn update_regression(&mut self, reference: f64) {
        for n in 0..self.spikes.ncols() {
            let rate = self.rate.value();
            let resid = self.spikes.column(n) - rate.column(n);
            let grad = self.regressor.transpose() * resid;
            if grad.amax() < EPS {
                continue;
            }

            // negative Hessian Rᵀ diag(rate_n) R with the rate as the
            // Poisson curvature proxy
            let mut weighted = self.regressor.clone();
            for (t, mut row) in weighted.row_iter_mut().enumerate() {
                row *= rate[(t, n)];
            }
            let neg_hess = self.regressor.transpose() * weighted;

            let delta = match neg_hess.clone().lu().solve(&grad) {
                Some(d) => d * self.steps.beta[n],
                None => continue, // singular system: no update this round
            };
            let predicted = grad.dot(&delta) - 0.5 * delta.dot(&(&neg_hess * &delta));

            let saved_beta = self.coeff.beta.column(n).clone_owned();
            let saved_rate = self.rate.save_column(n);

            {
                let mut col = self.coeff.beta.column_mut(n);
                col += &delta;
            }
            self.refresh_rate_column(n);
            let lb = self.bound();

            if lb.is_nan() || lb < reference {
                self.coeff.beta.column_mut(n).copy_from(&saved_beta);
                self.rate.restore_column(n, &saved_rate);
                self.steps.beta[n] = self.steps.beta[n] * DEFLATION + EPS;
            } else if lb - reference > IMPROVEMENT_THRESHOLD * predicted {
                self.steps.beta[n] *= INFLATION;
            }
        }
    }

    /// Damped Newton update of the loadings, one latent at a time. The
    /// restricted negative Hessian is diagonal across channels. Every
    /// accepted row is rescaled to the target norm and the realized
    /// displacement, not the raw Newton step, feeds the prediction test.
    fn update_loading(&mut self, reference: f64) {
        let (ll, nn) = self.coeff.alpha.shape();
        for l in 0..ll {
            let rate = self.rate.value();
            let m_l = self.posterior.mean.column(l).clone_owned();
            let vdiag = self.posterior.cov[l].diagonal();

            let rt_v = rate.transpose() * &vdiag;
            let resid = self.spikes - rate;
            let mut grad = resid.transpose() * &m_l;
            for n in 0..nn {
                grad[n] -= rt_v[n] * self.coeff.alpha[(l, n)];
            }
            if grad.amax() < EPS {
                continue;
            }

            let rt_m2 = rate.transpose() * m_l.map(|x| x * x);
            let rt_mv = rate.transpose() * m_l.component_mul(&vdiag);
            let rt_v2 = rate.transpose() * vdiag.map(|x| x * x);
            let mut hess = DVec::zeros(nn);
            for n in 0..nn {
                let a = self.coeff.alpha[(l, n)];
                hess[n] = rt_m2[n] + 2.0 * a * rt_mv[n] + a * a * rt_v2[n] + rt_v[n];
            }
            if hess.iter().any(|&h| !h.is_finite() || h < EPS) {
                continue; // singular diagonal system
            }

            let delta = grad.component_div(&hess) * self.steps.alpha[l];

            let saved_alpha = self.coeff.alpha.row(l).clone_owned();
            let saved_rate = self.rate.save();

            {
                let mut row = self.coeff.alpha.row_mut(l);
                for n in 0..nn {
                    row[n] += delta[n];
                }
                let norm = row.norm();
                if norm > 0.0 {
                    row *= self.opts.loading_norm / norm;
                }
            }
            let real_delta =
                self.coeff.alpha.row(l).transpose() - saved_alpha.transpose();
            let predicted = grad.dot(&real_delta)
                - 0.5 * real_delta.component_mul(&hess).dot(&real_delta);

            self.refresh_rate_all();
            let lb = self.bound();

            if lb.is_nan() || lb < reference {
                self.coeff.alpha.row_mut(l).copy_from(&saved_alpha);
                self.rate.restore(&saved_rate);
                self.steps.alpha[l] = self.steps.alpha[l] * DEFLATION + EPS;
            } else if lb - reference > IMPROVEMENT_THRESHOLD * predicted {
                self.steps.alpha[l] *= INFLATION;
            }
        }
    }

    /// Damped Newton update of the posterior mean, one latent at a time,
    /// with the Woodbury-factorized effective inverse Hessian. Accepted
    /// columns are re-centered to zero mean.
    fn update_posterior_mean(&mut self, reference: f64) {
        for l in 0..self.posterior.cov.len() {
            let rate = self.rate.value();
            let alpha_l = self.coeff.alpha.row(l).transpose();
            let resid = self.spikes - rate;
            let dd = self.posterior.mean.column(l) - self.prior_mean.column(l);
            let grad = &resid * &alpha_l - &self.priors[l].precision * &dd;
            if grad.amax() < EPS {
                continue;
            }

            let weights = rate * alpha_l.map(|a| a * a);
            let delta = {
                let factor = match WoodburyFactor::new(&self.priors[l].cov, &weights) {
                    Some(f) => f,
                    None => continue,
                };
                factor.inv_apply(&grad) * self.steps.post_mean[l]
            };

            let saved_mean = self.posterior.mean.column(l).clone_owned();
            let saved_rate = self.rate.save();

            {
                let mut col = self.posterior.mean.column_mut(l);
                col += &delta;
                // identifiability: the intercept absorbs any level shift
                let centre = col.mean();
                col.add_scalar_mut(-centre);
            }
            let real_delta = self.posterior.mean.column(l) - &saved_mean;
            // forward Hessian Ω + diag(w) for the predicted quadratic gain
            let h_delta =
                &self.priors[l].precision * &real_delta + real_delta.component_mul(&weights);
            let predicted = grad.dot(&real_delta) - 0.5 * real_delta.dot(&h_delta);

            self.refresh_rate_all();
            let lb = self.bound();

            if lb.is_nan() || lb < reference {
                self.posterior.mean.column_mut(l).copy_from(&saved_mean);
                self.rate.restore(&saved_rate);
                self.steps.post_mean[l] = self.steps.post_mean[l] * DEFLATION + EPS;
            } else if lb - reference > IMPROVEMENT_THRESHOLD * predicted {
                self.steps.post_mean[l] *= INFLATION;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn force_rate_for_test(&mut self, rate: Mat) {
        self.rate.overwrite_for_test(rate);
    }

    /// Closed-form Woodbury update of the posterior covariances, symmetric
    /// and PSD by construction. With a rank-deficient prior the closed form
    /// and the evaluated bound can still disagree on the null space, so the
    /// update carries the same rollback guard as the other blocks; there is
    /// no step size to shrink. The rate matrix is refreshed after every
    /// latent.
    fn update_posterior_cov(&mut self, reference: f64) {
        for _sweep in 0..self.opts.fixed_point_inner_iterations {
            for l in 0..self.posterior.cov.len() {
                let alpha_l = self.coeff.alpha.row(l).transpose();
                let weights = self.rate.value() * alpha_l.map(|a| a * a);
                let new_cov = match WoodburyFactor::new(&self.priors[l].cov, &weights) {
                    Some(f) => f.posterior_cov(),
                    None => continue,
                };

                let saved_cov = self.posterior.cov[l].clone();
                let saved_rate = self.rate.save();

                self.posterior.cov[l] = new_cov;
                self.refresh_rate_all();
                let lb = self.bound();

                if lb.is_nan() || lb < reference {
                    self.posterior.cov[l] = saved_cov;
                    self.rate.restore(&saved_rate);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{gp_latents, spike_trains};
    use gp_util::design::make_regressor;

    fn toy_problem() -> (Mat, Mat, Mat, Mat) {
        let tt = 30;
        let latents = gp_latents(tt, 1, 1.0, 1e-2, 7);
        let alpha = Mat::from_row_slice(1, 3, &[1.0, -0.9, 0.8]);
        let mut beta = Mat::zeros(4, 3);
        for n in 0..3 {
            beta[(0, n)] = 0.5;
        }
        let (spikes, _) = spike_trains(&latents, &alpha, &beta, 1, 13).unwrap();
        let regressor = make_regressor(&spikes, 1, true);
        let prior_mean = Mat::zeros(tt, 1);
        (spikes, regressor, prior_mean, alpha)
    }

    fn toy_engine<'a>(
        spikes: &'a Mat,
        regressor: &'a Mat,
        prior_mean: &'a Mat,
        init: FitInit,
        opts: FitOptions,
    ) -> VariationalEngine<'a> {
        let data = FitData {
            spikes,
            regressor,
            prior_mean,
            prior_variance: vec![1.0],
            prior_decay: vec![1e-2],
        };
        VariationalEngine::new(data, init, opts).unwrap()
    }

    #[test]
    fn rejected_regression_step_restores_state_exactly() {
        let (spikes, regressor, prior_mean, alpha) = toy_problem();
        let init = FitInit {
            alpha: Some(alpha),
            beta: Some(Mat::zeros(regressor.ncols(), spikes.ncols())),
            posterior_mean: None,
        };
        let mut engine = toy_engine(
            &spikes,
            &regressor,
            &prior_mean,
            init,
            FitOptions::default(),
        );

        // an absurd step size overshoots every channel into rejection
        for n in 0..spikes.ncols() {
            engine.steps.beta[n] = 1e9;
        }
        let beta_before = engine.coeff.beta.clone();
        let rate_before = engine.rate.value().clone();
        let reference = *engine.trace.last().unwrap();

        engine.update_regression(reference);

        assert_eq!(engine.coeff.beta, beta_before);
        assert_eq!(*engine.rate.value(), rate_before);
        for n in 0..spikes.ncols() {
            assert!(engine.steps.beta[n] < 1e9);
        }
    }

    #[test]
    fn vanishing_gradient_skips_the_channel_update() {
        let (spikes, regressor, prior_mean, alpha) = toy_problem();
        let init = FitInit {
            alpha: Some(alpha),
            ..Default::default()
        };
        let mut engine = toy_engine(
            &spikes,
            &regressor,
            &prior_mean,
            init,
            FitOptions::default(),
        );

        // rate equal to the counts zeroes the regression gradient
        engine.force_rate_for_test(spikes.clone());
        let beta_before = engine.coeff.beta.clone();
        let steps_before = engine.steps.beta.clone();

        engine.update_regression(f64::NEG_INFINITY);

        assert_eq!(engine.coeff.beta, beta_before);
        assert_eq!(engine.steps.beta, steps_before);
    }

    #[test]
    fn bound_trace_never_decreases() {
        let (spikes, regressor, prior_mean, _) = toy_problem();
        let opts = FitOptions {
            max_iterations: 20,
            ..Default::default()
        };
        let mut engine = toy_engine(&spikes, &regressor, &prior_mean, FitInit::default(), opts);
        let out = engine.fit();

        assert!(out.lower_bound.len() >= 2);
        for pair in out.lower_bound.windows(2) {
            assert!(
                pair[1] >= pair[0] - 1e-8,
                "bound dropped: {} -> {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn loadings_keep_target_norm_and_means_stay_centered() {
        let (spikes, regressor, prior_mean, _) = toy_problem();
        let opts = FitOptions {
            max_iterations: 10,
            loading_norm: 2.0,
            ..Default::default()
        };
        let mut engine = toy_engine(&spikes, &regressor, &prior_mean, FitInit::default(), opts);
        let out = engine.fit();

        for row in out.alpha.row_iter() {
            approx::assert_abs_diff_eq!(row.norm(), 2.0, epsilon = 1e-9);
        }
        for col in out.posterior_mean.column_iter() {
            approx::assert_abs_diff_eq!(col.mean(), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn dimension_mismatches_are_rejected() {
        let (spikes, regressor, _, _) = toy_problem();
        let bad_prior_mean = Mat::zeros(spikes.nrows() + 1, 1);
        let data = FitData {
            spikes: &spikes,
            regressor: &regressor,
            prior_mean: &bad_prior_mean,
            prior_variance: vec![1.0],
            prior_decay: vec![1e-2],
        };
        assert!(VariationalEngine::new(data, FitInit::default(), FitOptions::default()).is_err());
    }

    #[test]
    fn rejected_loading_step_restores_state_exactly() {
        let (spikes, regressor, prior_mean, _) = toy_problem();
        let mut engine = toy_engine(
            &spikes,
            &regressor,
            &prior_mean,
            FitInit::default(),
            FitOptions::default(),
        );

        let alpha_before = engine.coeff.alpha.clone();
        let rate_before = engine.rate.value().clone();
        let steps_before = engine.steps.alpha.clone();

        // an unbeatable reference forces the reject path
        engine.update_loading(f64::INFINITY);

        assert_eq!(engine.coeff.alpha, alpha_before);
        assert_eq!(*engine.rate.value(), rate_before);
        assert!(engine.steps.alpha[0] < steps_before[0]);
    }

    #[test]
    fn rejected_posterior_mean_step_restores_state_exactly() {
        let (spikes, regressor, prior_mean, _) = toy_problem();
        let mut engine = toy_engine(
            &spikes,
            &regressor,
            &prior_mean,
            FitInit::default(),
            FitOptions::default(),
        );

        let mean_before = engine.posterior.mean.clone();
        let rate_before = engine.rate.value().clone();
        let steps_before = engine.steps.post_mean.clone();

        engine.update_posterior_mean(f64::INFINITY);

        assert_eq!(engine.posterior.mean, mean_before);
        assert_eq!(*engine.rate.value(), rate_before);
        assert!(engine.steps.post_mean[0] < steps_before[0]);
    }

    #[test]
    fn vanishing_gradient_skips_the_loading_update() {
        let (spikes, regressor, prior_mean, _) = toy_problem();
        // zero loadings against a zero posterior mean: the restricted
        // gradient vanishes identically
        let init = FitInit {
            alpha: Some(Mat::zeros(1, spikes.ncols())),
            ..Default::default()
        };
        let mut engine = toy_engine(
            &spikes,
            &regressor,
            &prior_mean,
            init,
            FitOptions::default(),
        );

        let alpha_before = engine.coeff.alpha.clone();
        let steps_before = engine.steps.alpha.clone();

        engine.update_loading(f64::NEG_INFINITY);

        assert_eq!(engine.coeff.alpha, alpha_before);
        assert_eq!(engine.steps.alpha, steps_before);
    }

    #[test]
    fn vanishing_gradient_skips_the_posterior_mean_update() {
        let (spikes, regressor, prior_mean, _) = toy_problem();
        let mut engine = toy_engine(
            &spikes,
            &regressor,
            &prior_mean,
            FitInit::default(),
            FitOptions::default(),
        );

        // rate equal to the counts plus a mean equal to the prior mean
        // zero both gradient terms
        engine.force_rate_for_test(spikes.clone());
        let mean_before = engine.posterior.mean.clone();
        let steps_before = engine.steps.post_mean.clone();

        engine.update_posterior_mean(f64::NEG_INFINITY);

        assert_eq!(engine.posterior.mean, mean_before);
        assert_eq!(engine.steps.post_mean, steps_before);
    }

    #[test]
    fn covariance_update_never_lowers_the_bound() {
        let (spikes, regressor, prior_mean, _) = toy_problem();
        let data = FitData {
            spikes: &spikes,
            regressor: &regressor,
            prior_mean: &prior_mean,
            prior_variance: vec![1.0],
            // long lengthscale: the prior covariance is numerically
            // rank deficient
            prior_decay: vec![1e-4],
        };
        let mut engine =
            VariationalEngine::new(data, FitInit::default(), FitOptions::default()).unwrap();

        let reference = *engine.trace.last().unwrap();
        engine.update_posterior_cov(reference);
        let after = engine.bound();

        assert!(
            after >= reference - 1e-8,
            "bound fell from {} to {}",
            reference,
            after
        );
    }
}
