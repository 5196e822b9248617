use crate::common::*;

/// Variational Gaussian posterior over the latent trajectories.
pub struct PosteriorState {
    /// posterior mean, (T, L)
    pub mean: Mat,
    /// one symmetric (T, T) covariance per latent
    pub cov: Vec<Mat>,
}

/// Coefficient blocks of the observation model.
pub struct Coefficients {
    /// loadings, (L, N): latent state -> log rate
    pub alpha: Mat,
    /// regression weights, (1 + p*N, N): history/intercept -> log rate
    pub beta: Mat,
}

/// Adaptive step sizes, one per channel or latent, persisted across outer
/// iterations. Shrunk on rejected steps, grown on over-achieving ones.
pub struct StepSizes {
    pub beta: DVec,
    pub alpha: DVec,
    pub post_mean: DVec,
    pub hyper: DVec,
}

impl StepSizes {
    pub fn new(n_channels: usize, n_latents: usize) -> Self {
        StepSizes {
            beta: DVec::from_element(n_channels, 1.0),
            alpha: DVec::from_element(n_latents, 1.0),
            post_mean: DVec::from_element(n_latents, 1.0),
            hyper: DVec::from_element(n_latents, 1.0),
        }
    }
}

/// Last outer-iteration-accepted copies of all mutable blocks; the
/// convergence rule measures the largest change against these.
pub struct Snapshot {
    pub alpha: Mat,
    pub beta: Mat,
    pub post_mean: Mat,
    pub post_cov: Vec<Mat>,
}

impl Snapshot {
    pub fn of(coeff: &Coefficients, posterior: &PosteriorState) -> Self {
        Snapshot {
            alpha: coeff.alpha.clone(),
            beta: coeff.beta.clone(),
            post_mean: posterior.mean.clone(),
            post_cov: posterior.cov.clone(),
        }
    }

    pub fn update(&mut self, coeff: &Coefficients, posterior: &PosteriorState) {
        self.alpha.copy_from(&coeff.alpha);
        self.beta.copy_from(&coeff.beta);
        self.post_mean.copy_from(&posterior.mean);
        for (saved, current) in self.post_cov.iter_mut().zip(posterior.cov.iter()) {
            saved.copy_from(current);
        }
    }
}

/// Largest absolute elementwise difference between two matrices.
pub fn max_abs_change(a: &Mat, b: &Mat) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}
