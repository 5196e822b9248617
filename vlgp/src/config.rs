/// Options controlling one variational fit.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Maximum number of outer iterations. Default: 200
    pub max_iterations: usize,
    /// Posterior covariance sweeps per outer iteration. Default: 1
    pub fixed_point_inner_iterations: usize,
    /// Convergence tolerance on the largest parameter change. Default: 1e-4
    pub tolerance: f64,
    /// Log per-iteration diagnostics. Default: false
    pub verbose: bool,
    /// Freeze the regression coefficients (beta). Default: false
    pub fix_regression: bool,
    /// Freeze the loading coefficients (alpha). Default: false
    pub fix_loading: bool,
    /// Freeze the posterior mean. Default: false
    pub fix_posterior_mean: bool,
    /// Freeze the posterior covariance. Default: false
    pub fix_posterior_cov: bool,
    /// Adapt the GP prior variance and lengthscale. Default: false
    pub adapt_hyper: bool,
    /// Outer iterations between hyperparameter steps. Default: 5
    pub hyper_interval: usize,
    /// Target norm of each loading vector. Default: 1.0
    pub loading_norm: f64,
    /// Seed for the default loading initializer. Default: 42
    pub seed: u64,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            max_iterations: 200,
            fixed_point_inner_iterations: 1,
            tolerance: 1e-4,
            verbose: false,
            fix_regression: false,
            fix_loading: false,
            fix_posterior_mean: false,
            fix_posterior_cov: false,
            adapt_hyper: false,
            hyper_interval: 5,
            loading_norm: 1.0,
            seed: 42,
        }
    }
}

impl FitOptions {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_iterations < 2 {
            anyhow::bail!("max_iterations must be at least 2");
        }
        if self.fixed_point_inner_iterations < 1 {
            anyhow::bail!("fixed_point_inner_iterations must be at least 1");
        }
        if !(self.tolerance > 0.0) {
            anyhow::bail!("tolerance must be positive");
        }
        if !(self.loading_norm > 0.0) {
            anyhow::bail!("loading_norm must be positive");
        }
        if self.hyper_interval < 1 {
            anyhow::bail!("hyper_interval must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(FitOptions::default().validate().is_ok());
    }

    #[test]
    fn bad_options_rejected() {
        let opts = FitOptions {
            tolerance: 0.0,
            ..Default::default()
        };
        assert!(opts.validate().is_err());

        let opts = FitOptions {
            loading_norm: -1.0,
            ..Default::default()
        };
        assert!(opts.validate().is_err());

        let opts = FitOptions {
            max_iterations: 1,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }
}
