use gp_util::common_io::{read_tsv, write_column_tsv, write_tsv};
use gp_util::design::make_regressor;

use vlgp::common::*;
use vlgp::{FitData, FitInit, FitOptions, VariationalEngine};

use clap::Parser;

#[derive(Parser, Debug, Clone)]
pub struct FitArgs {
    /// spike-count matrix file (TSV, time bins x channels)
    #[arg(required = true)]
    spike_file: Box<str>,

    /// number of latent trajectories
    #[arg(long, short = 'l', default_value_t = 1)]
    n_latents: usize,

    /// autoregressive history order of the spike regression
    #[arg(long, short = 'p', default_value_t = 2)]
    history: usize,

    /// GP prior marginal variance, shared across latents
    #[arg(long, default_value_t = 1.0)]
    prior_variance: f64,

    /// GP prior decay (inverse squared lengthscale), shared across latents
    #[arg(long, default_value_t = 1e-2)]
    prior_decay: f64,

    /// maximum number of outer iterations
    #[arg(long, default_value_t = 200)]
    max_iter: usize,

    /// posterior covariance sweeps per outer iteration
    #[arg(long, default_value_t = 1)]
    inner_iter: usize,

    /// convergence tolerance on the largest parameter change
    #[arg(long, default_value_t = 1e-4)]
    tol: f64,

    /// adapt the GP hyperparameters during the fit
    #[arg(long, default_value_t = false)]
    adapt_hyper: bool,

    /// outer iterations between hyperparameter steps
    #[arg(long, default_value_t = 5)]
    hyper_interval: usize,

    /// target norm of each loading vector
    #[arg(long, default_value_t = 1.0)]
    loading_norm: f64,

    /// freeze the regression coefficients
    #[arg(long, default_value_t = false)]
    fix_regression: bool,

    /// freeze the loading coefficients
    #[arg(long, default_value_t = false)]
    fix_loading: bool,

    /// freeze the posterior mean
    #[arg(long, default_value_t = false)]
    fix_posterior_mean: bool,

    /// freeze the posterior covariance
    #[arg(long, default_value_t = false)]
    fix_posterior_cov: bool,

    /// random seed for the loading initializer
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// output file header
    #[arg(long, short, required = true)]
    out: Box<str>,

    /// verbosity
    #[arg(long, short)]
    verbose: bool,
}

/// Fit the latent-trajectory model and write the posterior, the
/// coefficients, and the lower-bound trace next to the output header.
pub fn run_fit(args: FitArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let spikes = read_tsv(&args.spike_file)?;
    info!(
        "read {} x {} spike counts from {}",
        spikes.nrows(),
        spikes.ncols(),
        &args.spike_file
    );

    let regressor = make_regressor(&spikes, args.history, true);
    let prior_mean = Mat::zeros(spikes.nrows(), args.n_latents);

    let data = FitData {
        spikes: &spikes,
        regressor: &regressor,
        prior_mean: &prior_mean,
        prior_variance: vec![args.prior_variance; args.n_latents],
        prior_decay: vec![args.prior_decay; args.n_latents],
    };
    let opts = FitOptions {
        max_iterations: args.max_iter,
        fixed_point_inner_iterations: args.inner_iter,
        tolerance: args.tol,
        verbose: args.verbose,
        fix_regression: args.fix_regression,
        fix_loading: args.fix_loading,
        fix_posterior_mean: args.fix_posterior_mean,
        fix_posterior_cov: args.fix_posterior_cov,
        adapt_hyper: args.adapt_hyper,
        hyper_interval: args.hyper_interval,
        loading_norm: args.loading_norm,
        seed: args.seed,
    };

    let mut engine = VariationalEngine::new(data, FitInit::default(), opts)?;
    let out = engine.fit();

    info!(
        "{} iterations in {:.2}s, converged: {}, final bound {:.6}",
        out.iterations,
        out.elapsed.as_secs_f64(),
        out.converged,
        out.lower_bound.last().unwrap_or(&f64::NAN)
    );

    write_tsv(&out.posterior_mean, &format!("{}.post_mean.tsv", args.out))?;
    write_tsv(&out.alpha, &format!("{}.alpha.tsv", args.out))?;
    write_tsv(&out.beta, &format!("{}.beta.tsv", args.out))?;
    write_column_tsv(&out.lower_bound, &format!("{}.bound.tsv", args.out))?;
    info!("done -> {}", args.out);

    Ok(())
}
