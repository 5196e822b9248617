use gp_util::common_io::write_tsv;
use gp_util::sampling::rnorm_seeded;

use vlgp::common::*;
use vlgp::sim::{gp_latents, spike_trains};

use clap::Parser;

#[derive(Parser, Debug, Clone)]
pub struct SimArgs {
    /// number of time bins
    #[arg(long, short = 't', default_value_t = 500)]
    n_bins: usize,

    /// number of observed channels
    #[arg(long, short = 'n', default_value_t = 10)]
    n_channels: usize,

    /// number of latent trajectories
    #[arg(long, short = 'l', default_value_t = 2)]
    n_latents: usize,

    /// GP prior marginal variance
    #[arg(long, default_value_t = 1.0)]
    variance: f64,

    /// GP prior decay (inverse squared lengthscale)
    #[arg(long, default_value_t = 1e-2)]
    decay: f64,

    /// autoregressive history order of the spike regression
    #[arg(long, short = 'p', default_value_t = 2)]
    history: usize,

    /// baseline log rate shared by all channels
    #[arg(long, default_value_t = 0.0)]
    baseline: f64,

    /// norm of each true loading vector
    #[arg(long, default_value_t = 1.0)]
    loading_norm: f64,

    /// random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// output file header
    #[arg(long, short, required = true)]
    out: Box<str>,

    /// verbosity
    #[arg(long, short)]
    verbose: bool,
}

/// Simulate spike counts from known latent trajectories and write the
/// counts together with the ground truth next to the output header.
pub fn run_sim(args: SimArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let latents = gp_latents(
        args.n_bins,
        args.n_latents,
        args.variance,
        args.decay,
        args.seed,
    );

    // random loadings at the target norm, intercept-only regression
    let mut alpha = rnorm_seeded(
        args.n_latents,
        args.n_channels,
        args.seed.wrapping_add(1),
    );
    for mut row in alpha.row_iter_mut() {
        let norm = row.norm();
        if norm > 0.0 {
            row *= args.loading_norm / norm;
        }
    }
    let mut beta = Mat::zeros(1 + args.history * args.n_channels, args.n_channels);
    for n in 0..args.n_channels {
        beta[(0, n)] = args.baseline;
    }

    let (spikes, rates) = spike_trains(
        &latents,
        &alpha,
        &beta,
        args.history,
        args.seed.wrapping_add(2),
    )?;
    info!(
        "simulated {} x {} counts, {} spikes in total",
        spikes.nrows(),
        spikes.ncols(),
        spikes.sum() as u64
    );

    write_tsv(&spikes, &format!("{}.spikes.tsv", args.out))?;
    write_tsv(&rates, &format!("{}.rate.tsv", args.out))?;
    write_tsv(&latents, &format!("{}.latent.tsv", args.out))?;
    write_tsv(&alpha, &format!("{}.alpha.tsv", args.out))?;
    write_tsv(&beta, &format!("{}.beta.tsv", args.out))?;
    info!("done -> {}", args.out);

    Ok(())
}
