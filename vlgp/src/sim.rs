use crate::common::*;

use gp_util::kernel::ichol_gauss;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::Poisson;

/// Residual tolerance for the incomplete Cholesky of the sampling kernel
const ICHOL_TOL: f64 = 1e-8;
/// Log-rate clamp keeping the Poisson intensity away from overflow
const ETA_CLAMP: f64 = 20.0;

/// Draw latent Gaussian-process trajectories on a regular time grid,
/// (T, L), one independent squared-exponential draw per column. Each
/// trajectory is centered to zero mean.
pub fn gp_latents(n_bins: usize, n_latents: usize, variance: f64, decay: f64, seed: u64) -> Mat {
    let gg = ichol_gauss(n_bins, decay, n_bins, ICHOL_TOL);
    let zz = gp_util::sampling::rnorm_seeded(gg.ncols(), n_latents, seed);
    let mut xx = gg * zz * variance.sqrt();
    for mut col in xx.column_iter_mut() {
        let centre = col.mean();
        col.add_scalar_mut(-centre);
    }
    xx
}

/// Generate Poisson spike counts, (T, N), from latent trajectories through
/// a log-linear observation model with autoregressive history:
///
/// `log rate[t, n] = [1, y[t-1, :], ..., y[t-p, :]] beta_n + x[t, :] alpha_n`
///
/// The history enters through the counts already generated, so the rows
/// match the design matrix a later regression build would produce. The
/// log rate is clamped to avoid overflow of the exponential. Returns the
/// counts together with the true rates.
pub fn spike_trains(
    latents: &Mat,
    alpha: &Mat,
    beta: &Mat,
    history: usize,
    seed: u64,
) -> anyhow::Result<(Mat, Mat)> {
    let tt = latents.nrows();
    let ll = latents.ncols();
    let nn = alpha.ncols();

    if alpha.nrows() != ll {
        anyhow::bail!("alpha has {} rows for {} latents", alpha.nrows(), ll);
    }
    if beta.nrows() != 1 + history * nn || beta.ncols() != nn {
        anyhow::bail!(
            "beta must be ({}, {}) for history order {}",
            1 + history * nn,
            nn,
            history
        );
    }

    let mut rng = SmallRng::seed_from_u64(seed);
    let mut spikes = Mat::zeros(tt, nn);
    let mut rates = Mat::zeros(tt, nn);

    for t in 0..tt {
        for n in 0..nn {
            let mut eta = beta[(0, n)];
            for lag in 1..=history {
                if t >= lag {
                    for m in 0..nn {
                        eta += spikes[(t - lag, m)] * beta[(1 + (lag - 1) * nn + m, n)];
                    }
                }
            }
            for l in 0..ll {
                eta += latents[(t, l)] * alpha[(l, n)];
            }

            let rate = eta.clamp(-ETA_CLAMP, ETA_CLAMP).exp();
            rates[(t, n)] = rate;
            let pois = Poisson::new(rate)?;
            spikes[(t, n)] = rng.sample(pois);
        }
    }

    Ok((spikes, rates))
}
