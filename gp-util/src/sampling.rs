use crate::common::*;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{StandardNormal, Uniform};
use rayon::prelude::*;

/// Sample a `dd x nn` matrix from `U(0, 1)`
pub fn runif(dd: usize, nn: usize) -> Mat {
    let runif = Uniform::new(0.0, 1.0).expect("valid range");

    let rvec = (0..(dd * nn))
        .into_par_iter()
        .map_init(rand::rng, |rng, _| rng.sample(runif))
        .collect();

    Mat::from_vec(dd, nn, rvec)
}

/// Sample a `dd x nn` matrix from `N(0, 1)`
pub fn rnorm(dd: usize, nn: usize) -> Mat {
    let rvec = (0..(dd * nn))
        .into_par_iter()
        .map_init(rand::rng, |rng, _| rng.sample(StandardNormal))
        .collect();

    Mat::from_vec(dd, nn, rvec)
}

/// Sample a `dd x nn` matrix from `N(0, 1)` with a fixed seed
/// (sequential, so the draw is reproducible)
pub fn rnorm_seeded(dd: usize, nn: usize, seed: u64) -> Mat {
    let mut rng = SmallRng::seed_from_u64(seed);
    Mat::from_fn(dd, nn, |_, _| rng.sample(StandardNormal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runif_in_unit_interval() {
        let xx = runif(50, 4);
        assert!(xx.iter().all(|&x| (0.0..1.0).contains(&x)));
    }

    #[test]
    fn seeded_normal_is_reproducible() {
        let a = rnorm_seeded(10, 3, 7);
        let b = rnorm_seeded(10, 3, 7);
        assert_eq!(a, b);
        let c = rnorm_seeded(10, 3, 8);
        assert_ne!(a, c);
    }
}
