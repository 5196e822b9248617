use crate::common::*;

/// Squared-exponential covariance over a regular time grid
///
/// `K[i,j] = variance * exp(-decay * (i - j)^2)`
///
/// * `n` - number of time bins
/// * `decay` - inverse of the squared lengthscale
/// * `variance` - marginal variance
pub fn sqexp_cov(n: usize, decay: f64, variance: f64) -> Mat {
    Mat::from_fn(n, n, |i, j| {
        let d = i as f64 - j as f64;
        variance * (-decay * d * d).exp()
    })
}

/// Pivoted incomplete Cholesky factorization of the unit-variance
/// squared-exponential kernel, `K ≈ G Gᵀ` with `G` of size `n x r`.
///
/// Stops early once the residual diagonal mass falls below `tol * n`.
/// Warns when the rank budget runs out before reaching the tolerance.
pub fn ichol_gauss(n: usize, decay: f64, rank: usize, tol: f64) -> Mat {
    let rank = rank.min(n);
    let mut gg = Mat::zeros(n, rank);
    let mut diag = DVec::from_element(n, 1.0);
    let mut pvec: Vec<usize> = (0..n).collect();

    let mut i = 0;
    while i < rank {
        let residual: f64 = (i..n).map(|k| diag[k]).sum();
        if residual <= tol * n as f64 {
            break;
        }

        // pivot on the largest residual diagonal
        let jast = (i..n)
            .max_by(|&a, &b| diag[a].partial_cmp(&diag[b]).expect("finite diagonal"))
            .expect("non-empty residual");
        pvec.swap(i, jast);
        diag.swap_rows(i, jast);
        gg.swap_rows(i, jast);

        let gii = diag[i].max(0.0).sqrt();
        if gii == 0.0 {
            break;
        }
        gg[(i, i)] = gii;

        for j in (i + 1)..n {
            let d = pvec[j] as f64 - pvec[i] as f64;
            let kji = (-decay * d * d).exp();
            let dot: f64 = (0..i).map(|k| gg[(j, k)] * gg[(i, k)]).sum();
            gg[(j, i)] = (kji - dot) / gii;
        }
        for j in (i + 1)..n {
            let sq: f64 = (0..=i).map(|k| gg[(j, k)] * gg[(j, k)]).sum();
            diag[j] = 1.0 - sq;
        }

        i += 1;
    }

    if i == rank && rank < n {
        let residual: f64 = (i..n).map(|k| diag[k]).sum();
        if residual > tol * n as f64 {
            warn!("incomplete Cholesky rank {} exhausted (residual {:.3e})", rank, residual);
        }
    }

    // undo the pivoting so rows line up with the original time grid
    let mut out = Mat::zeros(n, rank);
    for (row, &orig) in pvec.iter().enumerate() {
        out.row_mut(orig).copy_from(&gg.row(row));
    }
    out
}
