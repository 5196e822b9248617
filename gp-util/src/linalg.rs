use crate::common::*;

/// Generalized inverse through singular value decomposition.
///
/// Singular values below `rcond * s_max` contribute nothing, so the result
/// is well defined for rank-deficient symmetric covariance matrices.
pub fn svd_pinv(mat: &Mat, rcond: f64) -> anyhow::Result<Mat> {
    let svd = mat.clone().svd(true, true);
    let s_max = svd.singular_values.max();
    svd.pseudo_inverse(rcond * s_max)
        .map_err(|e| anyhow::anyhow!("pseudo-inverse failed: {}", e))
}

/// Minimum-norm least squares solution of `aa * x = bb`.
pub fn lstsq(aa: &Mat, bb: &Mat, rcond: f64) -> anyhow::Result<Mat> {
    let svd = aa.clone().svd(true, true);
    let s_max = svd.singular_values.max();
    svd.solve(bb, rcond * s_max)
        .map_err(|e| anyhow::anyhow!("least squares failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::rnorm;
    use approx::assert_abs_diff_eq;

    #[test]
    fn pinv_inverts_full_rank() {
        let aa = rnorm(5, 5) + Mat::identity(5, 5) * 5.0;
        let pinv = svd_pinv(&aa, 1e-12).unwrap();
        let eye = &aa * pinv;
        for i in 0..5 {
            for j in 0..5 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(eye[(i, j)], expected, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn pinv_of_singular_matrix_is_finite() {
        // rank-1 outer product
        let v = DVec::from_fn(6, |i, _| (i as f64 + 1.0) / 6.0);
        let aa = &v * v.transpose();
        let pinv = svd_pinv(&aa, 1e-10).unwrap();
        assert!(pinv.iter().all(|x| x.is_finite()));
        // Moore-Penrose identity: A pinv(A) A = A
        let back = &aa * &pinv * &aa;
        for i in 0..6 {
            for j in 0..6 {
                assert_abs_diff_eq!(back[(i, j)], aa[(i, j)], epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn lstsq_recovers_coefficients() {
        let xx = rnorm(40, 3);
        let truth = Mat::from_row_slice(3, 2, &[1.0, -0.5, 0.25, 2.0, -1.0, 0.1]);
        let yy = &xx * &truth;
        let est = lstsq(&xx, &yy, 1e-12).unwrap();
        for i in 0..3 {
            for j in 0..2 {
                assert_abs_diff_eq!(est[(i, j)], truth[(i, j)], epsilon = 1e-8);
            }
        }
    }
}
