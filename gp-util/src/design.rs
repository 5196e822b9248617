use crate::common::*;

/// Build the autoregressive design matrix from a count matrix.
///
/// Row `t` is `[1, y[t-1, :], y[t-2, :], ..., y[t-p, :]]` (the leading
/// intercept column is optional). Lags reaching before the start of the
/// series are zero.
///
/// * `spikes` - `(T, N)` count matrix
/// * `p` - autoregressive order
/// * `intercept` - include the leading column of ones
pub fn make_regressor(spikes: &Mat, p: usize, intercept: bool) -> Mat {
    let tt = spikes.nrows();
    let nn = spikes.ncols();
    let offset = usize::from(intercept);
    let mut regressor = Mat::zeros(tt, offset + p * nn);

    if intercept {
        regressor.column_mut(0).fill(1.0);
    }
    for lag in 1..=p {
        for t in lag..tt {
            for n in 0..nn {
                regressor[(t, offset + (lag - 1) * nn + n)] = spikes[(t - lag, n)];
            }
        }
    }
    regressor
}
