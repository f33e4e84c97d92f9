// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

/// `n` evenly spaced values over `[start, stop]`, both ends included.
pub(crate) fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Values `start, start + step, ...` strictly below `stop`.
pub(crate) fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if step <= 0.0 || stop <= start {
        return vec![];
    }
    let n = ((stop - start) / step).ceil() as usize;
    (0..n)
        .map(|i| start + step * i as f64)
        .take_while(|&v| v < stop)
        .collect()
}

/// Piecewise linear interpolation of `(xp, fp)` at `x`.
///
/// `xp` must be increasing. Values outside the range are clamped to the end points.
pub(crate) fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    debug_assert_eq!(xp.len(), fp.len());
    let n = xp.len();
    if n == 0 {
        return f64::NAN;
    }
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[n - 1] {
        return fp[n - 1];
    }
    // First index with xp[i] > x; x lies in [xp[i - 1], xp[i]).
    let i = xp.partition_point(|&v| v <= x);
    let (x0, x1) = (xp[i - 1], xp[i]);
    let (y0, y1) = (fp[i - 1], fp[i]);
    if x1 == x0 {
        return y0;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Interpolate `(xp, fp)` on every point of `x`.
pub(crate) fn interp_all(x: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    x.iter().map(|&v| interp(v, xp, fp)).collect()
}
