//! Small numeric helpers shared by the aligner and the handlers
//!
//! - [`interp`] / [`interp_many`] - piecewise-linear interpolation with edge hold
//! - [`median_filter`] - running median with an odd window
//! - [`nearest_index`] - nearest sample lookup in a sorted time vector

/// Piecewise-linear interpolation of `(xp, fp)` at `x`.
///
/// Values outside `xp` take the nearest edge value. `xp` must be sorted.
/// Returns NaN when `xp` is empty.
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let n = xp.len().min(fp.len());
    if n == 0 {
        return f64::NAN;
    }
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[n - 1] {
        return fp[n - 1];
    }
    let i = xp[..n].partition_point(|&v| v <= x);
    let (x0, x1) = (xp[i - 1], xp[i]);
    let (y0, y1) = (fp[i - 1], fp[i]);
    if x1 == x0 {
        return y1;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// [`interp`] at every point of `xs`
pub fn interp_many(xs: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    xs.iter().map(|&x| interp(x, xp, fp)).collect()
}

/// Index of the sample in sorted `times` closest to `t` (ties go earlier)
pub fn nearest_index(times: &[f64], t: f64) -> Option<usize> {
    if times.is_empty() {
        return None;
    }
    let i = times.partition_point(|&v| v < t);
    if i == 0 {
        return Some(0);
    }
    if i == times.len() {
        return Some(times.len() - 1);
    }
    if t - times[i - 1] <= times[i] - t {
        Some(i - 1)
    } else {
        Some(i)
    }
}

/// Running median with an odd `window`.
///
/// Near the edges the window shrinks symmetrically so every output is the
/// median of real samples. A window of 0 or 1 returns the input unchanged.
pub fn median_filter(values: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 || values.len() < 2 {
        return values.to_vec();
    }
    let half = window / 2;
    let n = values.len();
    let mut buf = Vec::with_capacity(window);

    (0..n)
        .map(|i| {
            let reach = half.min(i).min(n - 1 - i);
            buf.clear();
            buf.extend_from_slice(&values[i - reach..=i + reach]);
            buf.sort_by(|a, b| a.total_cmp(b));
            buf[buf.len() / 2]
        })
        .collect()
}
