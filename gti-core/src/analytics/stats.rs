//! Scalar and rolling statistics over `f64` slices.
//!
//! Conventions match the usual dataframe defaults: sample (n - 1) variance,
//! linear-interpolated percentiles, and rolling windows that yield NaN until
//! the window is full or whenever it contains a NaN.

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (divide by n - 1).
pub fn variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Sample covariance of two equal-length series.
pub fn covariance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return f64::NAN;
    }
    let (ma, mb) = (mean(&a[..n]), mean(&b[..n]));
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - ma) * (y - mb))
        .sum::<f64>()
        / (n - 1) as f64
}

/// Pearson correlation coefficient.
pub fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let denom = std_dev(a) * std_dev(b);
    if denom == 0.0 {
        return f64::NAN;
    }
    covariance(a, b) / denom
}

/// Drop NaNs, the equivalent of skipping missing values.
pub fn finite(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

/// Linear-interpolated percentile, `q` in `[0, 1]`. NaNs are ignored.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = finite(values);
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    percentile_sorted(&sorted, q)
}

pub(crate) fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub fn median(values: &[f64]) -> f64 {
    percentile(values, 0.5)
}

/// Round to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

/// Apply `f` to each full trailing window.
pub fn rolling(values: &[f64], window: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if window == 0 || n < window {
        return out;
    }
    for i in (window - 1)..n {
        let w = &values[i + 1 - window..=i];
        if w.iter().any(|v| v.is_nan()) {
            continue;
        }
        out[i] = f(w);
    }
    out
}

/// Apply `f` to each full trailing window of two aligned series.
pub fn rolling_pair(
    a: &[f64],
    b: &[f64],
    window: usize,
    f: impl Fn(&[f64], &[f64]) -> f64,
) -> Vec<f64> {
    let n = a.len().min(b.len());
    let mut out = vec![f64::NAN; n];
    if window == 0 || n < window {
        return out;
    }
    for i in (window - 1)..n {
        let (wa, wb) = (&a[i + 1 - window..=i], &b[i + 1 - window..=i]);
        if wa.iter().chain(wb).any(|v| v.is_nan()) {
            continue;
        }
        out[i] = f(wa, wb);
    }
    out
}

pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, mean)
}

pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, std_dev)
}

/// Replace NaNs with the last seen value.
pub fn forward_fill(values: &[f64]) -> Vec<f64> {
    let mut last = f64::NAN;
    values
        .iter()
        .map(|&v| {
            if !v.is_nan() {
                last = v;
            }
            last
        })
        .collect()
}

/// Fractional change against the value `periods` rows earlier, after
/// forward-filling gaps. The first `periods` entries are NaN.
pub fn pct_change(values: &[f64], periods: usize) -> Vec<f64> {
    let filled = forward_fill(values);
    (0..filled.len())
        .map(|i| {
            if i < periods {
                f64::NAN
            } else {
                filled[i] / filled[i - periods] - 1.0
            }
        })
        .collect()
}
