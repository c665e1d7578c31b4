//! Augmented Dickey-Fuller and Engle-Granger cointegration tests.
//!
//! Lag length is picked by AIC over `0..=maxlag` on a common sample, with
//! `maxlag = ceil(12 * (n / 100)^(1/4))` by default. P-values use MacKinnon's
//! (1994) response-surface approximation for the constant-only case.

use super::regression::ols;
use statrs::function::erf::erfc;

/// Deterministic terms included in the ADF regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdfRegression {
    /// No constant; used on cointegration residuals.
    NoConstant,
    Constant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdfResult {
    pub statistic: f64,
    pub p_value: f64,
    pub used_lag: usize,
    pub nobs: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CointegrationResult {
    pub statistic: f64,
    pub p_value: f64,
    /// Slope of the cointegrating regression `y0 = c + beta * y1`.
    pub hedge_ratio: f64,
}

// MacKinnon (1994) constant-trend coefficients, indexed by number of series - 1.
const TAU_MAX_C: [f64; 2] = [2.74, 0.92];
const TAU_MIN_C: [f64; 2] = [-18.83, -18.86];
const TAU_STAR_C: [f64; 2] = [-1.61, -2.62];
const TAU_C_SMALLP: [[f64; 3]; 2] = [[2.1659, 1.4412, 0.038269], [2.92, 1.5012, 0.039796]];
const TAU_C_LARGEP: [[f64; 4]; 2] = [
    [1.7339, 0.93202, -0.12745, -0.010368],
    [2.1945, 0.64695, -0.29198, -0.042377],
];

fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

fn polyval(coefs: &[f64], x: f64) -> f64 {
    coefs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Approximate p-value of a unit-root t-statistic with a constant term.
///
/// `n_series` is 1 for a plain ADF test and 2 for a two-series
/// Engle-Granger test.
pub fn mackinnon_pvalue(statistic: f64, n_series: usize) -> f64 {
    let i = n_series.clamp(1, 2) - 1;
    if statistic.is_nan() {
        return f64::NAN;
    }
    if statistic > TAU_MAX_C[i] {
        return 1.0;
    }
    if statistic < TAU_MIN_C[i] {
        return 0.0;
    }
    let z = if statistic <= TAU_STAR_C[i] {
        polyval(&TAU_C_SMALLP[i], statistic)
    } else {
        polyval(&TAU_C_LARGEP[i], statistic)
    };
    normal_cdf(z)
}

fn default_max_lag(nobs: usize, n_trend: usize) -> Option<usize> {
    let lag = (12.0 * (nobs as f64 / 100.0).powf(0.25)).ceil() as usize;
    let cap = (nobs / 2).checked_sub(n_trend + 1)?;
    Some(lag.min(cap))
}

/// Design rows `[y_{t-1}, dy_{t-1}, .., dy_{t-lag}]` (+ constant) and
/// targets `dy_t` for the last `nobs` observations.
fn adf_design(
    x: &[f64],
    diff: &[f64],
    lag: usize,
    nobs: usize,
    regression: AdfRegression,
) -> (Vec<f64>, Vec<Vec<f64>>) {
    let start = diff.len() - nobs;
    let mut rows = Vec::with_capacity(nobs);
    let mut target = Vec::with_capacity(nobs);
    for t in start..diff.len() {
        let mut row = Vec::with_capacity(lag + 2);
        row.push(x[t]);
        for j in 1..=lag {
            row.push(diff[t - j]);
        }
        if regression == AdfRegression::Constant {
            row.push(1.0);
        }
        rows.push(row);
        target.push(diff[t]);
    }
    (target, rows)
}

/// Augmented Dickey-Fuller test with AIC lag selection.
///
/// Returns `None` when the series is too short or the regression is
/// degenerate.
pub fn adf_test(x: &[f64], max_lag: Option<usize>, regression: AdfRegression) -> Option<AdfResult> {
    let n_trend = usize::from(regression == AdfRegression::Constant);
    let max_lag = match max_lag {
        Some(l) => l,
        None => default_max_lag(x.len(), n_trend)?,
    };
    if x.len() < max_lag + 3 {
        return None;
    }
    let diff: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();

    // Common sample for the information-criterion search.
    let common = diff.len() - max_lag;
    let mut best: Option<(f64, usize)> = None;
    for lag in 0..=max_lag {
        let (y, rows) = adf_design(x, &diff, lag, common, regression);
        if let Some(fit) = ols(&y, &rows) {
            let aic = fit.aic();
            if best.map_or(true, |(b, _)| aic < b) {
                best = Some((aic, lag));
            }
        }
    }
    let (_, used_lag) = best?;

    let nobs = diff.len() - used_lag;
    let (y, rows) = adf_design(x, &diff, used_lag, nobs, regression);
    let fit = ols(&y, &rows)?;
    let statistic = fit.t_value(0);
    Some(AdfResult {
        statistic,
        p_value: mackinnon_pvalue(statistic, 1),
        used_lag,
        nobs,
    })
}

/// Engle-Granger two-step cointegration test of `y0` against `y1`.
///
/// Regresses `y0` on `y1` with a constant, then runs an ADF test (no
/// constant, AIC lags) on the residuals. A near-perfect fit is reported as
/// p-value 0.
pub fn engle_granger(y0: &[f64], y1: &[f64]) -> Option<CointegrationResult> {
    let n = y0.len().min(y1.len());
    if n < 4 {
        return None;
    }
    let rows: Vec<Vec<f64>> = y1[..n].iter().map(|&v| vec![v, 1.0]).collect();
    let fit = ols(&y0[..n], &rows)?;

    let mean = y0[..n].iter().sum::<f64>() / n as f64;
    let tss: f64 = y0[..n].iter().map(|v| (v - mean).powi(2)).sum();
    let r_squared = if tss == 0.0 { 1.0 } else { 1.0 - fit.ssr / tss };
    if r_squared >= 1.0 - 100.0 * f64::EPSILON.sqrt() {
        tracing::warn!(r_squared, "cointegrating regression is a near-perfect fit");
        return Some(CointegrationResult {
            statistic: f64::NEG_INFINITY,
            p_value: 0.0,
            hedge_ratio: fit.params[0],
        });
    }

    let adf = adf_test(&fit.residuals, None, AdfRegression::NoConstant)?;
    Some(CointegrationResult {
        statistic: adf.statistic,
        p_value: mackinnon_pvalue(adf.statistic, 2),
        hedge_ratio: fit.params[0],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_walk(rng: &mut StdRng, n: usize) -> Vec<f64> {
        let mut level = 100.0;
        (0..n)
            .map(|_| {
                level += rng.gen_range(-1.0..1.0);
                level
            })
            .collect()
    }

    #[test]
    fn mackinnon_matches_known_critical_values() {
        // 5% critical values with a constant: about -2.86 (one series) and
        // -3.34 (two series).
        assert!((mackinnon_pvalue(-2.86, 1) - 0.05).abs() < 0.005);
        assert!((mackinnon_pvalue(-3.34, 2) - 0.05).abs() < 0.01);
    }

    #[test]
    fn mackinnon_bounds() {
        assert_eq!(mackinnon_pvalue(5.0, 1), 1.0);
        assert_eq!(mackinnon_pvalue(-30.0, 2), 0.0);
        assert!(mackinnon_pvalue(f64::NAN, 1).is_nan());
    }

    #[test]
    fn mackinnon_is_monotone() {
        let mut prev = 0.0;
        for i in 0..200 {
            let t = -10.0 + i as f64 * 0.05;
            let p = mackinnon_pvalue(t, 2);
            assert!(p >= prev - 1e-3, "p-value dropped at t={t}");
            prev = p;
        }
    }

    #[test]
    fn white_noise_rejects_unit_root() {
        let mut rng = StdRng::seed_from_u64(7);
        let noise: Vec<f64> = (0..250).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let result = adf_test(&noise, None, AdfRegression::Constant).unwrap();
        assert!(result.p_value < 0.01, "p = {}", result.p_value);
    }

    #[test]
    fn cointegrated_pair_has_small_pvalue() {
        let mut rng = StdRng::seed_from_u64(42);
        let x = random_walk(&mut rng, 300);
        let y: Vec<f64> = x
            .iter()
            .map(|v| 2.0 * v + 5.0 + rng.gen_range(-0.5..0.5))
            .collect();
        let result = engle_granger(&y, &x).unwrap();
        assert!(result.p_value < 0.05, "p = {}", result.p_value);
        assert!((result.hedge_ratio - 2.0).abs() < 0.1);
    }

    #[test]
    fn p_value_is_a_probability() {
        let mut rng = StdRng::seed_from_u64(3);
        let a = random_walk(&mut rng, 200);
        let b = random_walk(&mut rng, 200);
        let result = engle_granger(&a, &b).unwrap();
        assert!((0.0..=1.0).contains(&result.p_value));
    }

    #[test]
    fn exact_linear_relation_is_p_zero() {
        let x: Vec<f64> = (0..50).map(|i| (i as f64).sqrt()).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v - 1.0).collect();
        let result = engle_granger(&y, &x).unwrap();
        assert_eq!(result.p_value, 0.0);
    }

    #[test]
    fn short_series_is_rejected() {
        assert!(adf_test(&[1.0, 2.0], None, AdfRegression::Constant).is_none());
        assert!(engle_granger(&[1.0, 2.0], &[1.0, 2.0]).is_none());
    }
}
