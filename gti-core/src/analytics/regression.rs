//! Least-squares fits.

use nalgebra::{DMatrix, DVector};

/// Simple linear regression of `y` on `x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_value: f64,
}

/// Fit `y = intercept + slope * x`. Returns `None` with fewer than two
/// points or when `x` is constant.
pub fn linregress(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let mx = x[..n].iter().sum::<f64>() / n as f64;
    let my = y[..n].iter().sum::<f64>() / n as f64;
    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    let r_value = if syy == 0.0 { 0.0 } else { sxy / (sxx * syy).sqrt() };
    Some(LinearFit {
        slope,
        intercept: my - slope * mx,
        r_value,
    })
}

/// Ordinary least squares result for a multi-regressor model.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub params: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub residuals: Vec<f64>,
    /// Sum of squared residuals.
    pub ssr: f64,
    pub nobs: usize,
}

impl OlsFit {
    /// t-statistic of coefficient `i`.
    pub fn t_value(&self, i: usize) -> f64 {
        self.params[i] / self.std_errors[i]
    }

    /// Gaussian log-likelihood at the fitted parameters.
    pub fn log_likelihood(&self) -> f64 {
        let n = self.nobs as f64;
        -n / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (self.ssr / n).ln() + 1.0)
    }

    /// Akaike information criterion, counting every regressor as a parameter.
    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood() + 2.0 * self.params.len() as f64
    }
}

/// Fit `y = X b` where `rows` are the regressor rows of `X`.
///
/// Returns `None` when the system is underdetermined or `X'X` is singular.
pub fn ols(y: &[f64], rows: &[Vec<f64>]) -> Option<OlsFit> {
    let nobs = y.len();
    let k = rows.first().map(|r| r.len())?;
    if nobs != rows.len() || nobs <= k || k == 0 {
        return None;
    }
    let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    let x = DMatrix::from_row_slice(nobs, k, &flat);
    let yv = DVector::from_column_slice(y);

    let xtx_inv = (x.transpose() * &x).try_inverse()?;
    let beta = &xtx_inv * x.transpose() * &yv;
    let residuals = &yv - &x * &beta;
    let ssr = residuals.iter().map(|r| r * r).sum::<f64>();
    let sigma2 = ssr / (nobs - k) as f64;
    let std_errors = (0..k).map(|i| (sigma2 * xtx_inv[(i, i)]).sqrt()).collect();

    Some(OlsFit {
        params: beta.iter().copied().collect(),
        std_errors,
        residuals: residuals.iter().copied().collect(),
        ssr,
        nobs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linregress_recovers_line() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [3.0, 5.0, 7.0, 9.0];
        let fit = linregress(&x, &y).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        assert!((fit.r_value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn linregress_rejects_constant_x() {
        assert!(linregress(&[1.0, 1.0], &[1.0, 2.0]).is_none());
        assert!(linregress(&[1.0], &[1.0]).is_none());
    }

    #[test]
    fn ols_with_constant_matches_linregress() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [1.1, 2.9, 5.2, 7.1, 8.8];
        let rows: Vec<Vec<f64>> = x.iter().map(|&v| vec![1.0, v]).collect();
        let fit = ols(&y, &rows).unwrap();
        let simple = linregress(&x, &y).unwrap();
        assert!((fit.params[0] - simple.intercept).abs() < 1e-9);
        assert!((fit.params[1] - simple.slope).abs() < 1e-9);
        assert_eq!(fit.nobs, 5);
        assert!(fit.std_errors.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn ols_rejects_singular_design() {
        let rows = vec![vec![1.0, 2.0], vec![2.0, 4.0], vec![3.0, 6.0]];
        assert!(ols(&[1.0, 2.0, 3.0], &rows).is_none());
    }
}
