//! Frame-level analytics facade.

use super::cointegration::engle_granger;
use super::describe::{describe, Description, ForecastRow};
use super::period::{resample_last, Period, PeriodFrame};
use super::regression::{linregress, LinearFit};
use super::stats::{self, pct_change, rolling, rolling_pair, round_to};
use super::weights::{self, CategoryValue, CategoryWeight};
use super::{join, AnalyticsError, Measure};
use crate::frame::{FrameError, TimeFrame};
use chrono::{Datelike, Duration, NaiveDate};
use polars::prelude::DataFrame;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Start date and length of [`DataAnalytics::dummy_value`].
const DUMMY_START: (i32, u32, u32) = (2023, 4, 24);
const DUMMY_ROWS: usize = 100;

/// Analytics over a frame whose index is the date column.
///
/// Single-series operations (`slope`, `perc_change`, `describe`, ...) use the
/// first value column.
#[derive(Debug, Clone)]
pub struct DataAnalytics {
    frame: TimeFrame,
}

impl DataAnalytics {
    pub fn new(frame: TimeFrame) -> Self {
        Self { frame }
    }

    pub fn from_dataframe(df: &DataFrame) -> Result<Self, AnalyticsError> {
        Ok(Self::new(TimeFrame::from_dataframe(df)?))
    }

    pub fn frame(&self) -> &TimeFrame {
        &self.frame
    }

    // ── Weights and resampling ───────────────────────────────────────

    pub fn pct_weights(&self) -> Result<TimeFrame, AnalyticsError> {
        Ok(weights::pct_weights(&self.frame)?)
    }

    /// Last non-null value of each column per period, labelled `2023Q1` or
    /// `2023`.
    pub fn filter_period(&self, period: Period) -> Result<PeriodFrame, AnalyticsError> {
        Ok(resample_last(&self.frame, period)?)
    }

    pub fn category_weights(rows: &[CategoryValue]) -> Vec<CategoryWeight> {
        weights::category_weights(rows)
    }

    /// Quarterly and yearly last rows, dropping periods with missing values.
    pub fn filter_by_quarter_and_year(&self) -> Result<(PeriodFrame, PeriodFrame), AnalyticsError> {
        let quarterly = resample_last(&self.frame, Period::Quarter)?.drop_incomplete();
        let yearly = resample_last(&self.frame, Period::Year)?.drop_incomplete();
        Ok((quarterly, yearly))
    }

    /// 100 daily rows from 2023-04-24 with integer values in `[0, 100)`.
    /// A seed makes the output reproducible.
    pub fn dummy_value(seed: Option<u64>) -> Result<TimeFrame, FrameError> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (y, m, d) = DUMMY_START;
        let start = NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default();
        let dates: Vec<NaiveDate> = (0..DUMMY_ROWS as i64).map(|i| start + Duration::days(i)).collect();
        let values = (0..DUMMY_ROWS).map(|_| rng.gen_range(0..100) as f64).collect();
        TimeFrame::from_dates("Date", &dates, vec![("Value".to_string(), values)])
    }

    pub fn full_join(frames: &[TimeFrame]) -> Result<TimeFrame, AnalyticsError> {
        join::full_join(frames)
    }

    // ── Pairwise statistics ──────────────────────────────────────────

    fn pair(&self, a: &str, b: &str) -> Result<(&[f64], &[f64]), AnalyticsError> {
        Ok((self.frame.column(a)?, self.frame.column(b)?))
    }

    /// Sample covariance of two columns, or per-row over a trailing window.
    pub fn covariance(&self, a: &str, b: &str, window: Option<usize>) -> Result<Measure, AnalyticsError> {
        let (xa, xb) = self.pair(a, b)?;
        pairwise(xa, xb, window, stats::covariance)
    }

    /// Pearson correlation of two columns, or per-row over a trailing window.
    pub fn correlation(&self, a: &str, b: &str, window: Option<usize>) -> Result<Measure, AnalyticsError> {
        let (xa, xb) = self.pair(a, b)?;
        pairwise(xa, xb, window, stats::correlation)
    }

    /// Engle-Granger cointegration p-value of `a` against `b`.
    pub fn cointegration_pvalue(&self, a: &str, b: &str) -> Result<f64, AnalyticsError> {
        let (xa, xb) = self.pair(a, b)?;
        let (ya, yb) = complete_pairs(xa, xb);
        let result = engle_granger(&ya, &yb).ok_or(AnalyticsError::NotEnoughData {
            needed: 4,
            got: ya.len(),
        })?;
        Ok(result.p_value)
    }

    // ── Single-column statistics ─────────────────────────────────────

    /// Sample standard deviation over mean.
    pub fn coefficient_of_variation(&self, col: &str, window: Option<usize>) -> Result<Measure, AnalyticsError> {
        let values = self.frame.column(col)?;
        match window {
            None => {
                let finite = stats::finite(values);
                Ok(Measure::Value(stats::std_dev(&finite) / stats::mean(&finite)))
            }
            Some(w) => {
                check_window(w, 1)?;
                Ok(Measure::Rolling(rolling(values, w, |s| stats::std_dev(s) / stats::mean(s))))
            }
        }
    }

    /// `(value - mean) / std` against the column or its trailing window.
    pub fn z_score(&self, col: &str, value: f64, window: Option<usize>) -> Result<Measure, AnalyticsError> {
        let values = self.frame.column(col)?;
        let z = |s: &[f64]| (value - stats::mean(s)) / stats::std_dev(s);
        match window {
            None => Ok(Measure::Value(z(&stats::finite(values)))),
            Some(w) => {
                check_window(w, 1)?;
                Ok(Measure::Rolling(rolling(values, w, z)))
            }
        }
    }

    // ── Trend ────────────────────────────────────────────────────────

    /// Proleptic Gregorian ordinal of each row, 0001-01-01 being day 1.
    fn date_ordinals(&self) -> Vec<f64> {
        self.frame
            .index()
            .iter()
            .map(|ts| ts.date().num_days_from_ce() as f64)
            .collect()
    }

    /// Adds `date_ordinal` and a rolling least-squares `slope` of the first
    /// value column against it. Rows without a full window are dropped.
    pub fn add_slope_column(&self, window: usize) -> Result<TimeFrame, AnalyticsError> {
        check_window(window, 2)?;
        let (_, values) = self.frame.first_column()?;
        let ordinals = self.date_ordinals();
        let slopes = rolling_pair(&ordinals, values, window, |x, y| {
            linregress(x, y).map_or(f64::NAN, |fit| fit.slope)
        });
        Ok(self
            .frame
            .clone()
            .with_column("date_ordinal", ordinals)?
            .with_column("slope", slopes)?
            .drop_nan_rows())
    }

    /// Least-squares fit of the first value column against date ordinal.
    pub fn slope(&self) -> Result<LinearFit, AnalyticsError> {
        let (_, values) = self.frame.first_column()?;
        let (y, x) = complete_pairs(values, &self.date_ordinals());
        linregress(&x, &y).ok_or(AnalyticsError::NotEnoughData {
            needed: 2,
            got: x.len(),
        })
    }

    /// Fractional change of the first value column over `horizon - 1` rows,
    /// rounded to 4 dp, as a `perc_change` column. With `keep_only` the
    /// source column is dropped. Rows with any NaN are removed.
    pub fn perc_change(&self, horizon: usize, keep_only: bool) -> Result<TimeFrame, AnalyticsError> {
        if horizon == 0 {
            return Err(AnalyticsError::InvalidHorizon(horizon));
        }
        let (first, values) = self.frame.first_column()?;
        let change: Vec<f64> = pct_change(values, horizon - 1)
            .into_iter()
            .map(|v| round_to(v, 4))
            .collect();

        let base = if keep_only {
            let rest: Vec<&str> = self
                .frame
                .column_names()
                .into_iter()
                .filter(|n| *n != first)
                .collect();
            self.frame.select(&rest)?
        } else {
            self.frame.clone()
        };
        Ok(base.with_column("perc_change", change)?.drop_nan_rows())
    }

    // ── Distribution ─────────────────────────────────────────────────

    pub fn describe(&self) -> Result<Description, AnalyticsError> {
        let (name, values) = self.frame.first_column()?;
        Ok(describe(name, values))
    }

    /// [`describe`](Self::describe) with each statistic applied to `input`
    /// as a percentage move.
    pub fn describe_forecast(&self, input: f64) -> Result<Vec<ForecastRow>, AnalyticsError> {
        Ok(self.describe()?.forecast(input))
    }
}

fn check_window(window: usize, min: usize) -> Result<(), AnalyticsError> {
    if window < min {
        return Err(AnalyticsError::InvalidWindow { min, got: window });
    }
    Ok(())
}

/// Rows where both series have a value.
fn complete_pairs(a: &[f64], b: &[f64]) -> (Vec<f64>, Vec<f64>) {
    a.iter()
        .zip(b)
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .map(|(x, y)| (*x, *y))
        .unzip()
}

fn pairwise(
    a: &[f64],
    b: &[f64],
    window: Option<usize>,
    f: fn(&[f64], &[f64]) -> f64,
) -> Result<Measure, AnalyticsError> {
    match window {
        None => {
            let (x, y) = complete_pairs(a, b);
            Ok(Measure::Value(f(&x, &y)))
        }
        Some(w) => {
            check_window(w, 1)?;
            Ok(Measure::Rolling(rolling_pair(a, b, w, f)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 4, day).unwrap()
    }

    /// The five-row sample used throughout the docs.
    fn sample() -> DataAnalytics {
        let frame = TimeFrame::from_dates(
            "date_time",
            &[d(1), d(2), d(3), d(4), d(5)],
            vec![
                ("value1".into(), vec![22.0, 4.0, 6.0, 82.0, 10.0]),
                ("value2".into(), vec![43.0, 12.0, 56.0, 12.0, 44.0]),
            ],
        )
        .unwrap();
        DataAnalytics::new(frame)
    }

    #[test]
    fn correlation_scalar_and_rolling() {
        let da = sample();
        let c = da.correlation("value1", "value1", None).unwrap();
        assert!((c.latest() - 1.0).abs() < 1e-12);

        let rolling = da.correlation("value1", "value2", Some(3)).unwrap();
        let values = rolling.rolling().unwrap();
        assert_eq!(values.len(), 5);
        assert!(values[0].is_nan() && values[1].is_nan());
        assert!(values[2..].iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn covariance_matches_hand_calculation() {
        let da = sample();
        // mean1 = 24.8, mean2 = 33.4
        let cov = da.covariance("value1", "value2", None).unwrap().value().unwrap();
        let expected = ((-2.8 * 9.6) + (-20.8 * -21.4) + (-18.8 * 22.6) + (57.2 * -21.4) + (-14.8 * 10.6)) / 4.0;
        assert!((cov - expected).abs() < 1e-9);
    }

    #[test]
    fn zero_window_is_rejected() {
        let da = sample();
        assert!(matches!(
            da.covariance("value1", "value2", Some(0)),
            Err(AnalyticsError::InvalidWindow { .. })
        ));
        assert!(matches!(da.add_slope_column(1), Err(AnalyticsError::InvalidWindow { .. })));
    }

    #[test]
    fn missing_column_is_an_error() {
        assert!(matches!(
            sample().z_score("nope", 1.0, None),
            Err(AnalyticsError::Frame(FrameError::MissingColumn(_)))
        ));
    }

    #[test]
    fn z_score_of_mean_is_zero() {
        let da = sample();
        let z = da.z_score("value1", 24.8, None).unwrap().latest();
        assert!(z.abs() < 1e-12);
    }

    #[test]
    fn coefficient_of_variation_scalar() {
        let da = sample();
        let cv = da.coefficient_of_variation("value1", None).unwrap().latest();
        assert!((cv - 1071.2f64.sqrt() / 24.8).abs() < 1e-9);
    }

    #[test]
    fn slope_of_linear_series() {
        let frame = TimeFrame::from_dates(
            "date",
            &[d(1), d(2), d(3), d(4)],
            vec![("v".into(), vec![10.0, 12.0, 14.0, 16.0])],
        )
        .unwrap();
        let fit = DataAnalytics::new(frame).slope().unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-9);
    }

    #[test]
    fn add_slope_column_drops_warmup_rows() {
        let out = sample().add_slope_column(3).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out.column_names(), vec!["value1", "value2", "date_ordinal", "slope"]);
        // Window over 22, 4, 6: slope (6 - 22) / 2 = -8.
        assert!((out.column("slope").unwrap()[0] + 8.0).abs() < 1e-9);
    }

    #[test]
    fn perc_change_uses_horizon_minus_one() {
        let out = sample().perc_change(3, true).unwrap();
        assert_eq!(out.column_names(), vec!["value2", "perc_change"]);
        assert_eq!(out.len(), 3);
        // 6 / 22 - 1
        assert_eq!(out.column("perc_change").unwrap()[0], -0.7273);

        let full = sample().perc_change(2, false).unwrap();
        assert_eq!(full.width(), 3);
        assert!(matches!(sample().perc_change(0, true), Err(AnalyticsError::InvalidHorizon(0))));
    }

    #[test]
    fn filter_by_quarter_and_year_labels() {
        let (q, y) = sample().filter_by_quarter_and_year().unwrap();
        assert_eq!(q.labels, vec!["2023Q2"]);
        assert_eq!(y.labels, vec!["2023"]);
        assert_eq!(q.frame.column("value1").unwrap(), &[10.0]);
    }

    #[test]
    fn dummy_value_is_reproducible() {
        let a = DataAnalytics::dummy_value(Some(1)).unwrap();
        let b = DataAnalytics::dummy_value(Some(1)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 100);
        assert_eq!(a.dates()[0], NaiveDate::from_ymd_opt(2023, 4, 24).unwrap());
        assert!(a.column("Value").unwrap().iter().all(|v| (0.0..100.0).contains(v)));
    }

    #[test]
    fn describe_forecast_has_every_stat() {
        let rows = sample().describe_forecast(50.0).unwrap();
        assert_eq!(rows.len(), 18);
        assert_eq!(rows[0].stat, "count");
        assert!(rows.iter().all(|r| r.input == 50.0));
    }
}
