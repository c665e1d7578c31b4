//! Summary statistics with a fixed percentile ladder.

use super::stats::{self, percentile_sorted, round_to};
use crate::frame::FrameError;
use polars::prelude::*;

/// Percentiles reported by [`describe`], as fractions.
pub const PERCENTILES: [f64; 13] = [
    0.001, 0.01, 0.05, 0.1, 0.15, 0.25, 0.5, 0.75, 0.85, 0.9, 0.95, 0.99, 0.999,
];

/// `0.001` -> `0.1%`, `0.5` -> `50%`.
fn percentile_label(q: f64) -> String {
    let pct = round_to(q * 100.0, 4);
    if pct.fract() == 0.0 {
        format!("{}%", pct as i64)
    } else {
        format!("{pct}%")
    }
}

/// Ordered `(statistic, value)` pairs, rounded to two decimals.
#[derive(Debug, Clone, PartialEq)]
pub struct Description {
    pub column: String,
    pub rows: Vec<(String, f64)>,
}

impl Description {
    pub fn get(&self, stat: &str) -> Option<f64> {
        self.rows.iter().find(|(s, _)| s == stat).map(|(_, v)| *v)
    }

    /// Scale `input` by each statistic read as a percentage:
    /// `input * round(1 + stat / 100, 3)`.
    pub fn forecast(&self, input: f64) -> Vec<ForecastRow> {
        self.rows
            .iter()
            .map(|(stat, value)| ForecastRow {
                stat: stat.clone(),
                value: *value,
                input,
                forecast: input * round_to(1.0 + value / 100.0, 3),
            })
            .collect()
    }

    pub fn to_dataframe(&self) -> Result<DataFrame, FrameError> {
        let (stats, values): (Vec<&str>, Vec<f64>) =
            self.rows.iter().map(|(s, v)| (s.as_str(), *v)).unzip();
        Ok(DataFrame::new(vec![
            Column::new("index".into(), stats),
            Column::new(self.column.as_str().into(), values),
        ])?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRow {
    pub stat: String,
    pub value: f64,
    pub input: f64,
    pub forecast: f64,
}

pub fn forecast_to_dataframe(column: &str, rows: &[ForecastRow]) -> Result<DataFrame, FrameError> {
    Ok(DataFrame::new(vec![
        Column::new(
            "index".into(),
            rows.iter().map(|r| r.stat.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(column.into(), rows.iter().map(|r| r.value).collect::<Vec<_>>()),
        Column::new("input_value".into(), rows.iter().map(|r| r.input).collect::<Vec<_>>()),
        Column::new(
            "forecast_value".into(),
            rows.iter().map(|r| r.forecast).collect::<Vec<_>>(),
        ),
    ])?)
}

/// count, mean, std, min, the [`PERCENTILES`] ladder and max of the finite
/// values in `values`.
pub fn describe(column: &str, values: &[f64]) -> Description {
    let mut sorted = stats::finite(values);
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut rows = Vec::with_capacity(PERCENTILES.len() + 5);
    rows.push(("count".to_string(), sorted.len() as f64));
    rows.push(("mean".to_string(), stats::mean(&sorted)));
    rows.push(("std".to_string(), stats::std_dev(&sorted)));
    rows.push(("min".to_string(), sorted.first().copied().unwrap_or(f64::NAN)));
    for q in PERCENTILES {
        let value = if sorted.is_empty() {
            f64::NAN
        } else {
            percentile_sorted(&sorted, q)
        };
        rows.push((percentile_label(q), value));
    }
    rows.push(("max".to_string(), sorted.last().copied().unwrap_or(f64::NAN)));

    Description {
        column: column.to_string(),
        rows: rows.into_iter().map(|(s, v)| (s, round_to(v, 2))).collect(),
    }
}
