//! Row-wise and per-timestamp percentage weights.

use super::stats::round_to;
use crate::frame::{FrameError, TimeFrame};
use chrono::NaiveDateTime;
use std::collections::HashMap;

/// Each column as a percentage of the row total, rounded to 2 dp. Output
/// columns are named `<col>_pct`; NaN cells count as zero in the total.
pub fn pct_weights(frame: &TimeFrame) -> Result<TimeFrame, FrameError> {
    let totals: Vec<f64> = (0..frame.len())
        .map(|row| {
            frame
                .columns()
                .iter()
                .map(|(_, v)| v[row])
                .filter(|v| !v.is_nan())
                .sum()
        })
        .collect();

    let columns = frame
        .columns()
        .iter()
        .map(|(name, values)| {
            let pct = values
                .iter()
                .zip(&totals)
                .map(|(v, total)| round_to(v / total * 100.0, 2))
                .collect();
            (format!("{name}_pct"), pct)
        })
        .collect();
    TimeFrame::new(frame.index_name(), frame.index().to_vec(), columns)
}

/// One observation in long `(datetime, category, value)` layout.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryValue {
    pub datetime: NaiveDateTime,
    pub category: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryWeight {
    pub datetime: NaiveDateTime,
    pub category: String,
    pub value: f64,
    /// Share of `value` in the total for its datetime, in percent.
    pub percentage: f64,
}

/// Percentage weight of each value within its datetime group, preserving
/// input order.
pub fn category_weights(rows: &[CategoryValue]) -> Vec<CategoryWeight> {
    let mut totals: HashMap<NaiveDateTime, f64> = HashMap::new();
    for row in rows.iter().filter(|r| !r.value.is_nan()) {
        *totals.entry(row.datetime).or_default() += row.value;
    }
    rows.iter()
        .map(|row| {
            let total = totals.get(&row.datetime).copied().unwrap_or(f64::NAN);
            CategoryWeight {
                datetime: row.datetime,
                category: row.category.clone(),
                value: row.value,
                percentage: 100.0 * row.value / total,
            }
        })
        .collect()
}
