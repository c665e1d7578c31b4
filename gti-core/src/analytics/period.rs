//! Calendar-period resampling: last observation per quarter or year.

use crate::frame::{FrameError, TimeFrame};
use chrono::{Datelike, NaiveDate, NaiveTime};
use polars::prelude::*;

/// Resampling period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Quarter,
    Year,
}

impl Period {
    /// Sort key of the period containing `date`.
    pub fn key(self, date: NaiveDate) -> (i32, u32) {
        match self {
            Period::Quarter => (date.year(), date.month0() / 3 + 1),
            Period::Year => (date.year(), 0),
        }
    }

    /// `2023Q1` or `2023`.
    pub fn label(self, date: NaiveDate) -> String {
        match self {
            Period::Quarter => format!("{}Q{}", date.year(), date.month0() / 3 + 1),
            Period::Year => date.year().to_string(),
        }
    }

    /// Last calendar day of the period containing `date`.
    pub fn end_date(self, date: NaiveDate) -> NaiveDate {
        let (year, next_month) = match self {
            Period::Quarter => {
                let q = date.month0() / 3 + 1;
                if q == 4 {
                    (date.year() + 1, 1)
                } else {
                    (date.year(), q * 3 + 1)
                }
            }
            Period::Year => (date.year() + 1, 1),
        };
        NaiveDate::from_ymd_opt(year, next_month, 1)
            .and_then(|d| d.pred_opt())
            .unwrap_or(date)
    }

    /// Name of the label column added to resampled output.
    pub fn label_column(self) -> &'static str {
        match self {
            Period::Quarter => "quarter",
            Period::Year => "year",
        }
    }
}

impl std::str::FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "q" | "quarter" | "quarterly" => Ok(Period::Quarter),
            "y" | "a" | "year" | "yearly" | "annual" => Ok(Period::Year),
            other => Err(format!("unknown period '{other}' (expected quarter or year)")),
        }
    }
}

/// A resampled frame indexed by period end, with one label per row.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodFrame {
    pub period: Period,
    pub labels: Vec<String>,
    pub frame: TimeFrame,
}

impl PeriodFrame {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Drop periods where any column has no value.
    pub fn drop_incomplete(&self) -> Self {
        let keep: Vec<usize> = (0..self.len())
            .filter(|&i| self.frame.columns().iter().all(|(_, v)| !v[i].is_nan()))
            .collect();
        Self {
            period: self.period,
            labels: keep.iter().map(|&i| self.labels[i].clone()).collect(),
            frame: self.frame.take_rows(&keep),
        }
    }

    /// The frame followed by a string label column.
    pub fn to_dataframe(&self) -> Result<DataFrame, FrameError> {
        let mut df = self.frame.to_dataframe()?;
        let labels = Column::new(self.period.label_column().into(), self.labels.clone());
        df.with_column(labels)?;
        Ok(df)
    }
}

/// Last non-NaN value of every column within each period, indexed by the
/// period end date. Periods without any observation are not emitted.
pub fn resample_last(frame: &TimeFrame, period: Period) -> Result<PeriodFrame, FrameError> {
    let sorted = frame.sort_by_index();
    let index = sorted.index();

    // Row ranges per period, in order.
    let mut groups: Vec<(NaiveDate, std::ops::Range<usize>)> = Vec::new();
    for (row, ts) in index.iter().enumerate() {
        let date = ts.date();
        match groups.last_mut() {
            Some((first, range)) if period.key(*first) == period.key(date) => range.end = row + 1,
            _ => groups.push((date, row..row + 1)),
        }
    }

    let columns = sorted
        .columns()
        .iter()
        .map(|(name, values)| {
            let last = groups
                .iter()
                .map(|(_, range)| {
                    values[range.clone()]
                        .iter()
                        .rev()
                        .copied()
                        .find(|v| !v.is_nan())
                        .unwrap_or(f64::NAN)
                })
                .collect();
            (name.clone(), last)
        })
        .collect();

    let ends = groups
        .iter()
        .map(|(d, _)| period.end_date(*d).and_time(NaiveTime::MIN))
        .collect();
    let labels = groups.iter().map(|(d, _)| period.label(*d)).collect();

    Ok(PeriodFrame {
        period,
        labels,
        frame: TimeFrame::new(sorted.index_name(), ends, columns)?,
    })
}
