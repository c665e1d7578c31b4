//! Date-indexed numeric frames.
//!
//! `DataFrame` is what comes back from files, queries and brokers; the
//! analytics and charts work on [`TimeFrame`], which pins the first column as
//! a timestamp index and keeps the rest as `f64` columns (nulls become NaN).

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame has no columns")]
    NoColumns,

    #[error("cannot parse '{value}' in column '{column}' as a timestamp")]
    BadTimestamp { column: String, value: String },

    #[error("null timestamp at row {row}")]
    NullTimestamp { row: usize },

    #[error("column '{0}' not found")]
    MissingColumn(String),

    #[error("column '{column}' has {got} rows, index has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        got: usize,
    },

    #[error("column '{column}' is not numeric ({dtype})")]
    NotNumeric { column: String, dtype: String },

    #[error("polars: {0}")]
    Polars(#[from] PolarsError),
}

/// Text formats accepted for timestamp columns, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y%m%d %H:%M:%S",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%Y%m%d"];

/// Parse a timestamp in any of the supported text layouts.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    None
}

/// 1970-01-01T00:00:00
fn epoch() -> NaiveDateTime {
    NaiveDateTime::default()
}

/// A frame indexed by timestamp with named numeric columns.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeFrame {
    index_name: String,
    index: Vec<NaiveDateTime>,
    columns: Vec<(String, Vec<f64>)>,
}

impl TimeFrame {
    pub fn new(
        index_name: impl Into<String>,
        index: Vec<NaiveDateTime>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self, FrameError> {
        let expected = index.len();
        for (name, values) in &columns {
            if values.len() != expected {
                return Err(FrameError::LengthMismatch {
                    column: name.clone(),
                    expected,
                    got: values.len(),
                });
            }
        }
        Ok(Self {
            index_name: index_name.into(),
            index,
            columns,
        })
    }

    /// Build from daily dates, the common case for market data.
    pub fn from_dates(
        index_name: impl Into<String>,
        dates: &[NaiveDate],
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self, FrameError> {
        let index = dates.iter().map(|d| d.and_time(NaiveTime::MIN)).collect();
        Self::new(index_name, index, columns)
    }

    /// Convert a polars frame: first column is the timestamp, the rest numeric.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self, FrameError> {
        let cols = df.get_columns();
        let first = cols.first().ok_or(FrameError::NoColumns)?;
        let index_name = first.name().to_string();
        let index = timestamps_of(first.as_materialized_series())?;

        let mut columns = Vec::with_capacity(cols.len() - 1);
        for col in &cols[1..] {
            let series = col.as_materialized_series();
            columns.push((series.name().to_string(), floats_of(series)?));
        }
        Self::new(index_name, index, columns)
    }

    /// Convert back to polars; the index becomes a millisecond `Datetime` column.
    pub fn to_dataframe(&self) -> Result<DataFrame, FrameError> {
        let millis: Vec<i64> = self
            .index
            .iter()
            .map(|ts| ts.and_utc().timestamp_millis())
            .collect();
        let mut cols = Vec::with_capacity(self.columns.len() + 1);
        cols.push(
            Column::new(self.index_name.as_str().into(), millis)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
        );
        for (name, values) in &self.columns {
            cols.push(Column::new(name.as_str().into(), values.clone()));
        }
        Ok(DataFrame::new(cols)?)
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.index.iter().map(|ts| ts.date()).collect()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn columns(&self) -> &[(String, Vec<f64>)] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Result<&[f64], FrameError> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
            .ok_or_else(|| FrameError::MissingColumn(name.to_string()))
    }

    /// The first value column, which single-series analytics operate on.
    pub fn first_column(&self) -> Result<(&str, &[f64]), FrameError> {
        self.columns
            .first()
            .map(|(n, v)| (n.as_str(), v.as_slice()))
            .ok_or(FrameError::NoColumns)
    }

    /// Append a column, replacing one of the same name.
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self, FrameError> {
        let name = name.into();
        if values.len() != self.index.len() {
            return Err(FrameError::LengthMismatch {
                column: name,
                expected: self.index.len(),
                got: values.len(),
            });
        }
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = values,
            None => self.columns.push((name, values)),
        }
        Ok(self)
    }

    /// Keep only the named columns, in the given order.
    pub fn select(&self, names: &[&str]) -> Result<Self, FrameError> {
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            columns.push((name.to_string(), self.column(name)?.to_vec()));
        }
        Self::new(self.index_name.clone(), self.index.clone(), columns)
    }

    /// Keep the rows whose positions satisfy `keep`.
    pub fn filter_rows(&self, keep: impl Fn(usize) -> bool) -> Self {
        let rows: Vec<usize> = (0..self.len()).filter(|&i| keep(i)).collect();
        self.take_rows(&rows)
    }

    pub fn take_rows(&self, rows: &[usize]) -> Self {
        Self {
            index_name: self.index_name.clone(),
            index: rows.iter().map(|&i| self.index[i]).collect(),
            columns: self
                .columns
                .iter()
                .map(|(n, v)| (n.clone(), rows.iter().map(|&i| v[i]).collect()))
                .collect(),
        }
    }

    /// Stable sort by timestamp.
    pub fn sort_by_index(&self) -> Self {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by_key(|&i| self.index[i]);
        self.take_rows(&order)
    }

    pub fn tail(&self, n: usize) -> Self {
        let start = self.len().saturating_sub(n);
        let rows: Vec<usize> = (start..self.len()).collect();
        self.take_rows(&rows)
    }

    /// Rows whose date falls in `[start, end]`.
    pub fn slice_dates(&self, start: NaiveDate, end: NaiveDate) -> Self {
        self.filter_rows(|i| {
            let d = self.index[i].date();
            d >= start && d <= end
        })
    }

    /// Drop rows where any value column is NaN.
    pub fn drop_nan_rows(&self) -> Self {
        self.filter_rows(|i| self.columns.iter().all(|(_, v)| !v[i].is_nan()))
    }
}

// ── polars column conversion ─────────────────────────────────────────

fn timestamps_of(series: &Series) -> Result<Vec<NaiveDateTime>, FrameError> {
    let name = series.name().to_string();
    match series.dtype() {
        DataType::Date => {
            let days = series.cast(&DataType::Int32)?;
            let days = days.i32()?;
            (0..days.len())
                .map(|row| {
                    let d = days.get(row).ok_or(FrameError::NullTimestamp { row })?;
                    Ok(epoch() + chrono::Duration::days(d as i64))
                })
                .collect()
        }
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            let raw = series.cast(&DataType::Int64)?;
            let raw = raw.i64()?;
            (0..raw.len())
                .map(|row| {
                    let v = raw.get(row).ok_or(FrameError::NullTimestamp { row })?;
                    let offset = match unit {
                        TimeUnit::Nanoseconds => chrono::Duration::nanoseconds(v),
                        TimeUnit::Microseconds => chrono::Duration::microseconds(v),
                        TimeUnit::Milliseconds => chrono::Duration::milliseconds(v),
                    };
                    Ok(epoch() + offset)
                })
                .collect()
        }
        DataType::String => {
            let text = series.str()?;
            (0..text.len())
                .map(|row| {
                    let raw = text.get(row).ok_or(FrameError::NullTimestamp { row })?;
                    parse_timestamp(raw).ok_or_else(|| FrameError::BadTimestamp {
                        column: name.clone(),
                        value: raw.to_string(),
                    })
                })
                .collect()
        }
        other => Err(FrameError::BadTimestamp {
            column: name,
            value: format!("<{other}>"),
        }),
    }
}

fn floats_of(series: &Series) -> Result<Vec<f64>, FrameError> {
    let numeric = matches!(
        series.dtype(),
        DataType::Boolean
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
            | DataType::Null
    );
    if !numeric {
        return Err(FrameError::NotNumeric {
            column: series.name().to_string(),
            dtype: series.dtype().to_string(),
        });
    }
    let cast = series.cast(&DataType::Float64)?;
    let ca = cast.f64()?;
    Ok((0..ca.len()).map(|i| ca.get(i).unwrap_or(f64::NAN)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parses_common_timestamp_layouts() {
        let midnight = d(2023, 4, 1).and_time(NaiveTime::MIN);
        assert_eq!(parse_timestamp("2023-04-01"), Some(midnight));
        assert_eq!(parse_timestamp("04/01/2023"), Some(midnight));
        assert_eq!(parse_timestamp("2023-04-01T00:00:00Z"), Some(midnight));
        assert_eq!(
            parse_timestamp("2023-04-01 09:30:00").map(|t| t.time()),
            NaiveTime::from_hms_opt(9, 30, 0)
        );
        assert_eq!(parse_timestamp("not a date"), None);
    }

    #[test]
    fn from_dataframe_with_string_dates() {
        let df = DataFrame::new(vec![
            Column::new("date_time".into(), ["2023-04-01", "2023-04-02"]),
            Column::new("value1".into(), [22i64, 4]),
            Column::new("value2".into(), [Some(43.0), None]),
        ])
        .unwrap();

        let frame = TimeFrame::from_dataframe(&df).unwrap();
        assert_eq!(frame.index_name(), "date_time");
        assert_eq!(frame.dates(), vec![d(2023, 4, 1), d(2023, 4, 2)]);
        assert_eq!(frame.column("value1").unwrap(), &[22.0, 4.0]);
        assert!(frame.column("value2").unwrap()[1].is_nan());
    }

    #[test]
    fn round_trips_through_polars_datetime() {
        let frame = TimeFrame::from_dates(
            "date",
            &[d(2024, 1, 2), d(2024, 1, 3)],
            vec![("close".into(), vec![101.0, 102.0])],
        )
        .unwrap();
        let df = frame.to_dataframe().unwrap();
        assert_eq!(df.height(), 2);
        let back = TimeFrame::from_dataframe(&df).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn bad_timestamp_is_reported() {
        let df = DataFrame::new(vec![
            Column::new("date".into(), ["2023-04-01", "yesterday"]),
            Column::new("v".into(), [1.0, 2.0]),
        ])
        .unwrap();
        assert!(matches!(
            TimeFrame::from_dataframe(&df),
            Err(FrameError::BadTimestamp { .. })
        ));
    }

    #[test]
    fn text_value_column_is_rejected() {
        let df = DataFrame::new(vec![
            Column::new("date".into(), ["2023-04-01"]),
            Column::new("ticker".into(), ["SPY"]),
        ])
        .unwrap();
        assert!(matches!(
            TimeFrame::from_dataframe(&df),
            Err(FrameError::NotNumeric { .. })
        ));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let err = TimeFrame::from_dates("date", &[d(2024, 1, 1)], vec![("v".into(), vec![])]);
        assert!(matches!(err, Err(FrameError::LengthMismatch { .. })));
    }

    #[test]
    fn slice_sort_and_tail() {
        let frame = TimeFrame::from_dates(
            "date",
            &[d(2024, 1, 3), d(2024, 1, 1), d(2024, 1, 2)],
            vec![("v".into(), vec![3.0, 1.0, 2.0])],
        )
        .unwrap()
        .sort_by_index();
        assert_eq!(frame.column("v").unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(frame.tail(1).column("v").unwrap(), &[3.0]);
        let sliced = frame.slice_dates(d(2024, 1, 2), d(2024, 1, 3));
        assert_eq!(sliced.len(), 2);
    }

    #[test]
    fn with_column_replaces_existing() {
        let frame = TimeFrame::from_dates("date", &[d(2024, 1, 1)], vec![("v".into(), vec![1.0])])
            .unwrap()
            .with_column("v", vec![9.0])
            .unwrap();
        assert_eq!(frame.width(), 1);
        assert_eq!(frame.column("v").unwrap(), &[9.0]);
    }
}
