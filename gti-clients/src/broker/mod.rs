//! Market-data brokers: Interactive Brokers (Client Portal gateway) and Alpaca.

pub mod alpaca;
pub mod ib;

pub use alpaca::Alpaca;
pub use ib::{Contract, IbClient, OptionChain};

use crate::http::HttpError;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("gateway is not authenticated")]
    NotAuthenticated,

    #[error("no contract found for '{0}'")]
    UnknownSymbol(String),

    #[error("build bars frame: {0}")]
    Frame(#[from] PolarsError),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// One OHLCV bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Bars as a frame with columns `Date, Open, High, Low, Close, Volume`.
pub fn bars_to_dataframe(bars: &[Bar]) -> PolarsResult<DataFrame> {
    let millis: Vec<i64> = bars.iter().map(|b| b.time.and_utc().timestamp_millis()).collect();
    let field = |f: fn(&Bar) -> f64| bars.iter().map(f).collect::<Vec<f64>>();
    DataFrame::new(vec![
        Column::new("Date".into(), millis)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
        Column::new("Open".into(), field(|b| b.open)),
        Column::new("High".into(), field(|b| b.high)),
        Column::new("Low".into(), field(|b| b.low)),
        Column::new("Close".into(), field(|b| b.close)),
        Column::new("Volume".into(), field(|b| b.volume)),
    ])
}

/// Snapshot prices; NaN where the feed has no value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub last: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Default for Quote {
    fn default() -> Self {
        Self {
            last: f64::NAN,
            open: f64::NAN,
            high: f64::NAN,
            low: f64::NAN,
            close: f64::NAN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl std::str::FromStr for Side {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" | "b" => Ok(Side::Buy),
            "sell" | "s" => Ok(Side::Sell),
            other => Err(BrokerError::Invalid {
                field: "side",
                reason: format!("expected buy or sell, got '{other}'"),
            }),
        }
    }
}

/// Lookback for a history request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryPeriod {
    Days(u32),
    Years(u32),
}

impl HistoryPeriod {
    /// Period covering `start..=end`: whole years (rounded up) past 365 days,
    /// otherwise days, never less than one.
    pub fn for_span(start: NaiveDate, end: NaiveDate) -> Self {
        let days = (end - start).num_days().max(1) as u32;
        if days > 365 {
            HistoryPeriod::Years(days.div_ceil(365))
        } else {
            HistoryPeriod::Days(days)
        }
    }

    /// Gateway form: `30d`, `2y`.
    pub fn gateway(&self) -> String {
        match self {
            HistoryPeriod::Days(n) => format!("{n}d"),
            HistoryPeriod::Years(n) => format!("{n}y"),
        }
    }
}

impl fmt::Display for HistoryPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryPeriod::Days(n) => write!(f, "{n} D"),
            HistoryPeriod::Years(n) => write!(f, "{n} Y"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn history_period_rounds_years_up() {
        assert_eq!(HistoryPeriod::for_span(d(2024, 1, 1), d(2024, 1, 31)), HistoryPeriod::Days(30));
        assert_eq!(HistoryPeriod::for_span(d(2023, 1, 1), d(2024, 1, 1)), HistoryPeriod::Days(365));
        assert_eq!(HistoryPeriod::for_span(d(2022, 1, 1), d(2024, 1, 1)), HistoryPeriod::Years(2));
        assert_eq!(HistoryPeriod::for_span(d(2022, 1, 1), d(2024, 1, 3)), HistoryPeriod::Years(3));
        assert_eq!(HistoryPeriod::for_span(d(2024, 1, 1), d(2024, 1, 1)), HistoryPeriod::Days(1));
        assert_eq!(HistoryPeriod::Years(2).to_string(), "2 Y");
        assert_eq!(HistoryPeriod::Days(5).gateway(), "5d");
    }

    #[test]
    fn bars_frame_has_ohlcv_columns() {
        let bar = Bar {
            time: d(2024, 5, 1).and_hms_opt(0, 0, 0).unwrap(),
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 100.0,
        };
        let df = bars_to_dataframe(&[bar]).unwrap();
        let names: Vec<&str> = df.get_columns().iter().map(|c| c.name().as_str()).collect();
        assert_eq!(names, ["Date", "Open", "High", "Low", "Close", "Volume"]);
        let empty = bars_to_dataframe(&[]).unwrap();
        assert_eq!((empty.height(), empty.width()), (0, 6));
    }

    #[test]
    fn side_parsing() {
        assert_eq!("BUY".parse::<Side>().unwrap(), Side::Buy);
        assert!("hold".parse::<Side>().is_err());
    }
}
