//! GTI Core: credentials config, date-indexed frames, analytics, charts and
//! local frame storage.
//!
//! This crate has no network dependencies:
//! - `config`: TOML auth file with `<SECTION>_<KEY>` environment overrides
//! - `frame`: [`TimeFrame`](frame::TimeFrame), the analytics view of a polars frame
//! - `analytics`: covariance, cointegration, slopes, percentiles, resampling
//! - `chart`: plotly figure documents and [`QuickPlot`](chart::QuickPlot)
//! - `data`: dated CSV/Parquet saves and loads

pub mod analytics;
pub mod chart;
pub mod config;
pub mod data;
pub mod frame;

pub use analytics::{AnalyticsError, DataAnalytics};
pub use config::{ConfigError, ConfigLoader};
pub use frame::{FrameError, TimeFrame};
