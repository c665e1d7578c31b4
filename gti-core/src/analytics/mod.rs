//! Statistical helpers over date-indexed frames.
//!
//! [`DataAnalytics`] wraps a [`TimeFrame`](crate::frame::TimeFrame) and exposes
//! the frame-level operations; the submodules hold the plain numeric kernels
//! they are built from.

pub mod cointegration;
pub mod data_analytics;
pub mod describe;
pub mod join;
pub mod period;
pub mod regression;
pub mod stats;
pub mod weights;

pub use cointegration::{adf_test, engle_granger, AdfRegression, AdfResult, CointegrationResult};
pub use data_analytics::DataAnalytics;
pub use describe::{describe, Description, ForecastRow};
pub use join::full_join;
pub use period::{Period, PeriodFrame};
pub use regression::{linregress, ols, LinearFit, OlsFit};
pub use weights::{category_weights, pct_weights, CategoryValue, CategoryWeight};

use crate::frame::FrameError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("no frames to join")]
    NoFrames,

    #[error("column '{0}' appears in more than one frame")]
    DuplicateColumn(String),

    #[error("window must be at least {min}, got {got}")]
    InvalidWindow { min: usize, got: usize },

    #[error("horizon must be at least 1, got {0}")]
    InvalidHorizon(usize),

    #[error("need at least {needed} observations, got {got}")]
    NotEnoughData { needed: usize, got: usize },
}

/// A statistic computed either over the whole column or per row over a
/// trailing window.
#[derive(Debug, Clone, PartialEq)]
pub enum Measure {
    Value(f64),
    /// One entry per row; NaN until the window fills.
    Rolling(Vec<f64>),
}

impl Measure {
    pub fn value(&self) -> Option<f64> {
        match self {
            Measure::Value(v) => Some(*v),
            Measure::Rolling(_) => None,
        }
    }

    pub fn rolling(&self) -> Option<&[f64]> {
        match self {
            Measure::Value(_) => None,
            Measure::Rolling(v) => Some(v),
        }
    }

    /// The scalar, or the last entry of a rolling series.
    pub fn latest(&self) -> f64 {
        match self {
            Measure::Value(v) => *v,
            Measure::Rolling(v) => v.last().copied().unwrap_or(f64::NAN),
        }
    }
}
