//! Economic time series: FRED observations and BLS series.

pub mod bls;
pub mod fred;

pub use bls::Bls;
pub use fred::Fred;

use crate::http::HttpError;
use gti_core::frame::FrameError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MacroDataError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("{source_name} rejected the request: {message}")]
    Api {
        source_name: &'static str,
        message: String,
    },

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Numeric cell from a text payload; placeholders such as `.` or `-` are NaN.
pub(crate) fn parse_value(raw: &str) -> f64 {
    raw.trim().replace(',', "").parse().unwrap_or(f64::NAN)
}
