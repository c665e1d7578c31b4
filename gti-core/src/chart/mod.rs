//! Charting helpers that emit plotly figures.

pub mod figure;
pub mod quick_plot;

pub use figure::{Annotation, Axis, Figure, Trace, TraceKind};
pub use quick_plot::{format_value, QuickPlot};

use crate::frame::FrameError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("no frames to plot")]
    NoFrames,

    #[error("frame {index} needs a date column and at least one value column")]
    TooFewColumns { index: usize },

    #[error("{labels} labels given for {frames} frames")]
    LabelMismatch { labels: usize, frames: usize },

    #[error("series has no values")]
    NoData,

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("figure serialization: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
