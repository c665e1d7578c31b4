//! Local frame storage: dated saves and loads in CSV or Parquet.

pub mod format;
pub mod loader;
pub mod saver;

pub use format::FileFormat;
pub use loader::{format_of, load_local, read_bytes};
pub use saver::DataSaver;

use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unsupported file format '{0}' (expected parquet or csv)")]
    UnsupportedFormat(String),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("polars: {0}")]
    Polars(#[from] PolarsError),
}
