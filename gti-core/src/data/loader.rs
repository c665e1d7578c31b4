//! Read saved frames back from disk.

use super::{FileFormat, StorageError};
use polars::prelude::*;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Load a CSV or Parquet file.
pub fn load_local(path: &Path, format: FileFormat) -> Result<DataFrame, StorageError> {
    debug!(path = %path.display(), %format, "loading frame");
    let file = fs::File::open(path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let df = match format {
        FileFormat::Parquet => ParquetReader::new(file).finish()?,
        FileFormat::Csv => CsvReadOptions::default()
            .with_has_header(true)
            .into_reader_with_file_handle(file)
            .finish()?,
    };
    Ok(df)
}

/// Parse a frame from object bytes, e.g. an S3 body.
pub fn read_bytes(bytes: Vec<u8>, format: FileFormat) -> Result<DataFrame, StorageError> {
    format.read(bytes)
}

/// Infer the format from the file extension.
pub fn format_of(path: &Path) -> Result<FileFormat, StorageError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    ext.parse()
}
