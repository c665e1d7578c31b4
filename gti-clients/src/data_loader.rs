//! Frame loading from S3 or the local filesystem.
//!
//! The S3 client is optional: a loader built without one still reads local
//! files, and S3 reads fail with [`LoadError::NoS3Client`].

use crate::aws::{AwsError, S3Client};
use gti_core::data::{load_local, read_bytes, FileFormat, StorageError};
use polars::prelude::DataFrame;
use std::path::Path;
use thiserror::Error;

/// Errors from the loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no S3 client configured")]
    NoS3Client,

    #[error(transparent)]
    Aws(#[from] AwsError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Default)]
pub struct DataLoader {
    s3: Option<S3Client>,
}

impl DataLoader {
    pub fn new(s3: Option<S3Client>) -> Self {
        Self { s3 }
    }

    pub fn with_s3(s3: S3Client) -> Self {
        Self { s3: Some(s3) }
    }

    /// Read `s3://{bucket}/{key}` as `format`.
    pub fn load_from_s3(&self, bucket: &str, key: &str, format: FileFormat) -> Result<DataFrame, LoadError> {
        let s3 = self.s3.as_ref().ok_or(LoadError::NoS3Client)?;
        let bytes = s3.get_object(bucket, key)?;
        let df = read_bytes(bytes, format)?;
        tracing::debug!(bucket, key, rows = df.height(), "loaded frame from S3");
        Ok(df)
    }

    pub fn load_from_local(&self, path: &Path, format: FileFormat) -> Result<DataFrame, LoadError> {
        Ok(load_local(path, format)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s3_without_client_errors() {
        let loader = DataLoader::default();
        assert!(matches!(
            loader.load_from_s3("b", "k.csv", FileFormat::Csv),
            Err(LoadError::NoS3Client)
        ));
    }

    #[test]
    fn local_csv_loads_without_s3() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("px.csv");
        std::fs::write(&path, "date,value\n2024-01-02,1.5\n2024-01-03,2.5\n").unwrap();

        let df = DataLoader::default()
            .load_from_local(&path, FileFormat::Csv)
            .unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 2);
    }

    #[test]
    fn missing_local_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DataLoader::default()
            .load_from_local(&dir.path().join("absent.parquet"), FileFormat::Parquet)
            .unwrap_err();
        assert!(matches!(err, LoadError::Storage(_)));
    }
}
