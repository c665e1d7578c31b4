//! Dated directory layout for saved frames.
//!
//! Files land in `{base}/{YYYY}/{MM}/{DD}/{name}.{ext}` so repeated daily
//! pulls never overwrite an earlier day's snapshot.

use super::{FileFormat, StorageError};
use chrono::{Datelike, Local, NaiveDate};
use polars::prelude::DataFrame;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct DataSaver {
    base_dir: PathBuf,
}

impl DataSaver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `{base}/{YYYY}/{MM}/{DD}`
    pub fn dated_dir(&self, date: NaiveDate) -> PathBuf {
        self.base_dir
            .join(format!("{:04}", date.year()))
            .join(format!("{:02}", date.month()))
            .join(format!("{:02}", date.day()))
    }

    /// Save each named frame under today's directory.
    pub fn save(&self, frames: &[(&str, DataFrame)], format: FileFormat) -> Result<Vec<PathBuf>, StorageError> {
        self.save_on(Local::now().date_naive(), frames, format)
    }

    /// Save each named frame under the directory for `date`, returning the
    /// written paths in input order.
    pub fn save_on(
        &self,
        date: NaiveDate,
        frames: &[(&str, DataFrame)],
        format: FileFormat,
    ) -> Result<Vec<PathBuf>, StorageError> {
        let dir = self.dated_dir(date);
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut written = Vec::with_capacity(frames.len());
        for (name, df) in frames {
            let path = dir.join(format!("{name}.{}", format.extension()));
            let file = fs::File::create(&path).map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
            let mut df = df.clone();
            format.write(&mut df, file)?;
            info!(path = %path.display(), rows = df.height(), "saved frame");
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn writes_into_dated_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let saver = DataSaver::new(tmp.path());
        let df = DataFrame::new(vec![Column::new("v".into(), [1.0, 2.0])]).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();

        let paths = saver
            .save_on(date, &[("prices", df.clone()), ("volumes", df)], FileFormat::Parquet)
            .unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0], tmp.path().join("2024/03/07/prices.parquet"));
        assert!(paths.iter().all(|p| p.exists()));
    }

    #[test]
    fn today_uses_local_date() {
        let tmp = tempfile::tempdir().unwrap();
        let saver = DataSaver::new(tmp.path());
        let df = DataFrame::new(vec![Column::new("v".into(), [1i64])]).unwrap();
        let paths = saver.save(&[("x", df)], FileFormat::Csv).unwrap();
        assert!(paths[0].ends_with("x.csv"));
        assert!(paths[0].starts_with(tmp.path()));
    }
}
