//! Supported on-disk frame formats and polars read/write for each.

use super::StorageError;
use polars::prelude::*;
use std::fmt;
use std::io::{Cursor, Write};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Parquet,
    Csv,
}

impl FileFormat {
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Parquet => "parquet",
            FileFormat::Csv => "csv",
        }
    }

    /// Serialize `df` in this format.
    pub fn write<W: Write>(self, df: &mut DataFrame, writer: W) -> Result<(), StorageError> {
        match self {
            FileFormat::Parquet => {
                ParquetWriter::new(writer).finish(df)?;
            }
            FileFormat::Csv => {
                CsvWriter::new(writer).include_header(true).finish(df)?;
            }
        }
        Ok(())
    }

    /// Parse an in-memory object.
    pub fn read(self, bytes: Vec<u8>) -> Result<DataFrame, StorageError> {
        let cursor = Cursor::new(bytes);
        let df = match self {
            FileFormat::Parquet => ParquetReader::new(cursor).finish()?,
            FileFormat::Csv => CsvReadOptions::default()
                .with_has_header(true)
                .into_reader_with_file_handle(cursor)
                .finish()?,
        };
        Ok(df)
    }
}

impl FromStr for FileFormat {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parquet" => Ok(FileFormat::Parquet),
            "csv" => Ok(FileFormat::Csv),
            _ => Err(StorageError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
