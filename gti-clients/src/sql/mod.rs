//! SQL stores: Redshift (Postgres protocol) and MySQL.
//!
//! Both expose the same blocking [`SqlStore`] API. Internally each store
//! owns a current-thread tokio runtime and drives `sqlx` on it, so callers
//! never see async. With pooling off, every call opens a connection and
//! closes it before returning.

mod mysql;
mod redshift;
mod value;

pub use mysql::MySql;
pub use redshift::Redshift;
pub use value::{rows_to_dataframe, SqlValue};

use polars::prelude::{DataFrame, PolarsError};
use thiserror::Error;

/// Pool size used when pooling is on.
pub const POOL_SIZE: u32 = 5;

#[derive(Debug, Error)]
pub enum SqlError {
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("start runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("build frame: {0}")]
    Frame(#[from] PolarsError),
}

/// Blocking query interface shared by the SQL stores.
pub trait SqlStore {
    /// Execute a query and return its result set.
    fn run_query(&self, sql: &str) -> Result<DataFrame, SqlError>;

    fn read_query(&self, sql: &str) -> Result<DataFrame, SqlError> {
        self.run_query(sql)
    }

    /// Execute a statement, committing it. Returns rows affected.
    fn write_query(&self, sql: &str) -> Result<u64, SqlError>;
}

/// How a result column is pulled out of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decoder {
    Bool,
    I16,
    I32,
    I64,
    U64,
    F32,
    F64,
    Decimal,
    Date,
    DateTime,
    DateTimeTz,
    /// Anything else: read as text, or null if that fails too.
    Text,
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime, SqlError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(SqlError::Runtime)
}
