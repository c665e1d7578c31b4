//! MySQL.

use super::{runtime, rows_to_dataframe, Decoder, SqlError, SqlStore, SqlValue, POOL_SIZE};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use gti_core::config::MySqlCredentials;
use polars::prelude::DataFrame;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::{Column, Connection, Executor, MySql as MySqlDb, Row, Statement, TypeInfo};
use tokio::runtime::Runtime;

pub struct MySql {
    options: MySqlConnectOptions,
    pool: Option<MySqlPool>,
    runtime: Runtime,
}

enum Conn {
    Pooled(PoolConnection<MySqlDb>),
    Direct(MySqlConnection),
}

impl Conn {
    fn get(&mut self) -> &mut MySqlConnection {
        match self {
            Conn::Pooled(c) => &mut **c,
            Conn::Direct(c) => c,
        }
    }

    async fn release(self) -> Result<(), SqlError> {
        match self {
            Conn::Pooled(_) => Ok(()),
            Conn::Direct(c) => Ok(c.close().await?),
        }
    }
}

impl MySql {
    pub fn connect(creds: &MySqlCredentials, pooling: bool) -> Result<Self, SqlError> {
        let options = MySqlConnectOptions::new()
            .host(&creds.host)
            .port(creds.port)
            .username(&creds.user)
            .password(creds.password.expose())
            .database(&creds.database);
        let runtime = runtime()?;
        let pool = if pooling {
            let pool = runtime.block_on(
                MySqlPoolOptions::new()
                    .max_connections(POOL_SIZE)
                    .connect_with(options.clone()),
            )?;
            Some(pool)
        } else {
            None
        };
        tracing::info!(host = %creds.host, database = %creds.database, pooling, "mysql ready");
        Ok(Self {
            options,
            pool,
            runtime,
        })
    }

    async fn conn(&self) -> Result<Conn, SqlError> {
        match &self.pool {
            Some(pool) => Ok(Conn::Pooled(pool.acquire().await?)),
            None => Ok(Conn::Direct(MySqlConnection::connect_with(&self.options).await?)),
        }
    }
}

impl SqlStore for MySql {
    fn run_query(&self, sql: &str) -> Result<DataFrame, SqlError> {
        self.runtime.block_on(async {
            let mut conn = self.conn().await?;
            let result = fetch(conn.get(), sql).await;
            conn.release().await?;
            let (columns, rows) = result?;
            tracing::debug!(rows = rows.len(), "mysql query");
            Ok::<_, SqlError>(rows_to_dataframe(&columns, &rows)?)
        })
    }

    fn write_query(&self, sql: &str) -> Result<u64, SqlError> {
        self.runtime.block_on(async {
            let mut conn = self.conn().await?;
            let result = conn.get().execute(sql).await;
            conn.release().await?;
            Ok::<_, SqlError>(result?.rows_affected())
        })
    }
}

async fn fetch(
    conn: &mut MySqlConnection,
    sql: &str,
) -> Result<(Vec<String>, Vec<Vec<SqlValue>>), SqlError> {
    let rows = (&mut *conn).fetch_all(sql).await?;
    let columns: Vec<String> = match rows.first() {
        Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
        None => {
            let stmt = (&mut *conn).prepare(sql).await?;
            stmt.columns().iter().map(|c| c.name().to_string()).collect()
        }
    };
    let values = rows.iter().map(decode_row).collect();
    Ok((columns, values))
}

/// Maps sqlx MySQL type names (`BIGINT UNSIGNED`, `VARCHAR`, ...) to a decoder.
pub(crate) fn decoder_for(type_name: &str) -> Decoder {
    if type_name.ends_with("UNSIGNED") {
        return Decoder::U64;
    }
    match type_name {
        "BOOLEAN" => Decoder::Bool,
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => Decoder::I64,
        "FLOAT" => Decoder::F32,
        "DOUBLE" => Decoder::F64,
        "DECIMAL" => Decoder::Decimal,
        "DATE" => Decoder::Date,
        "DATETIME" => Decoder::DateTime,
        "TIMESTAMP" => Decoder::DateTimeTz,
        _ => Decoder::Text,
    }
}

fn decode_row(row: &MySqlRow) -> Vec<SqlValue> {
    (0..row.len())
        .map(|i| decode_cell(row, i, decoder_for(row.column(i).type_info().name())))
        .collect()
}

fn decode_cell(row: &MySqlRow, i: usize, decoder: Decoder) -> SqlValue {
    let value = match decoder {
        Decoder::Bool => row.try_get::<Option<bool>, _>(i).map(|v| v.map(SqlValue::Bool)),
        Decoder::I16 | Decoder::I32 | Decoder::I64 => {
            row.try_get::<Option<i64>, _>(i).map(|v| v.map(SqlValue::Int))
        }
        // Values past i64::MAX become null.
        Decoder::U64 => row
            .try_get::<Option<u64>, _>(i)
            .map(|v| v.and_then(|n| i64::try_from(n).ok()).map(SqlValue::Int)),
        Decoder::F32 => row
            .try_get::<Option<f32>, _>(i)
            .map(|v| v.map(|n| SqlValue::Float(n.into()))),
        Decoder::F64 => row.try_get::<Option<f64>, _>(i).map(|v| v.map(SqlValue::Float)),
        Decoder::Decimal => row
            .try_get::<Option<Decimal>, _>(i)
            .map(|v| v.and_then(|d| d.to_f64()).map(SqlValue::Float)),
        Decoder::Date => row.try_get::<Option<NaiveDate>, _>(i).map(|v| v.map(SqlValue::Date)),
        Decoder::DateTime => row
            .try_get::<Option<NaiveDateTime>, _>(i)
            .map(|v| v.map(SqlValue::DateTime)),
        Decoder::DateTimeTz => row
            .try_get::<Option<DateTime<Utc>>, _>(i)
            .map(|v| v.map(|t| SqlValue::DateTime(t.naive_utc()))),
        Decoder::Text => row.try_get::<Option<String>, _>(i).map(|v| v.map(SqlValue::Text)),
    };
    value.ok().flatten().unwrap_or(SqlValue::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mysql_type_names() {
        assert_eq!(decoder_for("BIGINT UNSIGNED"), Decoder::U64);
        assert_eq!(decoder_for("INT"), Decoder::I64);
        assert_eq!(decoder_for("DECIMAL"), Decoder::Decimal);
        assert_eq!(decoder_for("DATETIME"), Decoder::DateTime);
        assert_eq!(decoder_for("TIMESTAMP"), Decoder::DateTimeTz);
        assert_eq!(decoder_for("JSON"), Decoder::Text);
    }
}
