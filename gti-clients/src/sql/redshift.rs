//! Redshift over the Postgres wire protocol.

use super::{runtime, rows_to_dataframe, Decoder, SqlError, SqlStore, SqlValue, POOL_SIZE};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use gti_core::config::RedshiftCredentials;
use polars::prelude::DataFrame;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Connection, Executor, Postgres, Row, Statement, TypeInfo};
use tokio::runtime::Runtime;

pub struct Redshift {
    options: PgConnectOptions,
    pool: Option<PgPool>,
    runtime: Runtime,
}

enum Conn {
    Pooled(PoolConnection<Postgres>),
    Direct(PgConnection),
}

impl Conn {
    fn get(&mut self) -> &mut PgConnection {
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

impl Redshift {
    pub fn connect(creds: &RedshiftCredentials, pooling: bool) -> Result<Self, SqlError> {
        let options = PgConnectOptions::new()
            .host(&creds.host)
            .port(creds.port)
            .username(&creds.user)
            .password(creds.password.expose())
            .database(&creds.database);
        let runtime = runtime()?;
        let pool = if pooling {
            let pool = runtime.block_on(
                PgPoolOptions::new()
                    .max_connections(POOL_SIZE)
                    .connect_with(options.clone()),
            )?;
            Some(pool)
        } else {
            None
        };
        tracing::info!(host = %creds.host, database = %creds.database, pooling, "redshift ready");
        Ok(Self {
            options,
            pool,
            runtime,
        })
    }

    async fn conn(&self) -> Result<Conn, SqlError> {
        match &self.pool {
            Some(pool) => Ok(Conn::Pooled(pool.acquire().await?)),
            None => Ok(Conn::Direct(PgConnection::connect_with(&self.options).await?)),
        }
    }
}

impl SqlStore for Redshift {
    fn run_query(&self, sql: &str) -> Result<DataFrame, SqlError> {
        self.runtime.block_on(async {
            let mut conn = self.conn().await?;
            let result = fetch(conn.get(), sql).await;
            conn.release().await?;
            let (columns, rows) = result?;
            tracing::debug!(rows = rows.len(), "redshift query");
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
    conn: &mut PgConnection,
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

pub(crate) fn decoder_for(type_name: &str) -> Decoder {
    match type_name {
        "BOOL" => Decoder::Bool,
        "INT2" => Decoder::I16,
        "INT4" => Decoder::I32,
        "INT8" => Decoder::I64,
        "FLOAT4" => Decoder::F32,
        "FLOAT8" => Decoder::F64,
        "NUMERIC" => Decoder::Decimal,
        "DATE" => Decoder::Date,
        "TIMESTAMP" => Decoder::DateTime,
        "TIMESTAMPTZ" => Decoder::DateTimeTz,
        _ => Decoder::Text,
    }
}

fn decode_row(row: &PgRow) -> Vec<SqlValue> {
    (0..row.len())
        .map(|i| decode_cell(row, i, decoder_for(row.column(i).type_info().name())))
        .collect()
}

fn decode_cell(row: &PgRow, i: usize, decoder: Decoder) -> SqlValue {
    let value = match decoder {
        Decoder::Bool => row.try_get::<Option<bool>, _>(i).map(|v| v.map(SqlValue::Bool)),
        Decoder::I16 => row
            .try_get::<Option<i16>, _>(i)
            .map(|v| v.map(|n| SqlValue::Int(n.into()))),
        Decoder::I32 => row
            .try_get::<Option<i32>, _>(i)
            .map(|v| v.map(|n| SqlValue::Int(n.into()))),
        Decoder::I64 | Decoder::U64 => row.try_get::<Option<i64>, _>(i).map(|v| v.map(SqlValue::Int)),
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
    fn postgres_type_names() {
        assert_eq!(decoder_for("INT8"), Decoder::I64);
        assert_eq!(decoder_for("NUMERIC"), Decoder::Decimal);
        assert_eq!(decoder_for("TIMESTAMPTZ"), Decoder::DateTimeTz);
        assert_eq!(decoder_for("VARCHAR"), Decoder::Text);
        assert_eq!(decoder_for("SUPER"), Decoder::Text);
    }
}
