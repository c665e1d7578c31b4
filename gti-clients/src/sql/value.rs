//! Database-neutral cells and their conversion to a polars frame.

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;

/// One decoded result-set cell.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl SqlValue {
    fn kind(&self) -> Option<Kind> {
        match self {
            SqlValue::Null => None,
            SqlValue::Bool(_) => Some(Kind::Bool),
            SqlValue::Int(_) => Some(Kind::Int),
            SqlValue::Float(_) => Some(Kind::Float),
            SqlValue::Text(_) => Some(Kind::Text),
            SqlValue::Date(_) => Some(Kind::Date),
            SqlValue::DateTime(_) => Some(Kind::DateTime),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Int(v) => Some(*v as f64),
            SqlValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    fn to_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Bool(v) => Some(v.to_string()),
            SqlValue::Int(v) => Some(v.to_string()),
            SqlValue::Float(v) => Some(v.to_string()),
            SqlValue::Text(v) => Some(v.clone()),
            SqlValue::Date(v) => Some(v.to_string()),
            SqlValue::DateTime(v) => Some(v.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Bool,
    Int,
    Float,
    Text,
    Date,
    DateTime,
}

/// Column type after looking at every non-null cell. Integers widen to
/// floats; any other mix falls back to text.
fn unify(cells: impl Iterator<Item = Kind>) -> Kind {
    let mut acc: Option<Kind> = None;
    for kind in cells {
        acc = Some(match (acc, kind) {
            (None, k) => k,
            (Some(a), k) if a == k => a,
            (Some(Kind::Int), Kind::Float) | (Some(Kind::Float), Kind::Int) => Kind::Float,
            _ => return Kind::Text,
        });
    }
    // All-null columns are typed as text.
    acc.unwrap_or(Kind::Text)
}

/// Build a frame from column names and row-major cells. Short rows are
/// padded with nulls.
pub fn rows_to_dataframe(columns: &[String], rows: &[Vec<SqlValue>]) -> PolarsResult<DataFrame> {
    let mut out = Vec::with_capacity(columns.len());
    for (idx, name) in columns.iter().enumerate() {
        let cells: Vec<&SqlValue> = rows
            .iter()
            .map(|r| r.get(idx).unwrap_or(&SqlValue::Null))
            .collect();
        let name: PlSmallStr = name.as_str().into();
        let column = match unify(cells.iter().filter_map(|c| c.kind())) {
            Kind::Bool => Column::new(
                name,
                cells
                    .iter()
                    .map(|c| match c {
                        SqlValue::Bool(b) => Some(*b),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            ),
            Kind::Int => Column::new(
                name,
                cells
                    .iter()
                    .map(|c| match c {
                        SqlValue::Int(v) => Some(*v),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            ),
            Kind::Float => Column::new(
                name,
                cells.iter().map(|c| c.as_f64()).collect::<Vec<_>>(),
            ),
            Kind::Date => {
                let epoch = NaiveDate::default();
                let days: Vec<Option<i32>> = cells
                    .iter()
                    .map(|c| match c {
                        SqlValue::Date(d) => Some((*d - epoch).num_days() as i32),
                        _ => None,
                    })
                    .collect();
                Column::new(name, days).cast(&DataType::Date)?
            }
            Kind::DateTime => {
                let millis: Vec<Option<i64>> = cells
                    .iter()
                    .map(|c| match c {
                        SqlValue::DateTime(t) => Some(t.and_utc().timestamp_millis()),
                        _ => None,
                    })
                    .collect();
                Column::new(name, millis)
                    .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
            }
            Kind::Text => Column::new(
                name,
                cells.iter().map(|c| c.to_text()).collect::<Vec<_>>(),
            ),
        };
        out.push(column);
    }
    DataFrame::new(out)
}
