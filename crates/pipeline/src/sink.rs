//! Writing result tables to CSV through DuckDB.

use duckdb::types::Value;
use duckdb::{Connection, ToSql};
use ratevol_core::{format_timestamp, Cell, ColumnType, Result, Row, Table};
use std::path::Path;
use tracing::debug;

use crate::source::{db_err, sql_literal};

const STAGING_TABLE: &str = "ratevol_output";

fn sql_type(ty: ColumnType) -> &'static str {
    match ty {
        // Rendered as text so the file shows the same wall-clock form we parse.
        ColumnType::Timestamp => "VARCHAR",
        ColumnType::Integer => "BIGINT",
        ColumnType::Float => "DOUBLE",
        ColumnType::Text => "VARCHAR",
    }
}

fn to_value(cell: Cell) -> Value {
    match cell {
        Cell::Timestamp(ts) => Value::Text(format_timestamp(ts)),
        Cell::Integer(v) => Value::BigInt(v),
        Cell::Float(Some(v)) if !v.is_nan() => Value::Double(v),
        Cell::Float(_) => Value::Null,
        Cell::Text(s) => Value::Text(s),
    }
}

/// Writes tables as CSV with a header row. Missing values are empty fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvSink;

impl CsvSink {
    pub fn new() -> Self {
        Self
    }

    /// Write `table` to `path`, replacing any existing file. Row order is kept.
    pub fn write<R: Row>(&self, table: &Table<R>, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let target = path.to_str().ok_or_else(|| {
            ratevol_core::Error::validation(format!("path {} is not valid UTF-8", path.display()))
        })?;

        let conn = Connection::open_in_memory().map_err(db_err)?;
        let columns = R::SCHEMA
            .iter()
            .map(|(name, ty)| format!("\"{}\" {}", name, sql_type(*ty)))
            .collect::<Vec<_>>()
            .join(", ");
        conn.execute_batch(&format!("CREATE TABLE {} ({})", STAGING_TABLE, columns))
            .map_err(db_err)?;

        {
            let mut appender = conn.appender(STAGING_TABLE).map_err(db_err)?;
            for row in table {
                let values: Vec<Value> = row.cells().into_iter().map(to_value).collect();
                let params: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
                appender.append_row(params.as_slice()).map_err(db_err)?;
            }
            // Dropping the appender flushes it.
        }

        conn.execute_batch(&format!(
            "COPY (SELECT * FROM {}) TO {} (HEADER, DELIMITER ',')",
            STAGING_TABLE,
            sql_literal(target)
        ))
        .map_err(db_err)?;

        debug!(path = %path.display(), rows = table.len(), "Wrote table");
        Ok(())
    }
}
