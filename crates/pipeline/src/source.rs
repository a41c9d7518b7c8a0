//! Loading input tables from CSV or Parquet through DuckDB.
//!
//! Typed columns are fetched with `TRY_CAST` next to a check that rejects
//! any non-null cell the cast cannot read. Timestamps are fetched as text.

use duckdb::Connection;
use ratevol_core::{Error, Result};
use ratevol_ingestion::validation::{
    check_columns, CONVERSION_RULE_COLUMNS, OBSERVATION_COLUMNS, PRICE_QUOTE_COLUMNS,
    SPOT_RATE_COLUMNS,
};
use ratevol_ingestion::{RawConversionRule, RawObservation, RawPriceQuote, RawSpotRate};
use std::path::Path;
use tracing::debug;

pub(crate) fn db_err(e: duckdb::Error) -> Error {
    Error::database(e.to_string())
}

/// Quote a string as a SQL literal.
pub(crate) fn sql_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| Error::validation(format!("path {} is not valid UTF-8", path.display())))
}

/// Reads input tables from files.
pub struct TableSource {
    conn: Connection,
}

impl TableSource {
    /// Open an in-memory DuckDB session.
    pub fn new() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Ok(Self { conn })
    }

    /// Table function scanning `path`, chosen by extension.
    fn scan_expr(path: &Path) -> Result<String> {
        if !path.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("input file {} not found", path.display()),
            )));
        }
        let literal = sql_literal(path_str(path)?);
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("csv") => Ok(format!("read_csv_auto({})", literal)),
            Some("parq") | Some("parquet") => Ok(format!("read_parquet({})", literal)),
            _ => Err(Error::validation(format!(
                "unsupported input file type: {}",
                path.display()
            ))),
        }
    }

    /// Column names of a scan.
    fn columns(&self, scan: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("DESCRIBE SELECT * FROM {}", scan))
            .map_err(db_err)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(db_err)?
            .collect::<duckdb::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(names)
    }

    /// Check the columns of `path`, then map every row of `select`.
    ///
    /// Each `typed` column is checked in SQL: a non-null cell that does not
    /// cast to its type is a validation error, not a missing value.
    fn load<T, F>(
        &self,
        table: &str,
        path: &Path,
        required: &[&str],
        select: &[&str],
        typed: &[(&'static str, &str)],
        mut f: F,
    ) -> Result<Vec<T>>
    where
        F: FnMut(&duckdb::Row<'_>) -> duckdb::Result<T>,
    {
        let scan = Self::scan_expr(path)?;
        let present = self.columns(&scan)?;
        check_columns(table, &present, required)?;

        let checks = typed.iter().map(|(column, ty)| {
            format!(
                "(\"{c}\" IS NOT NULL AND TRY_CAST(\"{c}\" AS {ty}) IS NULL)",
                c = column,
                ty = ty
            )
        });
        let exprs: Vec<String> = select.iter().map(|e| e.to_string()).chain(checks).collect();
        let width = select.len();

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM {}", exprs.join(", "), scan))
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                let value = f(row)?;
                let mut bad = None;
                for (i, (column, ty)) in typed.iter().enumerate() {
                    if row.get::<_, bool>(width + i)? {
                        bad = Some((*column, ty.to_string()));
                        break;
                    }
                }
                Ok((value, bad))
            })
            .map_err(db_err)?
            .collect::<duckdb::Result<Vec<_>>>()
            .map_err(db_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for (i, (value, bad)) in rows.into_iter().enumerate() {
            if let Some((column, ty)) = bad {
                return Err(Error::validation(format!(
                    "{}: row {}: column '{}': value is not a valid {}",
                    table, i, column, ty
                )));
            }
            out.push(value);
        }

        debug!(table, path = %path.display(), rows = out.len(), "Loaded table");
        Ok(out)
    }

    /// Load the currency-pair conversion table.
    pub fn conversion_rules(&self, path: impl AsRef<Path>) -> Result<Vec<RawConversionRule>> {
        self.load(
            "conversion rules",
            path.as_ref(),
            CONVERSION_RULE_COLUMNS,
            &[
                "CAST(ccy_pair AS VARCHAR)",
                "TRY_CAST(conversion_factor AS DOUBLE)",
                "TRY_CAST(convert_price AS BOOLEAN)",
            ],
            &[("conversion_factor", "DOUBLE"), ("convert_price", "BOOLEAN")],
            |row| {
                Ok(RawConversionRule {
                    ccy_pair: row.get(0)?,
                    conversion_factor: row.get(1)?,
                    convert_price: row.get(2)?,
                })
            },
        )
    }

    /// Load price quotes.
    pub fn price_quotes(&self, path: impl AsRef<Path>) -> Result<Vec<RawPriceQuote>> {
        self.load(
            "price quotes",
            path.as_ref(),
            PRICE_QUOTE_COLUMNS,
            &[
                "CAST(\"timestamp\" AS VARCHAR)",
                "TRY_CAST(security_id AS BIGINT)",
                "CAST(ccy_pair AS VARCHAR)",
                "TRY_CAST(price AS DOUBLE)",
            ],
            &[("security_id", "BIGINT"), ("price", "DOUBLE")],
            |row| {
                Ok(RawPriceQuote {
                    timestamp: row.get(0)?,
                    security_id: row.get(1)?,
                    ccy_pair: row.get(2)?,
                    price: row.get(3)?,
                })
            },
        )
    }

    /// Load spot rates.
    pub fn spot_rates(&self, path: impl AsRef<Path>) -> Result<Vec<RawSpotRate>> {
        self.load(
            "spot rates",
            path.as_ref(),
            SPOT_RATE_COLUMNS,
            &[
                "CAST(\"timestamp\" AS VARCHAR)",
                "CAST(ccy_pair AS VARCHAR)",
                "TRY_CAST(spot_mid_rate AS DOUBLE)",
            ],
            &[("spot_mid_rate", "DOUBLE")],
            |row| {
                Ok(RawSpotRate {
                    timestamp: row.get(0)?,
                    ccy_pair: row.get(1)?,
                    spot_mid_rate: row.get(2)?,
                })
            },
        )
    }

    /// Load hourly bid/mid/ask observations. Empty price cells are missing
    /// values; any other non-numeric cell is rejected.
    pub fn observations(&self, path: impl AsRef<Path>) -> Result<Vec<RawObservation>> {
        self.load(
            "observations",
            path.as_ref(),
            OBSERVATION_COLUMNS,
            &[
                "CAST(snap_time AS VARCHAR)",
                "TRY_CAST(security_id AS BIGINT)",
                "TRY_CAST(bid AS DOUBLE)",
                "TRY_CAST(mid AS DOUBLE)",
                "TRY_CAST(ask AS DOUBLE)",
            ],
            &[
                ("security_id", "BIGINT"),
                ("bid", "DOUBLE"),
                ("mid", "DOUBLE"),
                ("ask", "DOUBLE"),
            ],
            |row| {
                Ok(RawObservation {
                    snap_time: row.get(0)?,
                    security_id: row.get(1)?,
                    bid: row.get(2)?,
                    mid: row.get(3)?,
                    ask: row.get(4)?,
                })
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("ratevol_source_{}_{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_quotes_csv() {
        let path = temp_file(
            "quotes.csv",
            "timestamp,security_id,ccy_pair,price\n\
             2021-11-20 10:00:00,1,EURGBP,150.0\n\
             2021-11-20 11:00:00,2,EURUSD,99.5\n",
        );
        let rows = TableSource::new().unwrap().price_quotes(&path).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].security_id, Some(1));
        assert_eq!(rows[0].timestamp.as_deref(), Some("2021-11-20 10:00:00"));
        assert_eq!(rows[1].price, Some(99.5));
    }

    #[test]
    fn test_load_conversion_rules_csv() {
        let path = temp_file(
            "ccy.csv",
            "ccy_pair,conversion_factor,convert_price\nEURGBP,100,True\nEURUSD,1,False\n",
        );
        let rows = TableSource::new().unwrap().conversion_rules(&path).unwrap();

        assert_eq!(rows[0].convert_price, Some(true));
        assert_eq!(rows[1].convert_price, Some(false));
        assert_eq!(rows[0].conversion_factor, Some(100.0));
    }

    #[test]
    fn test_observations_with_nulls() {
        let path = temp_file(
            "obs.csv",
            "snap_time,security_id,bid,mid,ask\n\
             2021-11-20 00:00:00,1,,100.0,101.0\n\
             2021-11-20 01:00:00,1,99.0,100.5,\n",
        );
        let rows = TableSource::new().unwrap().observations(&path).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].bid, None);
        assert_eq!(rows[0].mid, Some(100.0));
        assert_eq!(rows[1].ask, None);
    }

    #[test]
    fn test_non_numeric_price_rejected() {
        let path = temp_file(
            "obs_bad_bid.csv",
            "snap_time,security_id,bid,mid,ask\n\
             2021-11-20 00:00:00,1,1.0,1.0,1.0\n\
             2021-11-20 01:00:00,1,abc,2.0,2.0\n",
        );
        let err = TableSource::new().unwrap().observations(&path).unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        let msg = err.to_string();
        assert!(msg.contains("row 1"), "{msg}");
        assert!(msg.contains("'bid'"), "{msg}");
    }

    #[test]
    fn test_non_numeric_security_id_rejected() {
        let path = temp_file(
            "quotes_bad_id.csv",
            "timestamp,security_id,ccy_pair,price\n\
             2021-11-20 10:00:00,X1,EURGBP,150.0\n",
        );
        let err = TableSource::new().unwrap().price_quotes(&path).unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("'security_id'"));
    }

    #[test]
    fn test_missing_column() {
        let path = temp_file("spot_missing.csv", "timestamp,ccy_pair\n2021-11-20 10:00:00,EURGBP\n");
        let err = TableSource::new().unwrap().spot_rates(&path).unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("spot_mid_rate"));
    }

    #[test]
    fn test_unsupported_and_missing_files() {
        let source = TableSource::new().unwrap();
        let txt = temp_file("quotes.txt", "timestamp\n");

        assert!(matches!(source.price_quotes(&txt), Err(Error::Validation(_))));
        assert!(matches!(
            source.price_quotes("/nonexistent/ratevol/quotes.csv"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_sql_literal_escapes_quotes() {
        assert_eq!(sql_literal("it's.csv"), "'it''s.csv'");
    }
}
