//! Input boundary: raw rows as loaded, validated into typed tables.
//!
//! Loaders hand over every field as optional and every timestamp as text.
//! The first null required field or unparseable timestamp aborts the run.

use ratevol_core::{
    parse_timestamp, ConversionRule, Error, PriceObservation, PriceQuote, Result, SecurityId,
    SpotRate, Table, TimestampNs,
};
use serde::{Deserialize, Serialize};

/// Required columns of the conversion rules table.
pub const CONVERSION_RULE_COLUMNS: &[&str] = &["ccy_pair", "conversion_factor", "convert_price"];
/// Required columns of the price quotes table.
pub const PRICE_QUOTE_COLUMNS: &[&str] = &["timestamp", "security_id", "ccy_pair", "price"];
/// Required columns of the spot rate table.
pub const SPOT_RATE_COLUMNS: &[&str] = &["timestamp", "ccy_pair", "spot_mid_rate"];
/// Required columns of the observation table.
pub const OBSERVATION_COLUMNS: &[&str] = &["snap_time", "security_id", "bid", "mid", "ask"];

/// Unvalidated conversion rule row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawConversionRule {
    pub ccy_pair: Option<String>,
    pub conversion_factor: Option<f64>,
    pub convert_price: Option<bool>,
}

/// Unvalidated price quote row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPriceQuote {
    pub timestamp: Option<String>,
    pub security_id: Option<SecurityId>,
    pub ccy_pair: Option<String>,
    pub price: Option<f64>,
}

/// Unvalidated spot rate row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSpotRate {
    pub timestamp: Option<String>,
    pub ccy_pair: Option<String>,
    pub spot_mid_rate: Option<f64>,
}

/// Unvalidated observation row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub snap_time: Option<String>,
    pub security_id: Option<SecurityId>,
    pub bid: Option<f64>,
    pub mid: Option<f64>,
    pub ask: Option<f64>,
}

fn require<T>(value: Option<T>, row: usize, column: &str) -> Result<T> {
    value.ok_or_else(|| Error::validation(format!("row {}: column '{}' is null", row, column)))
}

fn require_timestamp(value: Option<&str>, row: usize, column: &str) -> Result<TimestampNs> {
    let text = require(value, row, column)?;
    parse_timestamp(text)
        .map_err(|_| Error::validation(format!("row {}: column '{}': bad timestamp '{}'", row, column, text)))
}

/// Check that a loaded table carries every required column.
pub fn check_columns(table: &str, present: &[String], required: &[&str]) -> Result<()> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|col| !present.iter().any(|p| p == col))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "{}: missing required column(s) {}",
            table,
            missing.join(", ")
        )))
    }
}

/// Validate conversion rule rows.
pub fn validate_conversion_rules(raw: &[RawConversionRule]) -> Result<Table<ConversionRule>> {
    raw.iter()
        .enumerate()
        .map(|(i, r)| {
            Ok(ConversionRule {
                ccy_pair: require(r.ccy_pair.clone(), i, "ccy_pair")?,
                conversion_factor: require(r.conversion_factor, i, "conversion_factor")?,
                requires_conversion: require(r.convert_price, i, "convert_price")?,
            })
        })
        .collect::<Result<Vec<_>>>()
        .map(Table::new)
}

/// Validate price quote rows.
pub fn validate_price_quotes(raw: &[RawPriceQuote]) -> Result<Table<PriceQuote>> {
    raw.iter()
        .enumerate()
        .map(|(i, r)| {
            Ok(PriceQuote {
                timestamp: require_timestamp(r.timestamp.as_deref(), i, "timestamp")?,
                security_id: require(r.security_id, i, "security_id")?,
                ccy_pair: require(r.ccy_pair.clone(), i, "ccy_pair")?,
                price: require(r.price, i, "price")?,
            })
        })
        .collect::<Result<Vec<_>>>()
        .map(Table::new)
}

/// Validate spot rate rows.
pub fn validate_spot_rates(raw: &[RawSpotRate]) -> Result<Table<SpotRate>> {
    raw.iter()
        .enumerate()
        .map(|(i, r)| {
            Ok(SpotRate {
                timestamp: require_timestamp(r.timestamp.as_deref(), i, "timestamp")?,
                ccy_pair: require(r.ccy_pair.clone(), i, "ccy_pair")?,
                spot_mid_rate: require(r.spot_mid_rate, i, "spot_mid_rate")?,
            })
        })
        .collect::<Result<Vec<_>>>()
        .map(Table::new)
}

/// Validate observation rows. Null prices are legal.
pub fn validate_observations(raw: &[RawObservation]) -> Result<Table<PriceObservation>> {
    raw.iter()
        .enumerate()
        .map(|(i, r)| {
            Ok(PriceObservation {
                snap_time: require_timestamp(r.snap_time.as_deref(), i, "snap_time")?,
                security_id: require(r.security_id, i, "security_id")?,
                bid: r.bid,
                mid: r.mid,
                ask: r.ask,
            })
        })
        .collect::<Result<Vec<_>>>()
        .map(Table::new)
}
