//! Core data types for the ratevol system.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::table::{Cell, ColumnType, Row};

/// Timestamp in nanoseconds since Unix epoch (naive, treated as UTC).
pub type TimestampNs = i64;

/// Security identifier.
pub type SecurityId = i64;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// One minute in nanoseconds.
pub const MINUTE_NS: i64 = 60 * NANOS_PER_SEC;

/// One hour in nanoseconds.
pub const HOUR_NS: i64 = 60 * MINUTE_NS;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

fn to_nanos<Tz: TimeZone>(dt: &DateTime<Tz>, s: &str) -> Result<TimestampNs> {
    dt.timestamp_nanos_opt()
        .ok_or_else(|| Error::validation(format!("timestamp '{}' is out of range", s)))
}

/// Parse a timestamp string into nanoseconds.
///
/// Accepts `YYYY-MM-DD HH:MM:SS[.fffffffff]`, the `T`-separated ISO form,
/// RFC 3339 with an offset, `YYYY-MM-DD HH:MM:SS+HH` (as DuckDB renders
/// TIMESTAMPTZ) and a bare date (midnight). Fractions keep full precision.
pub fn parse_timestamp(s: &str) -> Result<TimestampNs> {
    let s = s.trim();

    for fmt in NAIVE_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return to_nanos(&ndt.and_utc(), s);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return to_nanos(&dt, s);
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return to_nanos(&dt, s);
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return to_nanos(&ndt.and_utc(), s);
        }
    }

    Err(Error::validation(format!("unparseable timestamp '{}'", s)))
}

/// Format a timestamp as `YYYY-MM-DD HH:MM:SS`, adding 3, 6 or 9 fraction
/// digits when the sub-second part needs them.
pub fn format_timestamp(ts_ns: TimestampNs) -> String {
    let secs = ts_ns.div_euclid(NANOS_PER_SEC);
    let nanos = ts_ns.rem_euclid(NANOS_PER_SEC);
    let Some(dt) = DateTime::<Utc>::from_timestamp(secs, nanos as u32) else {
        return ts_ns.to_string();
    };

    let fmt = if nanos == 0 {
        "%Y-%m-%d %H:%M:%S"
    } else if nanos % 1_000_000 == 0 {
        "%Y-%m-%d %H:%M:%S%.3f"
    } else if nanos % 1_000 == 0 {
        "%Y-%m-%d %H:%M:%S%.6f"
    } else {
        "%Y-%m-%d %H:%M:%S%.9f"
    };
    dt.format(fmt).to_string()
}

/// Which price stream of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceType {
    Bid,
    Mid,
    Ask,
}

impl PriceType {
    /// All price types in output column order.
    pub const ALL: [PriceType; 3] = [PriceType::Bid, PriceType::Mid, PriceType::Ask];

    /// Column name of the raw price.
    pub fn as_str(self) -> &'static str {
        match self {
            PriceType::Bid => "bid",
            PriceType::Mid => "mid",
            PriceType::Ask => "ask",
        }
    }

    /// Column name of the rolling stdev for this price.
    pub fn stdev_column(self) -> &'static str {
        match self {
            PriceType::Bid => "bid_stdev",
            PriceType::Mid => "mid_stdev",
            PriceType::Ask => "ask_stdev",
        }
    }
}

impl fmt::Display for PriceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "bid" => Ok(PriceType::Bid),
            "mid" => Ok(PriceType::Mid),
            "ask" => Ok(PriceType::Ask),
            other => Err(Error::config(format!("unknown price type '{}'", other))),
        }
    }
}

/// Row of the currency-pair reference table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRule {
    pub ccy_pair: String,
    pub conversion_factor: f64,
    /// `convert_price` flag in the source table.
    pub requires_conversion: bool,
}

/// A quoted price for a security.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub timestamp: TimestampNs,
    pub security_id: SecurityId,
    pub ccy_pair: String,
    pub price: f64,
}

/// An observed spot rate for a currency pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotRate {
    pub timestamp: TimestampNs,
    pub ccy_pair: String,
    pub spot_mid_rate: f64,
}

/// A quote with its normalized price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertedPrice {
    pub timestamp: TimestampNs,
    pub security_id: SecurityId,
    pub price: f64,
    pub ccy_pair: String,
    /// Missing when conversion applies but no spot rate was inside the tolerance.
    pub new_price: Option<f64>,
}

/// Hourly snapshot of a security's bid/mid/ask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub snap_time: TimestampNs,
    pub security_id: SecurityId,
    pub bid: Option<f64>,
    pub mid: Option<f64>,
    pub ask: Option<f64>,
}

impl PriceObservation {
    /// Value of one price stream.
    #[inline]
    pub fn price(&self, price_type: PriceType) -> Option<f64> {
        match price_type {
            PriceType::Bid => self.bid,
            PriceType::Mid => self.mid,
            PriceType::Ask => self.ask,
        }
    }
}

/// Causal rolling stdev per price stream at one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StdevObservation {
    pub snap_time: TimestampNs,
    pub security_id: SecurityId,
    pub bid_stdev: Option<f64>,
    pub mid_stdev: Option<f64>,
    pub ask_stdev: Option<f64>,
}

impl StdevObservation {
    /// Stdev of one price stream.
    #[inline]
    pub fn stdev(&self, price_type: PriceType) -> Option<f64> {
        match price_type {
            PriceType::Bid => self.bid_stdev,
            PriceType::Mid => self.mid_stdev,
            PriceType::Ask => self.ask_stdev,
        }
    }

    /// Set the stdev of one price stream.
    #[inline]
    pub fn set_stdev(&mut self, price_type: PriceType, value: Option<f64>) {
        match price_type {
            PriceType::Bid => self.bid_stdev = value,
            PriceType::Mid => self.mid_stdev = value,
            PriceType::Ask => self.ask_stdev = value,
        }
    }
}

/// Volatility pipeline output: stdevs plus the source observation joined back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdevResult {
    pub stdev: StdevObservation,
    /// Source prices; all missing when no observation existed at this cell.
    pub bid: Option<f64>,
    pub mid: Option<f64>,
    pub ask: Option<f64>,
}

impl StdevResult {
    #[inline]
    pub fn snap_time(&self) -> TimestampNs {
        self.stdev.snap_time
    }

    #[inline]
    pub fn security_id(&self) -> SecurityId {
        self.stdev.security_id
    }
}

impl Row for ConvertedPrice {
    const SCHEMA: &'static [(&'static str, ColumnType)] = &[
        ("timestamp", ColumnType::Timestamp),
        ("security_id", ColumnType::Integer),
        ("price", ColumnType::Float),
        ("ccy_pair", ColumnType::Text),
        ("new_price", ColumnType::Float),
    ];

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Timestamp(self.timestamp),
            Cell::Integer(self.security_id),
            Cell::Float(Some(self.price)),
            Cell::Text(self.ccy_pair.clone()),
            Cell::Float(self.new_price),
        ]
    }
}

impl Row for StdevResult {
    const SCHEMA: &'static [(&'static str, ColumnType)] = &[
        ("snap_time", ColumnType::Timestamp),
        ("security_id", ColumnType::Integer),
        ("bid_stdev", ColumnType::Float),
        ("mid_stdev", ColumnType::Float),
        ("ask_stdev", ColumnType::Float),
        ("bid", ColumnType::Float),
        ("mid", ColumnType::Float),
        ("ask", ColumnType::Float),
    ];

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Timestamp(self.stdev.snap_time),
            Cell::Integer(self.stdev.security_id),
            Cell::Float(self.stdev.bid_stdev),
            Cell::Float(self.stdev.mid_stdev),
            Cell::Float(self.stdev.ask_stdev),
            Cell::Float(self.bid),
            Cell::Float(self.mid),
            Cell::Float(self.ask),
        ]
    }
}
