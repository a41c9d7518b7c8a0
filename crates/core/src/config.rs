//! Configuration structures for the ratevol system.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{parse_timestamp, PriceType, TimestampNs, MINUTE_NS};

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Currency normalization configuration.
    pub conversion: ConversionConfig,
    /// Rolling volatility configuration.
    pub volatility: VolatilityConfig,
}

impl Config {
    /// Parse a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check all sections.
    pub fn validate(&self) -> Result<()> {
        self.volatility.validate()
    }
}

/// Asof conversion join configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Maximum age of a spot rate relative to the quote (minutes).
    pub tolerance_minutes: u32,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            tolerance_minutes: 60,
        }
    }
}

impl ConversionConfig {
    /// Tolerance in nanoseconds.
    pub fn tolerance_ns(&self) -> i64 {
        self.tolerance_minutes as i64 * MINUTE_NS
    }
}

/// Rolling standard deviation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityConfig {
    /// Rolling window length in hourly snaps.
    pub window_size: usize,
    /// First snap_time kept in the output (inclusive).
    pub start_time: Option<String>,
    /// Last snap_time considered (inclusive).
    pub end_time: Option<String>,
    /// Price streams to compute.
    pub price_cols: Vec<PriceType>,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            window_size: 20,
            start_time: None,
            end_time: None,
            price_cols: PriceType::ALL.to_vec(),
        }
    }
}

impl VolatilityConfig {
    /// Parsed (start, end) bounds.
    pub fn bounds(&self) -> Result<(Option<TimestampNs>, Option<TimestampNs>)> {
        let parse = |name: &str, value: &Option<String>| -> Result<Option<TimestampNs>> {
            value
                .as_deref()
                .map(|s| {
                    parse_timestamp(s)
                        .map_err(|_| Error::config(format!("{} '{}' is not a timestamp", name, s)))
                })
                .transpose()
        };
        Ok((
            parse("start_time", &self.start_time)?,
            parse("end_time", &self.end_time)?,
        ))
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size < 2 {
            return Err(Error::config(format!(
                "window_size must be at least 2, got {}",
                self.window_size
            )));
        }
        if self.price_cols.is_empty() {
            return Err(Error::config("price_cols must not be empty"));
        }
        if let (Some(start), Some(end)) = self.bounds()? {
            if start > end {
                return Err(Error::config("start_time is after end_time"));
            }
        }
        Ok(())
    }
}
