//! Batch job description.

use ratevol_core::{Config, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Input and output files of the FX conversion job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatesJob {
    /// Conversion rules per currency pair.
    pub ccy_path: PathBuf,
    /// Price quotes.
    pub price_path: PathBuf,
    /// Spot mid rates.
    pub spot_path: PathBuf,
    pub output_path: PathBuf,
}

/// Input and output files of the rolling stdev job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdevJob {
    /// Hourly bid/mid/ask observations.
    pub data_path: PathBuf,
    pub output_path: PathBuf,
}

/// Which jobs to run, and with what settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub rates: Option<RatesJob>,
    #[serde(default)]
    pub stdev: Option<StdevJob>,
    #[serde(default)]
    pub config: Config,
}

impl JobConfig {
    /// Parse and validate from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let job: Self = serde_json::from_str(json)?;
        job.config.validate()?;
        Ok(job)
    }

    /// Load from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Whether any job is configured.
    pub fn is_empty(&self) -> bool {
        self.rates.is_none() && self.stdev.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratevol_core::Error;

    #[test]
    fn test_parse_full_job() {
        let job = JobConfig::from_json_str(
            r#"{
                "rates": {
                    "ccy_path": "data/ccy.csv",
                    "price_path": "data/price.csv",
                    "spot_path": "data/spot.csv",
                    "output_path": "out/rates.csv"
                },
                "stdev": {"data_path": "data/stdev.parq", "output_path": "out/stdev.csv"},
                "config": {"volatility": {"window_size": 5}}
            }"#,
        )
        .unwrap();

        assert_eq!(job.rates.unwrap().spot_path, PathBuf::from("data/spot.csv"));
        assert_eq!(job.stdev.unwrap().data_path, PathBuf::from("data/stdev.parq"));
        assert_eq!(job.config.volatility.window_size, 5);
        assert_eq!(job.config.conversion.tolerance_minutes, 60);
    }

    #[test]
    fn test_empty_job() {
        let job = JobConfig::from_json_str("{}").unwrap();
        assert!(job.is_empty());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let err = JobConfig::from_json_str(r#"{"config": {"volatility": {"window_size": 1}}}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
