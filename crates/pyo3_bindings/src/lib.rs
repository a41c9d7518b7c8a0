//! PyO3 bindings for ratevol Rust components.
//!
//! Exposes the batch computations to Python:
//! - FX price normalization (backward asof join on spot rates)
//! - Causal rolling standard deviation of bid/mid/ask
//!
//! Rows cross the boundary as tuples of primitives; timestamps are strings
//! in `YYYY-MM-DD HH:MM:SS` form.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use ratevol_core::{
    format_timestamp, ConversionConfig, Error as RustError, PriceType, StdevResult,
    VolatilityConfig,
};
use ratevol_features::VolatilityPipeline;
use ratevol_ingestion::{
    validate_conversion_rules, validate_observations, validate_price_quotes, validate_spot_rates,
    AsofJoinEngine, AsofStats, ConversionRuleSet, RawConversionRule, RawObservation,
    RawPriceQuote, RawSpotRate,
};

/// (ccy_pair, conversion_factor, convert_price)
type RuleTuple = (String, f64, bool);
/// (timestamp, security_id, ccy_pair, price)
type QuoteTuple = (String, i64, String, f64);
/// (timestamp, ccy_pair, spot_mid_rate)
type SpotTuple = (String, String, f64);
/// (timestamp, security_id, price, ccy_pair, new_price)
type ConvertedTuple = (String, i64, f64, String, Option<f64>);
/// (snap_time, security_id, bid, mid, ask)
type ObservationTuple = (String, i64, Option<f64>, Option<f64>, Option<f64>);
/// (snap_time, security_id, bid_stdev, mid_stdev, ask_stdev, bid, mid, ask)
type StdevTuple = (
    String,
    i64,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
);

fn to_py_err(e: RustError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

// ============================================================================
// Python-exposed Engine Classes
// ============================================================================

/// Normalizes quote prices with the latest spot rate of their currency pair.
#[pyclass]
pub struct PyRatesProcessor {
    inner: AsofJoinEngine,
    last_stats: AsofStats,
}

#[pymethods]
impl PyRatesProcessor {
    #[new]
    #[pyo3(signature = (rules, tolerance_minutes=60))]
    fn new(rules: Vec<RuleTuple>, tolerance_minutes: u32) -> PyResult<Self> {
        let raw: Vec<RawConversionRule> = rules
            .into_iter()
            .map(|(ccy_pair, factor, convert)| RawConversionRule {
                ccy_pair: Some(ccy_pair),
                conversion_factor: Some(factor),
                convert_price: Some(convert),
            })
            .collect();
        let rules = validate_conversion_rules(&raw).map_err(to_py_err)?;
        let config = ConversionConfig { tolerance_minutes };

        Ok(PyRatesProcessor {
            inner: AsofJoinEngine::from_config(ConversionRuleSet::from_rules(&rules), &config),
            last_stats: AsofStats::default(),
        })
    }

    /// Convert a batch of quotes.
    ///
    /// Returns converted quotes sorted by timestamp, then quotes that need no
    /// conversion in input order.
    fn run(&mut self, quotes: Vec<QuoteTuple>, spots: Vec<SpotTuple>) -> PyResult<Vec<ConvertedTuple>> {
        let raw_quotes: Vec<RawPriceQuote> = quotes
            .into_iter()
            .map(|(ts, security_id, ccy_pair, price)| RawPriceQuote {
                timestamp: Some(ts),
                security_id: Some(security_id),
                ccy_pair: Some(ccy_pair),
                price: Some(price),
            })
            .collect();
        let raw_spots: Vec<RawSpotRate> = spots
            .into_iter()
            .map(|(ts, ccy_pair, rate)| RawSpotRate {
                timestamp: Some(ts),
                ccy_pair: Some(ccy_pair),
                spot_mid_rate: Some(rate),
            })
            .collect();

        let quotes = validate_price_quotes(&raw_quotes).map_err(to_py_err)?;
        let spots = validate_spot_rates(&raw_spots).map_err(to_py_err)?;

        let (converted, stats) = self.inner.join_with_stats(&quotes, &spots);
        self.last_stats = stats;

        Ok(converted
            .iter()
            .map(|c| {
                (
                    format_timestamp(c.timestamp),
                    c.security_id,
                    c.price,
                    c.ccy_pair.clone(),
                    c.new_price,
                )
            })
            .collect())
    }

    /// Counts from the last run: (passthrough, matched, unmatched).
    fn stats(&self) -> (usize, usize, usize) {
        let s = self.last_stats;
        (s.passthrough, s.matched, s.unmatched)
    }

    /// Currency pairs that require conversion.
    fn conversion_pairs(&self) -> Vec<String> {
        self.inner.rules().pairs().into_iter().map(str::to_string).collect()
    }
}

/// Causal rolling stdev calculator over hourly observations.
#[pyclass]
pub struct PyRollingStdevCalculator {
    window_size: usize,
    price_cols: Vec<PriceType>,
}

impl PyRollingStdevCalculator {
    fn result_to_tuple(r: &StdevResult) -> StdevTuple {
        (
            format_timestamp(r.snap_time()),
            r.security_id(),
            r.stdev.bid_stdev,
            r.stdev.mid_stdev,
            r.stdev.ask_stdev,
            r.bid,
            r.mid,
            r.ask,
        )
    }
}

#[pymethods]
impl PyRollingStdevCalculator {
    #[new]
    #[pyo3(signature = (window_size=20, price_cols=None))]
    fn new(window_size: usize, price_cols: Option<Vec<String>>) -> PyResult<Self> {
        let price_cols = match price_cols {
            Some(cols) => cols
                .iter()
                .map(|c| c.parse::<PriceType>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(to_py_err)?,
            None => PriceType::ALL.to_vec(),
        };
        let calc = PyRollingStdevCalculator {
            window_size,
            price_cols,
        };
        calc.config(None, None).validate().map_err(to_py_err)?;
        Ok(calc)
    }

    /// Compute rolling stdev for a batch of observations.
    ///
    /// Rows are sorted by (security_id, snap_time).
    #[pyo3(signature = (observations, start_time=None, end_time=None))]
    fn run(
        &self,
        observations: Vec<ObservationTuple>,
        start_time: Option<String>,
        end_time: Option<String>,
    ) -> PyResult<Vec<StdevTuple>> {
        let raw: Vec<RawObservation> = observations
            .into_iter()
            .map(|(ts, security_id, bid, mid, ask)| RawObservation {
                snap_time: Some(ts),
                security_id: Some(security_id),
                bid,
                mid,
                ask,
            })
            .collect();
        let observations = validate_observations(&raw).map_err(to_py_err)?;

        let pipeline =
            VolatilityPipeline::new(self.config(start_time, end_time)).map_err(to_py_err)?;
        let result = pipeline.run(&observations).map_err(to_py_err)?;

        Ok(result.iter().map(Self::result_to_tuple).collect())
    }

    /// Get the window size.
    #[getter]
    fn window_size(&self) -> usize {
        self.window_size
    }
}

impl PyRollingStdevCalculator {
    fn config(&self, start_time: Option<String>, end_time: Option<String>) -> VolatilityConfig {
        VolatilityConfig {
            window_size: self.window_size,
            start_time,
            end_time,
            price_cols: self.price_cols.clone(),
        }
    }
}

// ============================================================================
// Module Definition
// ============================================================================

/// ratevol - FX normalization and rolling volatility in Rust.
#[pymodule]
fn ratevol(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyRatesProcessor>()?;
    m.add_class::<PyRollingStdevCalculator>()?;
    Ok(())
}
