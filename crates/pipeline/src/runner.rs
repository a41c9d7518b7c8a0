//! End-to-end batch runs: load, validate, compute, write.

use anyhow::{Context, Result};
use ratevol_core::{Config, ConversionConfig, Error, VolatilityConfig};
use ratevol_features::VolatilityPipeline;
use ratevol_ingestion::{
    validate_conversion_rules, validate_observations, validate_price_quotes, validate_spot_rates,
    AsofJoinEngine, AsofStats, ConversionRuleSet,
};
use std::time::{Duration, Instant};
use tracing::info;

use crate::job::{JobConfig, RatesJob, StdevJob};
use crate::sink::CsvSink;
use crate::source::TableSource;

/// Outcome of one job.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunSummary {
    /// Rows written to the output file.
    pub rows: usize,
    pub elapsed: Duration,
}

/// Outcome of the conversion job.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RatesSummary {
    pub run: RunSummary,
    pub stats: AsofStats,
}

/// Convert quote prices using spot rates and write the result.
pub fn run_rates(job: &RatesJob, config: &ConversionConfig) -> Result<RatesSummary> {
    let start = Instant::now();
    let source = TableSource::new()?;

    let rules = source
        .conversion_rules(&job.ccy_path)
        .with_context(|| format!("loading conversion rules from {}", job.ccy_path.display()))?;
    let quotes = source
        .price_quotes(&job.price_path)
        .with_context(|| format!("loading price quotes from {}", job.price_path.display()))?;
    let spots = source
        .spot_rates(&job.spot_path)
        .with_context(|| format!("loading spot rates from {}", job.spot_path.display()))?;

    let rules = ConversionRuleSet::from_rules(&validate_conversion_rules(&rules)?);
    let quotes = validate_price_quotes(&quotes)?;
    let spots = validate_spot_rates(&spots)?;

    let engine = AsofJoinEngine::from_config(rules, config);
    let (converted, stats) = engine.join_with_stats(&quotes, &spots);

    CsvSink::new()
        .write(&converted, &job.output_path)
        .with_context(|| format!("writing {}", job.output_path.display()))?;

    let elapsed = start.elapsed();
    info!(
        rows = converted.len(),
        output = %job.output_path.display(),
        "Rates job took {:.3} seconds",
        elapsed.as_secs_f64()
    );

    Ok(RatesSummary {
        run: RunSummary {
            rows: converted.len(),
            elapsed,
        },
        stats,
    })
}

/// Compute rolling stdev of the observations and write the result.
pub fn run_stdev(job: &StdevJob, config: &VolatilityConfig) -> Result<RunSummary> {
    let start = Instant::now();
    let pipeline = VolatilityPipeline::new(config.clone())?;

    let raw = TableSource::new()?
        .observations(&job.data_path)
        .with_context(|| format!("loading observations from {}", job.data_path.display()))?;
    let observations = validate_observations(&raw)?;

    let result = pipeline.run(&observations)?;

    CsvSink::new()
        .write(&result, &job.output_path)
        .with_context(|| format!("writing {}", job.output_path.display()))?;

    let elapsed = start.elapsed();
    info!(
        rows = result.len(),
        output = %job.output_path.display(),
        "Stdev job took {:.3} seconds",
        elapsed.as_secs_f64()
    );

    Ok(RunSummary {
        rows: result.len(),
        elapsed,
    })
}

/// Run every job in the description, rates first.
pub fn run_job(job: &JobConfig) -> Result<()> {
    let Config {
        conversion,
        volatility,
    } = &job.config;

    if job.is_empty() {
        info!("No jobs configured");
        return Ok(());
    }
    if let Some(rates) = &job.rates {
        let summary = run_rates(rates, conversion)?;
        info!(
            match_rate = summary.stats.match_rate(),
            "Rates job finished"
        );
    }
    if let Some(stdev) = &job.stdev {
        run_stdev(stdev, volatility)?;
    }
    Ok(())
}

/// Short label for a failed run: rejected input data or anything else.
pub fn failure_kind(err: &anyhow::Error) -> &'static str {
    let input = err
        .chain()
        .filter_map(|cause| cause.downcast_ref::<Error>())
        .any(Error::is_input_error);
    if input {
        "input rejected"
    } else {
        "run failed"
    }
}
