//! Batch pipeline for the ratevol system.
//!
//! This crate provides:
//! - Table loading from CSV and Parquet (DuckDB)
//! - CSV result writing
//! - Job descriptions and end-to-end runs
//! - Logging setup for the `ratevol` binary

pub mod source;
pub mod sink;
pub mod job;
pub mod runner;
pub mod logging;

pub use source::TableSource;
pub use sink::CsvSink;
pub use job::{JobConfig, RatesJob, StdevJob};
pub use runner::{failure_kind, run_job, run_rates, run_stdev, RatesSummary, RunSummary};
pub use logging::{init_logging, LogConfig, LogFormat};
