//! Feature computation for the ratevol system.
//!
//! This crate handles:
//! - Pivoting observations onto a dense hourly grid
//! - Causal rolling standard deviation with carry-forward
//! - Unpivoting and merging price types back to long rows
//! - The end-to-end volatility pipeline

pub mod grid;
pub mod volatility;
pub mod unpivot;
pub mod engine;

pub use grid::{hourly_axis, DenseGrid, PivotReindexer};
pub use volatility::{causal_rolling_stdev, rolling_stdev_raw, RollingStatsEngine, RollingStdev};
pub use unpivot::{LongCell, LongSeries, UnpivotMerger};
pub use engine::VolatilityPipeline;
