//! Dense security × time grids.
//!
//! Long observation rows are pivoted onto a regular hourly axis so windowed
//! statistics can run column by column.

use ratevol_core::{
    Error, PriceObservation, PriceType, Result, SecurityId, Table, TimestampNs, HOUR_NS,
};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Regular hourly axis from `start` through `end` (inclusive), stepping from `start`.
///
/// Empty when `start > end`.
pub fn hourly_axis(start: TimestampNs, end: TimestampNs) -> Vec<TimestampNs> {
    if start > end {
        return Vec::new();
    }
    let steps = ((end - start) / HOUR_NS) as usize + 1;
    (0..steps).map(|i| start + i as i64 * HOUR_NS).collect()
}

/// Rectangular grid: one column per security, one row per axis tick.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseGrid {
    times: Vec<TimestampNs>,
    securities: Vec<SecurityId>,
    /// Column-major cells, `columns[security][time]`.
    columns: Vec<Vec<Option<f64>>>,
}

impl DenseGrid {
    /// Create a grid with every cell missing.
    pub fn empty(times: Vec<TimestampNs>, securities: Vec<SecurityId>) -> Self {
        let columns = vec![vec![None; times.len()]; securities.len()];
        Self {
            times,
            securities,
            columns,
        }
    }

    /// Build a grid from prepared columns.
    ///
    /// Every column must have one cell per axis tick.
    pub fn from_columns(
        times: Vec<TimestampNs>,
        securities: Vec<SecurityId>,
        columns: Vec<Vec<Option<f64>>>,
    ) -> Result<Self> {
        if columns.len() != securities.len() {
            return Err(Error::Other(format!(
                "grid has {} securities but {} columns",
                securities.len(),
                columns.len()
            )));
        }
        if let Some(bad) = columns.iter().position(|c| c.len() != times.len()) {
            return Err(Error::Other(format!(
                "grid column {} has {} cells, axis has {}",
                bad,
                columns[bad].len(),
                times.len()
            )));
        }
        Ok(Self {
            times,
            securities,
            columns,
        })
    }

    /// Time axis, ascending.
    pub fn times(&self) -> &[TimestampNs] {
        &self.times
    }

    /// Security ids, ascending.
    pub fn securities(&self) -> &[SecurityId] {
        &self.securities
    }

    /// Column of one security by position.
    pub fn column(&self, security_idx: usize) -> &[Option<f64>] {
        &self.columns[security_idx]
    }

    /// All columns.
    pub fn columns(&self) -> &[Vec<Option<f64>>] {
        &self.columns
    }

    /// Cell for a security and timestamp, if both are on the grid.
    pub fn get(&self, security_id: SecurityId, ts_ns: TimestampNs) -> Option<f64> {
        let s = self.securities.binary_search(&security_id).ok()?;
        let t = self.times.binary_search(&ts_ns).ok()?;
        self.columns[s][t]
    }

    /// Number of axis ticks.
    pub fn n_times(&self) -> usize {
        self.times.len()
    }

    /// Number of securities.
    pub fn n_securities(&self) -> usize {
        self.securities.len()
    }

    /// Number of non-missing cells.
    pub fn count_present(&self) -> usize {
        self.columns
            .iter()
            .map(|c| c.iter().filter(|v| v.is_some()).count())
            .sum()
    }

    /// New grid with the same axes and each column transformed.
    pub fn map_columns<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&[Option<f64>]) -> Vec<Option<f64>>,
    {
        let columns = self.columns.iter().map(|c| f(c)).collect();
        Self {
            times: self.times.clone(),
            securities: self.securities.clone(),
            columns,
        }
    }
}

/// Pivots long observations into a dense grid for one price type.
#[derive(Debug, Clone, Copy, Default)]
pub struct PivotReindexer;

impl PivotReindexer {
    pub fn new() -> Self {
        Self
    }

    /// Pivot `observations` onto `axis` for `price_type`.
    ///
    /// Columns are the distinct securities of the input, ascending. A cell
    /// holds a value only when an observation sits exactly on that tick.
    /// Two observations for the same security and snap_time are rejected.
    pub fn pivot(
        &self,
        observations: &Table<PriceObservation>,
        price_type: PriceType,
        axis: &[TimestampNs],
    ) -> Result<DenseGrid> {
        check_unique(observations)?;

        let securities: Vec<SecurityId> = observations
            .iter()
            .map(|o| o.security_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut grid = DenseGrid::empty(axis.to_vec(), securities);
        let mut off_axis = 0usize;

        for obs in observations {
            let Ok(t) = grid.times.binary_search(&obs.snap_time) else {
                off_axis += 1;
                continue;
            };
            // Present by construction.
            if let Ok(s) = grid.securities.binary_search(&obs.security_id) {
                grid.columns[s][t] = obs.price(price_type);
            }
        }

        debug!(
            price_type = %price_type,
            times = grid.n_times(),
            securities = grid.n_securities(),
            present = grid.count_present(),
            off_axis,
            "Pivoted observations"
        );

        Ok(grid)
    }
}

fn check_unique(observations: &Table<PriceObservation>) -> Result<()> {
    let mut seen = HashSet::with_capacity(observations.len());
    for obs in observations {
        if !seen.insert((obs.security_id, obs.snap_time)) {
            return Err(Error::DuplicateObservation {
                security_id: obs.security_id,
                snap_time: obs.snap_time,
            });
        }
    }
    Ok(())
}
