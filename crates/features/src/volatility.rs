//! Causal rolling volatility.
//!
//! Sample standard deviation (ddof = 1) over a fixed window of consecutive
//! grid positions. A window with any missing value has no statistic. The
//! value reported at position `t` is the latest valid statistic of a window
//! ending at or before `t - 1`.

use std::collections::VecDeque;

use crate::grid::DenseGrid;
use tracing::debug;

/// Rolling sample standard deviation over the last `window` values.
///
/// Sums are kept relative to an anchor value from the current run to limit
/// cancellation; the anchor is refreshed once per window.
#[derive(Debug, Clone)]
pub struct RollingStdev {
    /// Window size in positions.
    window: usize,
    /// Values of the current contiguous run (at most `window`).
    values: VecDeque<f64>,
    /// Shift applied to every value before summing.
    anchor: f64,
    /// Running sum of shifted values.
    sum: f64,
    /// Running sum of squared shifted values.
    sum_sq: f64,
    /// Pushes since the anchor was last set.
    since_anchor: usize,
}

impl RollingStdev {
    /// Create a new rolling stdev calculator.
    pub fn new(window: usize) -> Self {
        Self {
            window,
            values: VecDeque::with_capacity(window),
            anchor: 0.0,
            sum: 0.0,
            sum_sq: 0.0,
            since_anchor: 0,
        }
    }

    /// Add the next grid value. A missing (or NaN) value breaks the run.
    ///
    /// Returns the stdev of the window ending here, if it is complete.
    pub fn push(&mut self, value: Option<f64>) -> Option<f64> {
        match value {
            Some(x) if !x.is_nan() => {
                self.add(x);
                self.stdev()
            }
            _ => {
                self.clear();
                None
            }
        }
    }

    fn add(&mut self, x: f64) {
        if self.values.is_empty() {
            self.anchor = x;
            self.since_anchor = 0;
        }

        if self.values.len() >= self.window {
            if let Some(old) = self.values.pop_front() {
                let d = old - self.anchor;
                self.sum -= d;
                self.sum_sq -= d * d;
            }
        }

        let d = x - self.anchor;
        self.values.push_back(x);
        self.sum += d;
        self.sum_sq += d * d;
        self.since_anchor += 1;

        if self.since_anchor >= self.window && self.values.len() >= self.window {
            self.reanchor();
        }
    }

    /// Re-center the sums on the oldest value in the window.
    fn reanchor(&mut self) {
        let Some(&front) = self.values.front() else {
            return;
        };
        self.anchor = front;
        self.sum = 0.0;
        self.sum_sq = 0.0;
        for &v in &self.values {
            let d = v - front;
            self.sum += d;
            self.sum_sq += d * d;
        }
        self.since_anchor = 0;
    }

    /// Stdev of the current window, if full.
    pub fn stdev(&self) -> Option<f64> {
        if !self.is_ready() {
            return None;
        }

        let n = self.values.len() as f64;
        let variance = (self.sum_sq - self.sum * self.sum / n) / (n - 1.0);

        // Round-off can push a flat window slightly negative.
        if variance <= 0.0 {
            Some(0.0)
        } else {
            Some(variance.sqrt())
        }
    }

    /// Check if the window is full.
    pub fn is_ready(&self) -> bool {
        self.window >= 2 && self.values.len() >= self.window
    }

    /// Number of values in the current run (capped at the window).
    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// Clear all data.
    pub fn clear(&mut self) {
        self.values.clear();
        self.sum = 0.0;
        self.sum_sq = 0.0;
        self.since_anchor = 0;
    }
}

/// Stdev of the window ending at each position; missing unless all `window`
/// values are present.
pub fn rolling_stdev_raw(column: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut acc = RollingStdev::new(window);
    column.iter().map(|v| acc.push(*v)).collect()
}

/// Raw stdev shifted one position forward, then forward-filled.
///
/// Position `t` depends only on positions `< t`. Positions before the first
/// complete window stay missing.
pub fn causal_rolling_stdev(column: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut acc = RollingStdev::new(window);
    let mut carried = None;
    let mut out = Vec::with_capacity(column.len());

    for value in column {
        out.push(carried);
        if let Some(sd) = acc.push(*value) {
            carried = Some(sd);
        }
    }

    out
}

/// Applies the causal rolling stdev to every column of a grid.
#[derive(Debug, Clone, Copy)]
pub struct RollingStatsEngine {
    window: usize,
}

impl RollingStatsEngine {
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Causal rolling stdev grid with the same axes as `grid`.
    pub fn compute(&self, grid: &DenseGrid) -> DenseGrid {
        let out = grid.map_columns(|column| causal_rolling_stdev(column, self.window));
        debug!(
            window = self.window,
            securities = out.n_securities(),
            estimates = out.count_present(),
            "Computed rolling stdev grid"
        );
        out
    }
}

impl Default for RollingStatsEngine {
    fn default() -> Self {
        Self::new(20)
    }
}
