//! Reshape stdev grids back to long rows and merge the price types.

use ratevol_core::{
    PriceObservation, PriceType, SecurityId, StdevObservation, StdevResult, Table, TimestampNs,
};
use std::collections::HashMap;
use tracing::debug;

use crate::grid::DenseGrid;

/// One grid cell in long form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LongCell {
    pub snap_time: TimestampNs,
    pub security_id: SecurityId,
    pub value: Option<f64>,
}

/// Long-form cells of one price type.
#[derive(Debug, Clone)]
pub struct LongSeries {
    pub price_type: PriceType,
    pub cells: Vec<LongCell>,
}

type CellKey = (SecurityId, TimestampNs);

/// Turns stdev grids into the final long result table.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnpivotMerger {
    /// Earliest snap_time kept (inclusive).
    start_time: Option<TimestampNs>,
}

impl UnpivotMerger {
    pub fn new(start_time: Option<TimestampNs>) -> Self {
        Self { start_time }
    }

    /// Every cell of the grid, security-major then time ascending.
    pub fn unpivot(grid: &DenseGrid, price_type: PriceType) -> LongSeries {
        let mut cells = Vec::with_capacity(grid.n_times() * grid.n_securities());
        for (s, &security_id) in grid.securities().iter().enumerate() {
            let column = grid.column(s);
            cells.extend(grid.times().iter().zip(column).map(|(&snap_time, &value)| LongCell {
                snap_time,
                security_id,
                value,
            }));
        }
        LongSeries { price_type, cells }
    }

    /// Drop cells before the start time.
    fn restrict(&self, series: LongSeries) -> LongSeries {
        match self.start_time {
            Some(start) => LongSeries {
                price_type: series.price_type,
                cells: series
                    .cells
                    .into_iter()
                    .filter(|c| c.snap_time >= start)
                    .collect(),
            },
            None => series,
        }
    }

    /// Inner-join the price types on (security_id, snap_time), then left-join
    /// the source observations.
    ///
    /// Row order follows the first series. Price types not supplied keep a
    /// missing stdev.
    pub fn merge(
        &self,
        series: Vec<LongSeries>,
        observations: &Table<PriceObservation>,
    ) -> Table<StdevResult> {
        let mut series: Vec<LongSeries> = series.into_iter().map(|s| self.restrict(s)).collect();
        if series.is_empty() {
            return Table::empty();
        }
        let first = series.remove(0);

        let lookups: Vec<(PriceType, HashMap<CellKey, Option<f64>>)> = series
            .iter()
            .map(|s| {
                let map = s
                    .cells
                    .iter()
                    .map(|c| ((c.security_id, c.snap_time), c.value))
                    .collect();
                (s.price_type, map)
            })
            .collect();

        let mut by_key: HashMap<CellKey, Vec<&PriceObservation>> = HashMap::new();
        for obs in observations {
            by_key
                .entry((obs.security_id, obs.snap_time))
                .or_default()
                .push(obs);
        }

        let mut rows = Vec::with_capacity(first.cells.len());
        'cells: for cell in &first.cells {
            let key = (cell.security_id, cell.snap_time);

            let mut stdev = StdevObservation {
                snap_time: cell.snap_time,
                security_id: cell.security_id,
                ..Default::default()
            };
            stdev.set_stdev(first.price_type, cell.value);

            for (price_type, lookup) in &lookups {
                match lookup.get(&key) {
                    Some(value) => stdev.set_stdev(*price_type, *value),
                    None => continue 'cells,
                }
            }

            match by_key.get(&key) {
                Some(matches) => {
                    for obs in matches {
                        rows.push(StdevResult {
                            stdev: stdev.clone(),
                            bid: obs.bid,
                            mid: obs.mid,
                            ask: obs.ask,
                        });
                    }
                }
                None => rows.push(StdevResult {
                    stdev,
                    bid: None,
                    mid: None,
                    ask: None,
                }),
            }
        }

        debug!(
            rows = rows.len(),
            price_types = lookups.len() + 1,
            "Merged stdev series"
        );

        Table::new(rows)
    }
}
