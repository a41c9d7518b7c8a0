//! Rolling volatility pipeline.
//!
//! Combines pivot, rolling stdev and unpivot into one batch computation.

use ratevol_core::{
    PriceObservation, Result, StdevResult, Table, TimestampNs, VolatilityConfig,
};
use tracing::info;

use crate::{
    grid::{hourly_axis, PivotReindexer},
    unpivot::UnpivotMerger,
    volatility::RollingStatsEngine,
};

/// Causal rolling stdev for every security and requested price type.
pub struct VolatilityPipeline {
    config: VolatilityConfig,
    pivot: PivotReindexer,
    stats: RollingStatsEngine,
    start_time: Option<TimestampNs>,
    end_time: Option<TimestampNs>,
}

impl VolatilityPipeline {
    /// Create a pipeline from configuration.
    pub fn new(config: VolatilityConfig) -> Result<Self> {
        config.validate()?;
        let (start_time, end_time) = config.bounds()?;
        Ok(Self {
            stats: RollingStatsEngine::new(config.window_size),
            pivot: PivotReindexer::new(),
            config,
            start_time,
            end_time,
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &VolatilityConfig {
        &self.config
    }

    /// Run over a batch of observations.
    ///
    /// Rows after the end time are dropped before the grid is built; rows
    /// before the start time feed the windows but are not emitted.
    pub fn run(&self, observations: &Table<PriceObservation>) -> Result<Table<StdevResult>> {
        let in_range = match self.end_time {
            Some(end) => observations.filter(|o| o.snap_time <= end),
            None => observations.clone(),
        };

        let Some(earliest) = in_range.iter().map(|o| o.snap_time).min() else {
            info!("No observations at or before end time");
            return Ok(Table::empty());
        };
        let end = match self.end_time {
            Some(end) => end,
            None => in_range.iter().map(|o| o.snap_time).max().unwrap_or(earliest),
        };
        let axis = hourly_axis(earliest, end);

        let mut series = Vec::with_capacity(self.config.price_cols.len());
        for &price_type in &self.config.price_cols {
            let grid = self.pivot.pivot(&in_range, price_type, &axis)?;
            let stdev = self.stats.compute(&grid);
            series.push(UnpivotMerger::unpivot(&stdev, price_type));
        }

        let result = UnpivotMerger::new(self.start_time).merge(series, observations);

        info!(
            observations = observations.len(),
            hours = axis.len(),
            window = self.config.window_size,
            rows = result.len(),
            "Rolling stdev complete"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ratevol_core::{format_timestamp, parse_timestamp, Error, PriceType, HOUR_NS};

    fn config(window: usize, start: Option<&str>, end: Option<&str>) -> VolatilityConfig {
        VolatilityConfig {
            window_size: window,
            start_time: start.map(str::to_string),
            end_time: end.map(str::to_string),
            ..Default::default()
        }
    }

    fn hourly_obs(id: i64, start: &str, mids: &[Option<f64>]) -> Vec<PriceObservation> {
        let t0 = parse_timestamp(start).unwrap();
        mids.iter()
            .enumerate()
            .filter(|(_, m)| m.is_some())
            .map(|(i, &mid)| PriceObservation {
                snap_time: t0 + i as i64 * HOUR_NS,
                security_id: id,
                bid: mid.map(|m| m - 0.5),
                mid,
                ask: mid.map(|m| m + 0.5),
            })
            .collect()
    }

    #[test]
    fn test_rolling_example() {
        let mids: Vec<Option<f64>> = (1..=6).map(|v| Some(v as f64)).collect();
        let table = Table::new(hourly_obs(1, "2021-11-20 00:00:00", &mids));
        let pipeline = VolatilityPipeline::new(config(3, None, Some("2021-11-20 05:00:00"))).unwrap();

        let out = pipeline.run(&table).unwrap();

        assert_eq!(out.len(), 6);
        assert!(out.rows()[..3].iter().all(|r| r.stdev.mid_stdev.is_none()));
        // Window [1, 2, 3] is reported at the 4th hour.
        assert_relative_eq!(out.rows()[3].stdev.mid_stdev.unwrap(), 1.0, epsilon = 1e-12);
        // bid and ask are shifted copies of mid: same stdev.
        assert_relative_eq!(out.rows()[3].stdev.bid_stdev.unwrap(), 1.0, epsilon = 1e-12);
        assert_eq!(out.rows()[3].mid, Some(4.0));
    }

    #[test]
    fn test_grid_extends_to_end_time_and_carries_forward() {
        let mids: Vec<Option<f64>> = (1..=4).map(|v| Some(v as f64)).collect();
        let table = Table::new(hourly_obs(1, "2021-11-20 00:00:00", &mids));
        let pipeline = VolatilityPipeline::new(config(3, None, Some("2021-11-20 07:00:00"))).unwrap();

        let out = pipeline.run(&table).unwrap();

        assert_eq!(out.len(), 8);
        let last = &out.rows()[7];
        assert_eq!(format_timestamp(last.snap_time()), "2021-11-20 07:00:00");
        assert_relative_eq!(last.stdev.mid_stdev.unwrap(), 1.0, epsilon = 1e-12);
        assert_eq!(last.mid, None);
    }

    #[test]
    fn test_start_and_end_filters() {
        let mids: Vec<Option<f64>> = (0..10).map(|v| Some(v as f64 * v as f64)).collect();
        let table = Table::new(hourly_obs(1, "2021-11-20 00:00:00", &mids));
        let pipeline = VolatilityPipeline::new(config(
            3,
            Some("2021-11-20 04:00:00"),
            Some("2021-11-20 06:00:00"),
        ))
        .unwrap();

        let out = pipeline.run(&table).unwrap();

        let times: Vec<String> = out.iter().map(|r| format_timestamp(r.snap_time())).collect();
        assert_eq!(
            times,
            vec!["2021-11-20 04:00:00", "2021-11-20 05:00:00", "2021-11-20 06:00:00"]
        );
        // Lookback before the start still feeds the window: hours 1..=3 -> [1, 4, 9].
        let window = [1.0_f64, 4.0, 9.0];
        let mean = window.iter().sum::<f64>() / 3.0;
        let expected = (window.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / 2.0).sqrt();
        assert_relative_eq!(out.rows()[0].stdev.mid_stdev.unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_multiple_securities_sorted() {
        let mut rows = hourly_obs(7, "2021-11-20 00:00:00", &[Some(1.0), Some(2.0)]);
        rows.extend(hourly_obs(3, "2021-11-20 01:00:00", &[Some(5.0)]));
        let pipeline = VolatilityPipeline::new(config(2, None, None)).unwrap();

        let out = pipeline.run(&Table::new(rows)).unwrap();

        let keys: Vec<(i64, String)> = out
            .iter()
            .map(|r| (r.security_id(), format_timestamp(r.snap_time())))
            .collect();
        assert_eq!(
            keys,
            vec![
                (3, "2021-11-20 00:00:00".to_string()),
                (3, "2021-11-20 01:00:00".to_string()),
                (7, "2021-11-20 00:00:00".to_string()),
                (7, "2021-11-20 01:00:00".to_string()),
            ]
        );
    }

    #[test]
    fn test_subset_of_price_types() {
        let mids: Vec<Option<f64>> = (1..=4).map(|v| Some(v as f64)).collect();
        let table = Table::new(hourly_obs(1, "2021-11-20 00:00:00", &mids));
        let mut cfg = config(2, None, None);
        cfg.price_cols = vec![PriceType::Ask];

        let out = VolatilityPipeline::new(cfg).unwrap().run(&table).unwrap();

        assert!(out.iter().all(|r| r.stdev.bid_stdev.is_none() && r.stdev.mid_stdev.is_none()));
        assert!(out.rows()[3].stdev.ask_stdev.is_some());
    }

    #[test]
    fn test_empty_input() {
        let pipeline = VolatilityPipeline::new(config(20, None, Some("2021-11-20 00:00:00"))).unwrap();
        let later = Table::new(hourly_obs(1, "2021-11-21 00:00:00", &[Some(1.0)]));

        assert!(pipeline.run(&Table::empty()).unwrap().is_empty());
        assert!(pipeline.run(&later).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_observation_is_fatal() {
        let mut rows = hourly_obs(1, "2021-11-20 00:00:00", &[Some(1.0)]);
        rows.push(rows[0].clone());
        let pipeline = VolatilityPipeline::new(config(2, None, None)).unwrap();

        assert!(matches!(
            pipeline.run(&Table::new(rows)),
            Err(Error::DuplicateObservation { .. })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(VolatilityPipeline::new(config(1, None, None)).is_err());
    }
}
