//! Currency normalization by backward asof join.
//!
//! Each quote whose pair requires conversion is matched with the latest spot
//! rate of the same pair at or before the quote, no older than the tolerance.

use ratevol_core::{
    ConversionConfig, ConvertedPrice, PriceQuote, SpotRate, Table, TimestampNs, HOUR_NS,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::conversion::ConversionRuleSet;

/// Counts from one join run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AsofStats {
    /// Quotes in pairs that need no conversion.
    pub passthrough: usize,
    /// Converting quotes with a spot rate inside the tolerance.
    pub matched: usize,
    /// Converting quotes left without a new price.
    pub unmatched: usize,
    /// Spot rates dropped because their pair does not convert.
    pub spots_dropped: usize,
}

impl AsofStats {
    /// Fraction of converting quotes that found a spot rate.
    pub fn match_rate(&self) -> f64 {
        let total = self.matched + self.unmatched;
        if total > 0 {
            self.matched as f64 / total as f64
        } else {
            1.0
        }
    }
}

/// Spot rates of one pair, sorted by time. Ties keep input order.
struct SpotSeries {
    times: Vec<TimestampNs>,
    rates: Vec<f64>,
}

impl SpotSeries {
    /// Latest rate at or before `ts_ns`, within `tolerance_ns`.
    ///
    /// Among equal timestamps the last one in input order wins.
    fn find_rate(&self, ts_ns: TimestampNs, tolerance_ns: i64) -> Option<f64> {
        let idx = self.times.partition_point(|&t| t <= ts_ns);
        if idx == 0 {
            return None;
        }
        let spot_ts = self.times[idx - 1];
        if ts_ns - spot_ts <= tolerance_ns {
            Some(self.rates[idx - 1])
        } else {
            None
        }
    }
}

/// Asof join engine for currency normalization.
pub struct AsofJoinEngine {
    rules: ConversionRuleSet,
    /// Maximum spot rate age (ns), inclusive.
    tolerance_ns: i64,
}

impl AsofJoinEngine {
    /// Create an engine with the default one-hour tolerance.
    pub fn new(rules: ConversionRuleSet) -> Self {
        Self {
            rules,
            tolerance_ns: HOUR_NS,
        }
    }

    /// Create an engine from configuration.
    pub fn from_config(rules: ConversionRuleSet, config: &ConversionConfig) -> Self {
        Self::new(rules).with_tolerance_ns(config.tolerance_ns())
    }

    /// Override the tolerance.
    pub fn with_tolerance_ns(mut self, tolerance_ns: i64) -> Self {
        self.tolerance_ns = tolerance_ns;
        self
    }

    /// The conversion rules in use.
    pub fn rules(&self) -> &ConversionRuleSet {
        &self.rules
    }

    /// Normalize quote prices.
    pub fn join(&self, quotes: &Table<PriceQuote>, spots: &Table<SpotRate>) -> Table<ConvertedPrice> {
        self.join_with_stats(quotes, spots).0
    }

    /// Normalize quote prices and report match counts.
    ///
    /// Output holds the converting quotes sorted by timestamp, followed by the
    /// passthrough quotes in input order.
    pub fn join_with_stats(
        &self,
        quotes: &Table<PriceQuote>,
        spots: &Table<SpotRate>,
    ) -> (Table<ConvertedPrice>, AsofStats) {
        let mut stats = AsofStats::default();

        let (mut to_convert, passthrough): (Vec<&PriceQuote>, Vec<&PriceQuote>) = quotes
            .iter()
            .partition(|q| self.rules.requires_conversion(&q.ccy_pair));
        stats.passthrough = passthrough.len();

        let series = self.build_spot_series(spots, &mut stats);

        to_convert.sort_by_key(|q| q.timestamp);

        let mut rows = Vec::with_capacity(quotes.len());
        for quote in to_convert {
            let new_price = self.convert(quote, series.get(quote.ccy_pair.as_str()));
            if new_price.is_some() {
                stats.matched += 1;
            } else {
                stats.unmatched += 1;
            }
            rows.push(ConvertedPrice {
                timestamp: quote.timestamp,
                security_id: quote.security_id,
                price: quote.price,
                ccy_pair: quote.ccy_pair.clone(),
                new_price,
            });
        }

        rows.extend(passthrough.into_iter().map(|q| ConvertedPrice {
            timestamp: q.timestamp,
            security_id: q.security_id,
            price: q.price,
            ccy_pair: q.ccy_pair.clone(),
            new_price: Some(q.price),
        }));

        info!(
            passthrough = stats.passthrough,
            matched = stats.matched,
            unmatched = stats.unmatched,
            "Asof conversion join complete"
        );
        if stats.unmatched > 0 {
            warn!(
                unmatched = stats.unmatched,
                tolerance_ns = self.tolerance_ns,
                "Quotes without a spot rate inside the tolerance"
            );
        }

        (Table::new(rows), stats)
    }

    /// Group converting spot rates by pair, each sorted by time.
    fn build_spot_series<'a>(
        &self,
        spots: &'a Table<SpotRate>,
        stats: &mut AsofStats,
    ) -> HashMap<&'a str, SpotSeries> {
        let mut grouped: HashMap<&'a str, Vec<(TimestampNs, f64)>> = HashMap::new();
        for spot in spots {
            if self.rules.requires_conversion(&spot.ccy_pair) {
                grouped
                    .entry(spot.ccy_pair.as_str())
                    .or_default()
                    .push((spot.timestamp, spot.spot_mid_rate));
            } else {
                stats.spots_dropped += 1;
            }
        }

        grouped
            .into_iter()
            .map(|(pair, mut points)| {
                // Stable: equal timestamps stay in input order.
                points.sort_by_key(|&(ts, _)| ts);
                debug!(ccy_pair = pair, spots = points.len(), "Built spot series");
                let (times, rates) = points.into_iter().unzip();
                (pair, SpotSeries { times, rates })
            })
            .collect()
    }

    /// New price for a converting quote, if a spot rate qualifies.
    fn convert(&self, quote: &PriceQuote, series: Option<&SpotSeries>) -> Option<f64> {
        let factor = self.rules.factor_of(&quote.ccy_pair)?;
        let spot = series?.find_rate(quote.timestamp, self.tolerance_ns)?;
        Some(quote.price / factor + spot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ratevol_core::{parse_timestamp, ConversionRule, MINUTE_NS};

    fn ts(s: &str) -> TimestampNs {
        parse_timestamp(s).unwrap()
    }

    fn make_engine() -> AsofJoinEngine {
        let rules = Table::new(vec![
            ConversionRule {
                ccy_pair: "EURGBP".to_string(),
                conversion_factor: 100.0,
                requires_conversion: true,
            },
            ConversionRule {
                ccy_pair: "USDJPY".to_string(),
                conversion_factor: 10.0,
                requires_conversion: true,
            },
            ConversionRule {
                ccy_pair: "EURUSD".to_string(),
                conversion_factor: 1.0,
                requires_conversion: false,
            },
        ]);
        AsofJoinEngine::new(ConversionRuleSet::from_rules(&rules))
    }

    fn make_quote(t: &str, id: i64, pair: &str, price: f64) -> PriceQuote {
        PriceQuote {
            timestamp: ts(t),
            security_id: id,
            ccy_pair: pair.to_string(),
            price,
        }
    }

    fn make_spot(t: &str, pair: &str, rate: f64) -> SpotRate {
        SpotRate {
            timestamp: ts(t),
            ccy_pair: pair.to_string(),
            spot_mid_rate: rate,
        }
    }

    #[test]
    fn test_worked_example() {
        let engine = make_engine();
        let quotes = Table::new(vec![
            make_quote("2021-11-20 10:00:00", 1, "EURGBP", 150.0),
            make_quote("2021-11-20 12:00:00", 1, "EURGBP", 150.0),
        ]);
        let spots = Table::new(vec![make_spot("2021-11-20 09:30:00", "EURGBP", 0.85)]);

        let (out, stats) = engine.join_with_stats(&quotes, &spots);

        assert_eq!(out.len(), 2);
        assert_relative_eq!(out.rows()[0].new_price.unwrap(), 2.35, epsilon = 1e-12);
        assert_eq!(out.rows()[1].new_price, None);
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.unmatched, 1);
    }

    #[test]
    fn test_passthrough_is_exact() {
        let engine = make_engine();
        let quotes = Table::new(vec![
            make_quote("2021-11-20 10:00:00", 2, "EURUSD", 101.37),
            make_quote("2021-11-20 10:00:00", 3, "AUDNZD", 0.1 + 0.2),
        ]);
        let spots = Table::new(vec![make_spot("2021-11-20 09:59:00", "EURUSD", 1.13)]);

        let (out, stats) = engine.join_with_stats(&quotes, &spots);

        for row in out.iter() {
            assert_eq!(row.new_price, Some(row.price));
        }
        assert_eq!(stats.passthrough, 2);
        assert_eq!(stats.spots_dropped, 1);
    }

    #[test]
    fn test_tolerance_boundary_inclusive() {
        let engine = make_engine();
        let quotes = Table::new(vec![make_quote("2021-11-20 10:00:00", 1, "EURGBP", 200.0)]);

        let exact = Table::new(vec![make_spot("2021-11-20 09:00:00", "EURGBP", 1.0)]);
        let out = engine.join(&quotes, &exact);
        assert_relative_eq!(out.rows()[0].new_price.unwrap(), 3.0);

        let too_old = Table::new(vec![make_spot("2021-11-20 08:59:59", "EURGBP", 1.0)]);
        let out = engine.join(&quotes, &too_old);
        assert_eq!(out.rows()[0].new_price, None);
    }

    #[test]
    fn test_tolerance_boundary_sub_millisecond() {
        let engine = make_engine();
        let spots = Table::new(vec![make_spot("2021-11-20 09:00:00", "EURGBP", 0.85)]);

        let late = Table::new(vec![make_quote("2021-11-20 10:00:00.000900", 1, "EURGBP", 150.0)]);
        assert_eq!(engine.join(&late, &spots).rows()[0].new_price, None);

        let late_ns = Table::new(vec![make_quote("2021-11-20 10:00:00.000000001", 1, "EURGBP", 150.0)]);
        assert_eq!(engine.join(&late_ns, &spots).rows()[0].new_price, None);
    }

    #[test]
    fn test_equal_timestamp_matches() {
        let engine = make_engine();
        let quotes = Table::new(vec![make_quote("2021-11-20 10:00:00", 1, "EURGBP", 100.0)]);
        let spots = Table::new(vec![make_spot("2021-11-20 10:00:00", "EURGBP", 0.5)]);

        let out = engine.join(&quotes, &spots);
        assert_relative_eq!(out.rows()[0].new_price.unwrap(), 1.5);
    }

    #[test]
    fn test_future_spot_never_used() {
        let engine = make_engine();
        let quotes = Table::new(vec![make_quote("2021-11-20 10:00:00", 1, "EURGBP", 100.0)]);
        let spots = Table::new(vec![
            make_spot("2021-11-20 09:10:00", "EURGBP", 0.5),
            make_spot("2021-11-20 10:00:01", "EURGBP", 9.0),
        ]);

        let out = engine.join(&quotes, &spots);
        assert_relative_eq!(out.rows()[0].new_price.unwrap(), 1.5);
    }

    #[test]
    fn test_nearest_prior_and_per_pair() {
        let engine = make_engine();
        let quotes = Table::new(vec![
            make_quote("2021-11-20 10:00:00", 1, "EURGBP", 100.0),
            make_quote("2021-11-20 10:00:00", 2, "USDJPY", 100.0),
        ]);
        // Unsorted input; USDJPY has a closer rate that must not leak into EURGBP.
        let spots = Table::new(vec![
            make_spot("2021-11-20 09:45:00", "EURGBP", 0.7),
            make_spot("2021-11-20 09:15:00", "EURGBP", 0.6),
            make_spot("2021-11-20 09:59:00", "USDJPY", 110.0),
        ]);

        let out = engine.join(&quotes, &spots);
        let eurgbp = out.iter().find(|r| r.security_id == 1).unwrap();
        let usdjpy = out.iter().find(|r| r.security_id == 2).unwrap();
        assert_relative_eq!(eurgbp.new_price.unwrap(), 1.7);
        assert_relative_eq!(usdjpy.new_price.unwrap(), 120.0);
    }

    #[test]
    fn test_duplicate_spot_timestamp_last_wins() {
        let engine = make_engine();
        let quotes = Table::new(vec![make_quote("2021-11-20 10:00:00", 1, "EURGBP", 100.0)]);
        let spots = Table::new(vec![
            make_spot("2021-11-20 09:30:00", "EURGBP", 0.5),
            make_spot("2021-11-20 09:30:00", "EURGBP", 0.8),
        ]);

        let out = engine.join(&quotes, &spots);
        assert_relative_eq!(out.rows()[0].new_price.unwrap(), 1.8);
    }

    #[test]
    fn test_output_order_and_row_count() {
        let engine = make_engine();
        let quotes = Table::new(vec![
            make_quote("2021-11-20 11:00:00", 1, "EURGBP", 100.0),
            make_quote("2021-11-20 09:00:00", 2, "EURUSD", 1.0),
            make_quote("2021-11-20 10:00:00", 3, "EURGBP", 100.0),
            make_quote("2021-11-20 08:00:00", 4, "EURUSD", 1.0),
        ]);

        let out = engine.join(&quotes, &Table::empty());

        let ids: Vec<i64> = out.iter().map(|r| r.security_id).collect();
        assert_eq!(ids, vec![3, 1, 2, 4]);
        assert_eq!(out.iter().filter(|r| r.new_price.is_none()).count(), 2);
    }

    #[test]
    fn test_custom_tolerance() {
        let engine = make_engine().with_tolerance_ns(15 * MINUTE_NS);
        let quotes = Table::new(vec![make_quote("2021-11-20 10:00:00", 1, "EURGBP", 100.0)]);
        let spots = Table::new(vec![make_spot("2021-11-20 09:30:00", "EURGBP", 0.5)]);

        assert_eq!(engine.join(&quotes, &spots).rows()[0].new_price, None);
    }
}
