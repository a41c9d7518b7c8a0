//! Data ingestion and normalization for the ratevol system.
//!
//! This crate handles:
//! - Input validation of raw rows into typed tables
//! - Currency-pair conversion rules
//! - Quote-to-spot-rate alignment (backward asof join)
//! - Price normalization

pub mod validation;
pub mod conversion;
pub mod asof_join;

pub use validation::{
    RawConversionRule, RawObservation, RawPriceQuote, RawSpotRate, validate_conversion_rules,
    validate_observations, validate_price_quotes, validate_spot_rates,
};
pub use conversion::ConversionRuleSet;
pub use asof_join::{AsofJoinEngine, AsofStats};
