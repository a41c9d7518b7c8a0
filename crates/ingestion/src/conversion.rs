//! Currency-pair conversion rules.

use ratevol_core::{ConversionRule, Table};
use std::collections::HashMap;

/// Lookup of the pairs that need conversion and their factor.
///
/// Pairs that are absent, or present with the flag unset, never convert.
#[derive(Debug, Clone, Default)]
pub struct ConversionRuleSet {
    factors: HashMap<String, f64>,
}

impl ConversionRuleSet {
    /// Build from the reference table. A later flagged row for the same pair
    /// overrides an earlier one.
    pub fn from_rules(rules: &Table<ConversionRule>) -> Self {
        let factors = rules
            .iter()
            .filter(|r| r.requires_conversion)
            .map(|r| (r.ccy_pair.clone(), r.conversion_factor))
            .collect();
        Self { factors }
    }

    /// Whether quotes in this pair must be converted.
    #[inline]
    pub fn requires_conversion(&self, ccy_pair: &str) -> bool {
        self.factors.contains_key(ccy_pair)
    }

    /// Conversion factor for a pair, if it converts.
    #[inline]
    pub fn factor_of(&self, ccy_pair: &str) -> Option<f64> {
        self.factors.get(ccy_pair).copied()
    }

    /// Number of converting pairs.
    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Converting pairs, sorted.
    pub fn pairs(&self) -> Vec<&str> {
        let mut pairs: Vec<&str> = self.factors.keys().map(String::as_str).collect();
        pairs.sort_unstable();
        pairs
    }
}
