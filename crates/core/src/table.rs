//! Immutable typed tables.
//!
//! Every pipeline stage takes a `Table` by reference and returns a new one.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::types::TimestampNs;

/// Logical column type, used by writers to pick a storage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Timestamp,
    Integer,
    Float,
    Text,
}

/// A single rendered cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Timestamp(TimestampNs),
    Integer(i64),
    /// `None` is a missing value.
    Float(Option<f64>),
    Text(String),
}

/// A row type with a fixed, ordered column schema.
pub trait Row {
    /// Column names and types, in output order.
    const SCHEMA: &'static [(&'static str, ColumnType)];

    /// Render the row, one cell per schema column.
    fn cells(&self) -> Vec<Cell>;
}

/// Immutable collection of rows.
///
/// Cloning is cheap: rows are shared.
#[derive(Debug, Clone)]
pub struct Table<R> {
    rows: Arc<[R]>,
}

impl<R> Table<R> {
    /// Create a table from rows.
    pub fn new(rows: Vec<R>) -> Self {
        Self { rows: rows.into() }
    }

    /// Create an empty table.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as a slice.
    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    /// Iterate over rows.
    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.rows.iter()
    }
}

impl<R: Clone> Table<R> {
    /// Rows matching a predicate, as a new table.
    pub fn filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(&R) -> bool,
    {
        Self::new(self.rows.iter().filter(|r| predicate(r)).cloned().collect())
    }

    /// This table's rows followed by `other`'s.
    pub fn concat(&self, other: &Self) -> Self {
        let mut rows = Vec::with_capacity(self.len() + other.len());
        rows.extend_from_slice(&self.rows);
        rows.extend_from_slice(&other.rows);
        Self::new(rows)
    }

    /// Rows stably sorted by a key, as a new table.
    pub fn sorted_by_key<K, F>(&self, key: F) -> Self
    where
        K: Ord,
        F: FnMut(&R) -> K,
    {
        let mut rows = self.rows.to_vec();
        rows.sort_by_key(key);
        Self::new(rows)
    }

    /// Copy the rows out.
    pub fn to_vec(&self) -> Vec<R> {
        self.rows.to_vec()
    }
}

impl<R: Row> Table<R> {
    /// Column names in schema order.
    pub fn column_names(&self) -> Vec<&'static str> {
        R::SCHEMA.iter().map(|(name, _)| *name).collect()
    }
}

impl<R> Default for Table<R> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<R> From<Vec<R>> for Table<R> {
    fn from(rows: Vec<R>) -> Self {
        Self::new(rows)
    }
}

impl<R> FromIterator<R> for Table<R> {
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a, R> IntoIterator for &'a Table<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConvertedPrice;

    fn make_row(ts: i64, id: i64) -> ConvertedPrice {
        ConvertedPrice {
            timestamp: ts,
            security_id: id,
            price: 1.0,
            ccy_pair: "EURUSD".to_string(),
            new_price: None,
        }
    }

    #[test]
    fn test_filter_returns_new_table() {
        let table = Table::new(vec![make_row(3, 1), make_row(1, 2), make_row(2, 3)]);
        let filtered = table.filter(|r| r.timestamp >= 2);

        assert_eq!(filtered.len(), 2);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_sort_is_stable() {
        let table = Table::new(vec![make_row(2, 1), make_row(1, 2), make_row(2, 3)]);
        let sorted = table.sorted_by_key(|r| r.timestamp);
        let ids: Vec<i64> = sorted.iter().map(|r| r.security_id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_concat_and_columns() {
        let a = Table::new(vec![make_row(1, 1)]);
        let b = Table::new(vec![make_row(2, 2)]);
        let all = a.concat(&b);

        assert_eq!(all.len(), 2);
        assert_eq!(all.rows()[1].security_id, 2);
        assert_eq!(all.column_names()[4], "new_price");
        assert_eq!(all.rows()[0].cells().len(), ConvertedPrice::SCHEMA.len());
    }
}
