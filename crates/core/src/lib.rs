//! Core types and configuration for the ratevol system.
//!
//! This crate provides shared types used across all other crates:
//! - Typed rows for quotes, spot rates and observations
//! - Immutable tables
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod table;
pub mod types;

pub use config::{Config, ConversionConfig, VolatilityConfig};
pub use error::{Error, Result};
pub use table::{Cell, ColumnType, Row, Table};
pub use types::*;
