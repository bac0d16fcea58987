//! Core types, traits, and utilities for billtag
//!
//! This crate provides the foundational value types, error handling,
//! report structures, and the resource provider trait used by all other
//! billtag crates.

pub mod aggregation_types;
pub mod error;
pub mod provider;
pub mod types;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use error::{BilltagError, Result};
pub use types::{LineItem, OwnerTag, ProductionFlag, RawLineItem, RecencyOrdinal, ResourceId};
