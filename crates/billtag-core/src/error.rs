//! Error types for billtag
//!
//! This module defines the error types used throughout the billtag library.
//! All errors are derived from `thiserror` for convenient error handling
//! and automatic `From` implementations.
//!
//! # Example
//!
//! ```
//! use billtag_core::error::{BilltagError, Result};
//!
//! fn example_function() -> Result<()> {
//!     // This will automatically convert io::Error to BilltagError
//!     let _file = std::fs::read_to_string("nonexistent.csv")?;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for billtag operations
///
/// `MalformedInput` is fatal for a run: no partial report is produced from
/// an export with a missing or unparseable cost. `Provider` errors come from
/// the resource inventory and are normally recovered as an empty result.
#[derive(Error, Debug)]
pub enum BilltagError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// A billing row is missing a required field or has an unparseable value
    #[error("Malformed input at row {row}: {reason}")]
    MalformedInput {
        /// 1-based data row number in the export (header excluded)
        row: usize,
        /// What was wrong with the row
        reason: String,
    },

    /// Resource provider failure
    #[error("Provider error: {0}")]
    Provider(String),

    /// No billing export could be found for the requested month
    #[error("No billing export for {month} found in {dir}")]
    NoExportFound {
        /// Directory that was searched
        dir: PathBuf,
        /// Requested month in YYYY-MM format
        month: String,
    },

    /// Invalid date format
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl BilltagError {
    /// Shorthand for a [`BilltagError::MalformedInput`]
    pub fn malformed(row: usize, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            row,
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for Results in billtag
///
/// # Example
///
/// ```
/// use billtag_core::Result;
///
/// fn process_data() -> Result<String> {
///     Ok("Processed successfully".to_string())
/// }
/// ```
pub type Result<T> = std::result::Result<T, BilltagError>;
