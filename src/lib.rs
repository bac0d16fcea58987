//! billtag - Resolve ownership tags and report costs from a monthly billing export
//!
//! This library provides functionality to:
//! - Locate and parse the monthly line-item CSV export
//! - Normalize billable rows and canonicalize their owner/production tags
//! - Back-fill each resource's best known tags over the whole month
//! - Aggregate costs owner → production flag → resource → usage type
//! - Write per-owner, summary and untagged CSV reports
//!
//! # Examples
//!
//! ```no_run
//! use billtag::{data_loader::ExportLoader, pipeline::Pipeline, report_writer::ReportWriter};
//! use chrono::Local;
//!
//! #[tokio::main]
//! async fn main() -> billtag::Result<()> {
//!     let data_dir = ExportLoader::default_data_dir()?;
//!     let rows = ExportLoader::locate(&data_dir, "2024-06")?.load().await?;
//!
//!     let output = Pipeline::new().run(rows)?;
//!     ReportWriter::new("reports", Local::now().date_naive()).write_all(&output.report)?;
//!     Ok(())
//! }
//! ```

pub mod aggregation;
pub mod cli;
pub mod data_loader;
pub mod filters;
pub mod normalizer;
pub mod output;
pub mod pipeline;
pub mod report_writer;
pub mod resolver;

pub use billtag_core::{aggregation_types, error, provider, types};

// Re-export commonly used types
pub use error::{BilltagError, Result};
pub use types::{LineItem, OwnerTag, ProductionFlag, RawLineItem, RecencyOrdinal, ResourceId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
