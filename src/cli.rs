//! CLI interface for billtag
//!
//! This module defines the command-line interface using clap. Every flag that
//! selects input or output is global, so it can be given before or after the
//! subcommand. When no subcommand is given, `summary` runs.
//!
//! # Example
//!
//! ```bash
//! # Summary for the current month from the default data directory
//! billtag
//!
//! # Write all CSV reports for June 2024
//! billtag --month 2024-06 report --out-dir reports/
//!
//! # One owner, first week only, as JSON
//! billtag owner alice --until 2024-06-07 --json
//!
//! # Resources whose owner tag changed during the month
//! billtag tags --ambiguous
//! ```

use crate::error::{BilltagError, Result};
use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Resolve ownership tags and report costs from a monthly billing export
#[derive(Parser, Debug, Clone)]
#[command(name = "billtag")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Show informational output (default is quiet mode with only warnings and errors)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Billing export file (overrides --data-dir/--month lookup)
    #[arg(long, short = 'e', env = "BILLTAG_EXPORT", global = true)]
    pub export: Option<PathBuf>,

    /// Directory searched for `*-YYYY-MM.csv` exports
    #[arg(long, env = "BILLTAG_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Billing month (YYYY-MM), defaults to the current month
    #[arg(long, short = 'm', global = true)]
    pub month: Option<String>,

    /// Resource inventory JSON used to annotate live resources
    #[arg(long, env = "BILLTAG_INVENTORY_PATH", global = true)]
    pub inventory: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Normalize rows in parallel
    #[arg(long, global = true)]
    pub parallel: bool,

    /// Only report usage on or after this date (YYYY-MM-DD)
    #[arg(long, global = true)]
    pub since: Option<String>,

    /// Only report usage on or before this date (YYYY-MM-DD)
    #[arg(long, global = true)]
    pub until: Option<String>,

    /// Only report charges for this product name
    #[arg(long, short = 'p', global = true)]
    pub product: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Write per-owner, summary and untagged CSV reports
    Report {
        /// Output directory
        #[arg(long, short = 'o', default_value = "reports")]
        out_dir: PathBuf,

        /// Also list every line item beneath its usage type row
        #[arg(long, short = 'd')]
        detailed: bool,
    },

    /// Show non-production, production and total cost per owner
    Summary,

    /// Show the full breakdown for one owner (`untagged` for untagged costs)
    Owner {
        /// Owner tag value (case-insensitive)
        name: String,
    },

    /// Show untagged costs by resource, operation and usage type
    Untagged,

    /// Show the resolved tag of every billed resource
    Tags {
        /// Only resources that carried more than one owner tag
        #[arg(long)]
        ambiguous: bool,
    },

    /// List resources in the inventory with their tags
    Inventory,
}

/// Parse date string in YYYY-MM-DD format
///
/// # Examples
///
/// ```
/// use billtag::cli::parse_date_filter;
/// use chrono::Datelike;
///
/// let date = parse_date_filter("2024-06-15").unwrap();
/// assert_eq!(date.day(), 15);
/// assert!(parse_date_filter("15/06/2024").is_err());
/// ```
pub fn parse_date_filter(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|_| {
        BilltagError::InvalidDate(format!(
            "Invalid date format '{date_str}', expected YYYY-MM-DD"
        ))
    })
}

/// Parse a billing month (YYYY-MM) into its first day
///
/// # Examples
///
/// ```
/// use billtag::cli::parse_month;
/// use chrono::Datelike;
///
/// let month = parse_month("2024-06").unwrap();
/// assert_eq!((month.year(), month.month(), month.day()), (2024, 6, 1));
/// ```
pub fn parse_month(month_str: &str) -> Result<NaiveDate> {
    let parts: Vec<&str> = month_str.trim().split('-').collect();
    if parts.len() != 2 || parts[0].len() != 4 || parts[1].len() != 2 {
        return Err(BilltagError::InvalidDate(format!(
            "Invalid month format '{month_str}', expected YYYY-MM"
        )));
    }

    let year = parts[0]
        .parse::<i32>()
        .map_err(|_| BilltagError::InvalidDate(format!("Invalid year in '{month_str}'")))?;
    let month = parts[1]
        .parse::<u32>()
        .map_err(|_| BilltagError::InvalidDate(format!("Invalid month in '{month_str}'")))?;

    if !(1..=12).contains(&month) {
        return Err(BilltagError::InvalidDate(format!(
            "Month must be between 1-12, got {month}"
        )));
    }

    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| BilltagError::InvalidDate(format!("Invalid month: {month_str}")))
}

/// Date the report titles run up to
///
/// `today` for the current month, the last day of the month for past months.
pub fn report_as_of(month_start: NaiveDate, today: NaiveDate) -> NaiveDate {
    if (today.year(), today.month()) == (month_start.year(), month_start.month()) {
        return today;
    }
    month_start
        .checked_add_months(chrono::Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(month_start)
}
