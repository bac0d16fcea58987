//! Normalizer turning raw export rows into billable line items
//!
//! Normalization is the only place where a row can be rejected outright:
//!
//! - every row must carry a numeric `Cost`, otherwise the whole run fails
//!   with [`BilltagError::MalformedInput`]
//! - only `LineItem` records with a non-zero cost are retained
//! - rows with neither operation nor usage type get a synthesized
//!   classification derived from the product name
//!
//! The retained items are then sorted on their full content, which makes the
//! downstream "first seen" rules independent of the order rows appear in the
//! export.

use crate::error::{BilltagError, Result};
use crate::types::{LineItem, OwnerTag, ProductionFlag, RawLineItem, ResourceId, parse_usage_start};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

/// Record type of billable rows
pub const LINE_ITEM_RECORD_TYPE: &str = "LineItem";

/// Prefix of synthesized operation/usage type values
pub const SYNTHETIC_PREFIX: &str = "ProductName";

/// Converts raw export rows into sorted [`LineItem`]s
#[derive(Debug, Default)]
pub struct Normalizer {
    show_progress: bool,
}

impl Normalizer {
    /// Create a new Normalizer
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the progress bar
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Normalize rows sequentially
    ///
    /// Fails on the first row (in export order) with a missing or
    /// non-numeric cost.
    pub fn normalize(&self, rows: Vec<RawLineItem>) -> Result<Vec<LineItem>> {
        let total = rows.len();
        let progress = self.progress_bar(total as u64);

        let mut items = Vec::with_capacity(total);
        let mut magnitude = Decimal::ZERO;
        for (index, row) in rows.into_iter().enumerate() {
            if let Some(item) = normalize_row(index + 1, row)? {
                magnitude = add_magnitude(magnitude, index + 1, item.cost)?;
                items.push(item);
            }
            if let Some(ref pb) = progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        Ok(Self::finish(items, total))
    }

    /// Normalize rows on the rayon thread pool
    ///
    /// Produces the same items as [`Normalizer::normalize`]. When several rows
    /// are malformed, which one gets reported is unspecified.
    pub fn normalize_parallel(&self, rows: Vec<RawLineItem>) -> Result<Vec<LineItem>> {
        let total = rows.len();
        let normalized: Vec<Option<LineItem>> = rows
            .into_par_iter()
            .enumerate()
            .map(|(index, row)| normalize_row(index + 1, row))
            .collect::<Result<_>>()?;

        let mut magnitude = Decimal::ZERO;
        let mut items = Vec::with_capacity(normalized.len());
        for (index, item) in normalized.into_iter().enumerate() {
            if let Some(item) = item {
                magnitude = add_magnitude(magnitude, index + 1, item.cost)?;
                items.push(item);
            }
        }

        Ok(Self::finish(items, total))
    }

    fn finish(mut items: Vec<LineItem>, total: usize) -> Vec<LineItem> {
        sort_line_items(&mut items);
        debug!(
            "Normalized {} rows into {} billable line items",
            total,
            items.len()
        );
        items
    }

    fn progress_bar(&self, len: u64) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = ProgressBar::new(len);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{msg} [{bar:40.cyan/blue}] {pos}/{len} rows")
        {
            pb.set_style(style);
        }
        pb.set_message("Normalizing export");
        Some(pb)
    }
}

/// Normalize a single row
///
/// `row_number` is the 1-based data row number used in error messages.
/// Returns `Ok(None)` for rows that are valid but not billable.
pub fn normalize_row(row_number: usize, row: RawLineItem) -> Result<Option<LineItem>> {
    let cost = parse_cost(row_number, row.cost.as_deref())?;

    if row.record_type.as_deref().map(str::trim) != Some(LINE_ITEM_RECORD_TYPE) || cost.is_zero() {
        return Ok(None);
    }

    let product_name = row.product_name.unwrap_or_default();
    let mut operation = row.operation.unwrap_or_default();
    let mut usage_type = row.usage_type.unwrap_or_default();
    if operation.is_empty() && usage_type.is_empty() {
        operation = format!("{SYNTHETIC_PREFIX}{product_name}");
        usage_type = operation.clone();
    }

    Ok(Some(LineItem {
        resource_id: ResourceId::new(row.resource_id.unwrap_or_default()),
        owner_tag: OwnerTag::new(row.owner_tag.unwrap_or_default()),
        production_flag: ProductionFlag::new(row.production_flag.unwrap_or_default()),
        operation,
        usage_type,
        product_name,
        cost,
        availability_zone: row.availability_zone.unwrap_or_default(),
        usage_start: row.usage_start.as_deref().and_then(parse_usage_start),
    }))
}

/// Parse a `Cost` value, accepting plain and scientific notation
pub fn parse_cost(row_number: usize, raw: Option<&str>) -> Result<Decimal> {
    let raw = match raw.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => return Err(BilltagError::malformed(row_number, "missing Cost field")),
    };

    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|_| BilltagError::malformed(row_number, format!("non-numeric Cost {raw:?}")))
}

/// Add `cost` to the running sum of absolute retained costs
///
/// Every subtotal built from the retained items is bounded by this sum, so
/// rejecting the row that overflows it keeps aggregation free of overflow.
fn add_magnitude(sum: Decimal, row_number: usize, cost: Decimal) -> Result<Decimal> {
    sum.checked_add(cost.abs()).ok_or_else(|| {
        BilltagError::malformed(row_number, format!("Cost {cost} overflows the month's total"))
    })
}

/// Sort line items on their full content
pub fn sort_line_items(items: &mut [LineItem]) {
    items.sort_by(|a, b| {
        (
            &a.resource_id,
            &a.owner_tag,
            &a.production_flag,
            &a.operation,
            &a.usage_type,
            &a.cost,
            &a.usage_start,
            &a.availability_zone,
            &a.product_name,
        )
            .cmp(&(
                &b.resource_id,
                &b.owner_tag,
                &b.production_flag,
                &b.operation,
                &b.usage_type,
                &b.cost,
                &b.usage_start,
                &b.availability_zone,
                &b.product_name,
            ))
    });
}
