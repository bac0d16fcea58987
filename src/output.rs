//! Output formatting module for billtag
//!
//! This module provides formatters for displaying reports in different formats:
//! - Table format for human-readable terminal output
//! - JSON format for machine-readable output and integration with other tools
//!
//! Formatters never compute anything: every subtotal comes straight from the
//! [`CostReport`] buckets.
//!
//! # Examples
//!
//! ```
//! use billtag::output::get_formatter;
//! use billtag::aggregation::Aggregator;
//!
//! let report = Aggregator::aggregate(&[]);
//!
//! // Get table formatter for human-readable output
//! let formatter = get_formatter(false);
//! println!("{}", formatter.format_summary(&report));
//!
//! // Get JSON formatter for machine-readable output
//! let json_formatter = get_formatter(true);
//! println!("{}", json_formatter.format_summary(&report));
//! ```

use crate::aggregation_types::{
    CostReport, LiveStatus, OwnerBucket, Totals, UntaggedOverview, UntaggedRow,
};
use crate::provider::{Resource, linked_owner_tags};
use crate::resolver::ResourceTagTable;
use crate::types::{OwnerTag, ResourceId};
use prettytable::{Cell, Row, Table, format, row};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use tracing::error;

/// Trait for output formatters
///
/// Implementations can provide different output formats (table, JSON, ...).
pub trait ReportFormatter {
    /// Format the cross-owner summary
    fn format_summary(&self, report: &CostReport) -> String;

    /// Format the full breakdown of one owner
    fn format_owner(&self, owner: &OwnerBucket) -> String;

    /// Format the untagged overview
    fn format_untagged(&self, overview: &UntaggedOverview) -> String;

    /// Format the resolved tag table
    fn format_tags(&self, table: &ResourceTagTable, ambiguous_only: bool) -> String;

    /// Format an inventory listing
    fn format_inventory(&self, resources: &[Resource]) -> String;
}

/// Table formatter for human-readable output
pub struct TableFormatter;

impl TableFormatter {
    /// Format currency with dollar sign
    fn format_currency(amount: Decimal) -> String {
        format!("${amount:.2}")
    }

    fn format_status(status: Option<LiveStatus>) -> &'static str {
        status.map(|s| s.label()).unwrap_or("")
    }

    fn new_table() -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table
    }

    fn untagged_section(title: &str, key_title: &str, rows: &[UntaggedRow]) -> String {
        let with_status = rows.iter().any(|r| r.status.is_some());
        let mut table = Self::new_table();
        if with_status {
            table.set_titles(row![b -> "Product", b -> key_title, b -> "Total", b -> "Status"]);
        } else {
            table.set_titles(row![b -> "Product", b -> key_title, b -> "Total"]);
        }

        for r in rows {
            let key = if r.key.is_empty() { "(none)" } else { r.key.as_str() };
            if with_status {
                table.add_row(row![
                    r.product,
                    key,
                    r -> Self::format_currency(r.total),
                    Self::format_status(r.status)
                ]);
            } else {
                table.add_row(row![r.product, key, r -> Self::format_currency(r.total)]);
            }
        }

        format!("=== {title} ===\n{table}")
    }
}

impl ReportFormatter for TableFormatter {
    fn format_summary(&self, report: &CostReport) -> String {
        let summaries = report.summaries();
        let totals = Totals::from_summaries(&summaries);

        let mut table = Self::new_table();
        table.set_titles(row![
            b -> "Owner",
            b -> "Non-production",
            b -> "Production",
            b -> "Total"
        ]);

        for summary in &summaries {
            table.add_row(row![
                summary.owner,
                r -> Self::format_currency(summary.non_production),
                r -> Self::format_currency(summary.production),
                r -> Self::format_currency(summary.total)
            ]);
        }

        // Add separator
        table.add_row(Row::new(vec![Cell::new(""); 4]));

        table.add_row(row![
            b -> "TOTAL",
            br -> Self::format_currency(totals.non_production),
            br -> Self::format_currency(totals.production),
            br -> Self::format_currency(totals.total)
        ]);

        table.to_string()
    }

    fn format_owner(&self, owner: &OwnerBucket) -> String {
        let mut output = format!("=== {} ===\n", owner.label());

        let mut table = Self::new_table();
        table.set_titles(row![
            b -> "Resource",
            b -> "Zone",
            b -> "Operation",
            b -> "Usage Type",
            b -> "Production",
            b -> "Cost",
            b -> "Status"
        ]);

        for bucket in &owner.production {
            for resource in &bucket.resources {
                for usage in &resource.usage_types {
                    table.add_row(row![
                        resource.resource_id,
                        usage.availability_zone,
                        usage.operation,
                        usage.usage_type,
                        usage.production_flag,
                        r -> Self::format_currency(usage.subtotal),
                        Self::format_status(resource.status)
                    ]);
                }
                table.add_row(row![
                    i -> format!("Subtotal for resource {}", resource.resource_id),
                    "", "", "", "",
                    ir -> Self::format_currency(resource.subtotal),
                    ""
                ]);
            }
            table.add_row(row![
                b -> format!("Subtotal for {}", bucket.flag.label()),
                "", "", "", "",
                br -> Self::format_currency(bucket.subtotal),
                ""
            ]);
        }

        table.add_row(row![
            b -> format!("TOTAL FOR {}", owner.label()),
            "", "", "", "",
            br -> Self::format_currency(owner.subtotal),
            ""
        ]);

        output.push_str(&table.to_string());
        output
    }

    fn format_untagged(&self, overview: &UntaggedOverview) -> String {
        let mut output = String::new();
        output.push_str(&Self::untagged_section(
            "Untagged costs by resource",
            "Resource",
            &overview.by_resource,
        ));
        output.push('\n');
        output.push_str(&Self::untagged_section(
            "Untagged costs by operation",
            "Operation",
            &overview.by_operation,
        ));
        output.push('\n');
        output.push_str(&Self::untagged_section(
            "Untagged costs by usage type",
            "Usage Type",
            &overview.by_usage_type,
        ));
        output.push_str(&format!(
            "\nTotal untagged: {}\n",
            Self::format_currency(overview.total)
        ));
        output
    }

    fn format_tags(&self, table: &ResourceTagTable, ambiguous_only: bool) -> String {
        let mut out = Self::new_table();
        out.set_titles(row![
            b -> "Resource",
            b -> "Owner",
            b -> "Production",
            b -> "Ordinal",
            b -> "Owners Seen"
        ]);

        for (id, state) in table.iter() {
            if ambiguous_only && !state.is_ambiguous() {
                continue;
            }
            let owners: Vec<&str> = state.distinct_owners.iter().map(|o| o.as_str()).collect();
            out.add_row(row![
                id,
                state.owner_tag,
                state.production_flag,
                r -> state.recency_ordinal.value(),
                owners.join(", ")
            ]);
        }

        out.to_string()
    }

    fn format_inventory(&self, resources: &[Resource]) -> String {
        let mut table = Self::new_table();
        table.set_titles(row![
            b -> "Region",
            b -> "Resource",
            b -> "Kind",
            b -> "Owner",
            b -> "Production",
            b -> "Linked Owners",
            b -> "Created"
        ]);

        let linked = linked_owner_tags(resources);
        for resource in resources {
            let created = resource
                .created_at
                .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            let linked_owners = linked_labels(&linked, &resource.id).join(", ");
            table.add_row(row![
                resource.region,
                resource.id,
                resource.kind,
                resource.owner_tag(),
                resource.production_flag(),
                linked_owners,
                created
            ]);
        }

        table.to_string()
    }
}

/// JSON formatter for machine-readable output
///
/// Costs are emitted as decimal strings so no precision is lost.
pub struct JsonFormatter;

impl JsonFormatter {
    /// Pretty-print `value`, or an `{"error": ...}` object if it cannot be serialized
    fn to_pretty<T: Serialize + ?Sized>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| {
            error!("Failed to serialize JSON output: {}", e);
            json!({ "error": e.to_string() }).to_string()
        })
    }
}

impl ReportFormatter for JsonFormatter {
    fn format_summary(&self, report: &CostReport) -> String {
        let summaries = report.summaries();
        let totals = Totals::from_summaries(&summaries);
        Self::to_pretty(&json!({
            "owners": summaries,
            "totals": totals,
        }))
    }

    fn format_owner(&self, owner: &OwnerBucket) -> String {
        Self::to_pretty(owner)
    }

    fn format_untagged(&self, overview: &UntaggedOverview) -> String {
        Self::to_pretty(overview)
    }

    fn format_tags(&self, table: &ResourceTagTable, ambiguous_only: bool) -> String {
        let resources: Vec<serde_json::Value> = table
            .iter()
            .filter(|(_, state)| !ambiguous_only || state.is_ambiguous())
            .map(|(id, state)| {
                json!({
                    "resource_id": id,
                    "owner_tag": state.owner_tag,
                    "production_flag": state.production_flag,
                    "recency_ordinal": state.recency_ordinal,
                    "distinct_owners": state.distinct_owners,
                })
            })
            .collect();
        Self::to_pretty(&json!({ "resources": resources }))
    }

    fn format_inventory(&self, resources: &[Resource]) -> String {
        let linked = linked_owner_tags(resources);
        let resources: Vec<serde_json::Value> = resources
            .iter()
            .map(|r| {
                json!({
                    "id": r.id,
                    "kind": r.kind,
                    "region": r.region,
                    "owner_tag": r.owner_tag(),
                    "production_flag": r.production_flag(),
                    "linked": r.linked,
                    "linked_owners": linked_labels(&linked, &r.id),
                    "created_at": r.created_at,
                    "details": r.details,
                })
            })
            .collect();
        Self::to_pretty(&json!({ "resources": resources }))
    }
}

fn linked_labels<'a>(
    linked: &'a HashMap<ResourceId, BTreeSet<OwnerTag>>,
    id: &ResourceId,
) -> Vec<&'a str> {
    linked
        .get(id)
        .map(|owners| owners.iter().map(OwnerTag::label).collect())
        .unwrap_or_default()
}

/// Get the appropriate formatter based on output format preference
///
/// # Examples
///
/// ```
/// use billtag::output::get_formatter;
/// use billtag::aggregation::Aggregator;
///
/// let formatter = get_formatter(true);
/// let output = formatter.format_untagged(&Aggregator::untagged(&[]));
/// assert!(output.contains("by_resource"));
/// ```
pub fn get_formatter(json: bool) -> Box<dyn ReportFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(TableFormatter)
    }
}
