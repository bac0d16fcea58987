//! Aggregation data types for billtag
//!
//! Pure data structures produced by the aggregator and consumed by the
//! formatters and the report writer. Buckets nest
//! owner → production flag → resource → usage type, and every level carries
//! its own subtotal so consumers never have to re-add anything.

use crate::types::{LineItem, OwnerTag, ProductionFlag, ResourceId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Whether a billed resource still shows up in the resource inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveStatus {
    /// The inventory lists the resource
    ConfirmedLive,
    /// The inventory was consulted and does not list the resource
    NotListed,
}

impl LiveStatus {
    /// Text used in report columns
    pub fn label(&self) -> &'static str {
        match self {
            Self::ConfirmedLive => "confirmed live",
            Self::NotListed => "not listed",
        }
    }
}

/// Costs of one resource under one usage type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageTypeBucket {
    /// Usage type shared by all members
    pub usage_type: String,
    /// Operation of the first member
    pub operation: String,
    /// Best-effort zone label, see `select_zone` in the aggregator
    pub availability_zone: String,
    /// Production flag shared by all members
    pub production_flag: ProductionFlag,
    /// Sum of member costs
    pub subtotal: Decimal,
    /// Member line items, in pipeline order
    pub items: Vec<LineItem>,
}

/// Costs of one resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceBucket {
    /// Resource identifier (empty for account-level charges)
    pub resource_id: ResourceId,
    /// Usage type buckets sorted by usage type
    pub usage_types: Vec<UsageTypeBucket>,
    /// Sum of usage type subtotals
    pub subtotal: Decimal,
    /// Inventory status; `None` when no inventory was consulted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<LiveStatus>,
}

/// Costs of one owner under one production flag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionBucket {
    /// Production flag shared by all members
    pub flag: ProductionFlag,
    /// Resource buckets sorted by resource id
    pub resources: Vec<ResourceBucket>,
    /// Sum of resource subtotals
    pub subtotal: Decimal,
}

/// All costs attributed to one owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerBucket {
    /// Resolved owner tag (empty for untagged costs)
    pub owner: OwnerTag,
    /// Production buckets sorted by canonical flag value
    pub production: Vec<ProductionBucket>,
    /// Sum of production subtotals
    pub subtotal: Decimal,
}

impl OwnerBucket {
    /// Printable owner name, `untagged` for the empty owner
    pub fn label(&self) -> &str {
        self.owner.label()
    }

    /// Sum of buckets whose flag marks production traffic
    pub fn production_subtotal(&self) -> Decimal {
        self.production
            .iter()
            .filter(|bucket| bucket.flag.is_production())
            .map(|bucket| bucket.subtotal)
            .sum()
    }

    /// Everything that is not production
    pub fn non_production_subtotal(&self) -> Decimal {
        self.subtotal - self.production_subtotal()
    }

    /// Summary row for the cross-owner report
    pub fn summary(&self) -> OwnerSummary {
        let production = self.production_subtotal();
        OwnerSummary {
            owner: self.label().to_string(),
            non_production: self.subtotal - production,
            production,
            total: self.subtotal,
        }
    }

    /// Number of line items under this owner
    pub fn line_item_count(&self) -> usize {
        self.production
            .iter()
            .flat_map(|p| &p.resources)
            .flat_map(|r| &r.usage_types)
            .map(|u| u.items.len())
            .sum()
    }
}

/// One row of the cross-owner summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerSummary {
    /// Owner label
    pub owner: String,
    /// Non-production subtotal
    pub non_production: Decimal,
    /// Production subtotal
    pub production: Decimal,
    /// Owner total
    pub total: Decimal,
}

/// One row of an untagged overview section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UntaggedRow {
    /// Product name, or a bracketed list when the group spans products
    pub product: String,
    /// Grouping key (resource id, operation, or usage type)
    pub key: String,
    /// Sum of member costs
    pub total: Decimal,
    /// Inventory status (by-resource section only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<LiveStatus>,
}

/// Untagged costs grouped three independent ways
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UntaggedOverview {
    /// Grouped by resource id
    pub by_resource: Vec<UntaggedRow>,
    /// Grouped by operation
    pub by_operation: Vec<UntaggedRow>,
    /// Grouped by usage type
    pub by_usage_type: Vec<UntaggedRow>,
    /// Sum of all untagged costs
    pub total: Decimal,
}

/// The full aggregation result for one export
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostReport {
    /// Owner buckets sorted by label
    pub owners: Vec<OwnerBucket>,
    /// Sum of all owner subtotals
    pub grand_total: Decimal,
    /// Untagged overview
    pub untagged: UntaggedOverview,
}

impl CostReport {
    /// Summary row per owner, in owner order
    pub fn summaries(&self) -> Vec<OwnerSummary> {
        self.owners.iter().map(OwnerBucket::summary).collect()
    }

    /// Look up an owner bucket by label
    ///
    /// An exact label match wins, so `untagged` finds the empty owner and
    /// `UNTAGGED` finds an owner actually tagged that way. Otherwise the
    /// label is canonicalized like a tag value, falling back to the empty
    /// owner for any casing of `untagged`.
    pub fn owner(&self, label: &str) -> Option<&OwnerBucket> {
        let label = label.trim();
        if let Some(exact) = self.owners.iter().find(|bucket| bucket.label() == label) {
            return Some(exact);
        }
        let wanted = OwnerTag::new(label);
        self.owners
            .iter()
            .find(|bucket| bucket.owner == wanted)
            .or_else(|| {
                self.owners.iter().find(|bucket| {
                    bucket.owner.is_empty() && bucket.label().eq_ignore_ascii_case(label)
                })
            })
    }

    /// Number of line items across all owners
    pub fn line_item_count(&self) -> usize {
        self.owners.iter().map(OwnerBucket::line_item_count).sum()
    }
}

/// Column totals across summary rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Sum of non-production subtotals
    pub non_production: Decimal,
    /// Sum of production subtotals
    pub production: Decimal,
    /// Grand total
    pub total: Decimal,
}

impl Totals {
    /// Add up the columns of `summaries`
    pub fn from_summaries(summaries: &[OwnerSummary]) -> Self {
        let mut totals = Self::default();
        for summary in summaries {
            totals.non_production += summary.non_production;
            totals.production += summary.production;
            totals.total += summary.total;
        }
        totals
    }
}
