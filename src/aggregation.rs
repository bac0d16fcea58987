//! Aggregation module for building cost reports from resolved line items
//!
//! Line items are grouped owner → production flag → resource → usage type.
//! Every level carries its own subtotal, so the report writer and the
//! formatters only serialize what they are given.
//!
//! Grouping goes through nested `BTreeMap`s, which fixes the order of every
//! bucket list independently of input order. Subtotals are exact `Decimal`
//! sums, so a parent subtotal always equals the sum of its children. The
//! normalizer rejects exports whose absolute costs sum past `Decimal::MAX`,
//! which bounds every subtotal built here.
//!
//! # Cloning Strategy
//!
//! - **Line items**: the aggregator takes `&[LineItem]` and clones each item
//!   once into its usage-type bucket. Reports are built once per run and the
//!   detail rows must outlive the input slice when the pipeline hands its
//!   output around.
//! - **Keys**: owner tags, flags and resource ids are cloned into the maps.
//!   They are short strings and there are far fewer keys than line items.
//!
//! # Examples
//!
//! ```
//! use billtag::aggregation::Aggregator;
//! use billtag::types::{LineItem, OwnerTag, ProductionFlag, ResourceId};
//! use rust_decimal::Decimal;
//!
//! let items = vec![LineItem {
//!     resource_id: ResourceId::new("i-1"),
//!     owner_tag: OwnerTag::new("alice"),
//!     production_flag: ProductionFlag::new("yes"),
//!     operation: "RunInstances".into(),
//!     usage_type: "BoxUsage:t2.micro".into(),
//!     product_name: "Amazon EC2".into(),
//!     cost: Decimal::new(1250, 2),
//!     availability_zone: "us-east-1a".into(),
//!     usage_start: None,
//! }];
//!
//! let report = Aggregator::aggregate(&items);
//! assert_eq!(report.grand_total, Decimal::new(1250, 2));
//! assert_eq!(report.summaries()[0].production, Decimal::new(1250, 2));
//! ```

use crate::aggregation_types::{
    CostReport, LiveStatus, OwnerBucket, ProductionBucket, ResourceBucket, UntaggedOverview,
    UntaggedRow, UsageTypeBucket,
};
use crate::types::{LineItem, OwnerTag, ProductionFlag, ResourceId};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

type ResourceMap = BTreeMap<ResourceId, BTreeMap<String, UsageTypeAccumulator>>;
type OwnerMap = BTreeMap<OwnerTag, BTreeMap<ProductionFlag, ResourceMap>>;

/// Accumulator for one resource + usage type group
struct UsageTypeAccumulator {
    operation: Option<String>,
    zones: BTreeSet<String>,
    subtotal: Decimal,
    items: Vec<LineItem>,
}

impl UsageTypeAccumulator {
    fn new() -> Self {
        Self {
            operation: None,
            zones: BTreeSet::new(),
            subtotal: Decimal::ZERO,
            items: Vec::new(),
        }
    }

    fn add_item(&mut self, item: &LineItem) {
        if self.operation.is_none() {
            self.operation = Some(item.operation.clone());
        }
        if !self.zones.contains(&item.availability_zone) {
            self.zones.insert(item.availability_zone.clone());
        }
        self.subtotal += item.cost;
        self.items.push(item.clone());
    }

    fn into_bucket(self, usage_type: String, production_flag: ProductionFlag) -> UsageTypeBucket {
        UsageTypeBucket {
            usage_type,
            operation: self.operation.unwrap_or_default(),
            availability_zone: select_zone(self.zones.iter().map(String::as_str)),
            production_flag,
            subtotal: self.subtotal,
            items: self.items,
        }
    }
}

/// Accumulator for one untagged overview row
#[derive(Default)]
struct UntaggedAccumulator {
    products: BTreeSet<String>,
    total: Decimal,
}

impl UntaggedAccumulator {
    fn add_item(&mut self, item: &LineItem) {
        if !self.products.contains(&item.product_name) {
            self.products.insert(item.product_name.clone());
        }
        self.total += item.cost;
    }

    fn into_row(self, key: String) -> UntaggedRow {
        let product = if self.products.len() == 1 {
            self.products.into_iter().next().unwrap_or_default()
        } else {
            let names: Vec<String> = self.products.into_iter().collect();
            format!("[{}]", names.join(", "))
        };
        UntaggedRow {
            product,
            key,
            total: self.total,
            status: None,
        }
    }
}

/// Main aggregation engine
pub struct Aggregator;

impl Aggregator {
    /// Build the full cost report for a resolved set of line items
    pub fn aggregate(items: &[LineItem]) -> CostReport {
        let mut owners: OwnerMap = BTreeMap::new();

        for item in items {
            owners
                .entry(item.owner_tag.clone())
                .or_default()
                .entry(item.production_flag.clone())
                .or_default()
                .entry(item.resource_id.clone())
                .or_default()
                .entry(item.usage_type.clone())
                .or_insert_with(UsageTypeAccumulator::new)
                .add_item(item);
        }

        let owners: Vec<OwnerBucket> = owners
            .into_iter()
            .map(|(owner, flags)| Self::owner_bucket(owner, flags))
            .collect();
        let grand_total = owners.iter().map(|o| o.subtotal).sum();

        debug!(
            "Aggregated {} line items into {} owner buckets",
            items.len(),
            owners.len()
        );

        CostReport {
            owners,
            grand_total,
            untagged: Self::untagged(items),
        }
    }

    fn owner_bucket(owner: OwnerTag, flags: BTreeMap<ProductionFlag, ResourceMap>) -> OwnerBucket {
        let production: Vec<ProductionBucket> = flags
            .into_iter()
            .map(|(flag, resources)| {
                let resources: Vec<ResourceBucket> = resources
                    .into_iter()
                    .map(|(resource_id, usage_types)| {
                        let usage_types: Vec<UsageTypeBucket> = usage_types
                            .into_iter()
                            .map(|(usage_type, acc)| acc.into_bucket(usage_type, flag.clone()))
                            .collect();
                        ResourceBucket {
                            resource_id,
                            subtotal: usage_types.iter().map(|u| u.subtotal).sum(),
                            usage_types,
                            status: None,
                        }
                    })
                    .collect();
                ProductionBucket {
                    subtotal: resources.iter().map(|r| r.subtotal).sum(),
                    flag,
                    resources,
                }
            })
            .collect();

        OwnerBucket {
            subtotal: production.iter().map(|p| p.subtotal).sum(),
            owner,
            production,
        }
    }

    /// Group line items with an empty owner three independent ways
    ///
    /// Each section is sorted descending by `(product, total)`; rows that
    /// tie on both are ordered by key ascending.
    pub fn untagged(items: &[LineItem]) -> UntaggedOverview {
        let mut by_resource: BTreeMap<String, UntaggedAccumulator> = BTreeMap::new();
        let mut by_operation: BTreeMap<String, UntaggedAccumulator> = BTreeMap::new();
        let mut by_usage_type: BTreeMap<String, UntaggedAccumulator> = BTreeMap::new();
        let mut total = Decimal::ZERO;

        for item in items.iter().filter(|i| i.owner_tag.is_empty()) {
            by_resource
                .entry(item.resource_id.to_string())
                .or_default()
                .add_item(item);
            by_operation
                .entry(item.operation.clone())
                .or_default()
                .add_item(item);
            by_usage_type
                .entry(item.usage_type.clone())
                .or_default()
                .add_item(item);
            total += item.cost;
        }

        UntaggedOverview {
            by_resource: sorted_rows(by_resource),
            by_operation: sorted_rows(by_operation),
            by_usage_type: sorted_rows(by_usage_type),
            total,
        }
    }
}

fn sorted_rows(groups: BTreeMap<String, UntaggedAccumulator>) -> Vec<UntaggedRow> {
    let mut rows: Vec<UntaggedRow> = groups
        .into_iter()
        .map(|(key, acc)| acc.into_row(key))
        .collect();
    rows.sort_by(|a, b| {
        (&b.product, &b.total)
            .cmp(&(&a.product, &a.total))
            .then_with(|| a.key.cmp(&b.key))
    });
    rows
}

/// Pick the zone label for a resource + usage type group
///
/// Takes the distinct zones in ascending order, reverses them and keeps the
/// first, i.e. the lexicographically greatest zone (which is `""` only when
/// no member carried a zone). This is a best-effort label: when a resource
/// spans zones under one usage type it does not tell which zone the cost
/// came from.
pub fn select_zone<'a>(zones: impl IntoIterator<Item = &'a str>) -> String {
    let distinct: BTreeSet<&str> = zones.into_iter().collect();
    distinct
        .into_iter()
        .rev()
        .next()
        .map(str::to_string)
        .unwrap_or_default()
}

/// Mark each billed resource as live or not listed in the inventory
///
/// Only the `status` fields change. Account-level buckets (empty resource
/// id) are left without a status.
pub fn annotate_live_status(report: &mut CostReport, live_ids: &HashSet<ResourceId>) {
    let status_of = |id: &ResourceId| {
        if id.is_empty() {
            None
        } else if live_ids.contains(id) {
            Some(LiveStatus::ConfirmedLive)
        } else {
            Some(LiveStatus::NotListed)
        }
    };

    for resource in report
        .owners
        .iter_mut()
        .flat_map(|o| o.production.iter_mut())
        .flat_map(|p| p.resources.iter_mut())
    {
        resource.status = status_of(&resource.resource_id);
    }

    for row in report.untagged.by_resource.iter_mut() {
        row.status = status_of(&ResourceId::new(row.key.as_str()));
    }
}
