//! Tag resolution for billing line items
//!
//! Resources usually get their owner tag some time after they are created,
//! but the monthly export bills them from the first hour. The resolver
//! repairs this in two strictly sequential phases:
//!
//! 1. [`TagResolver::build`] makes one pass over every line item and records
//!    the best known tags per resource in a [`ResourceTagTable`].
//! 2. [`ResourceTagTable::apply`] back-fills every line item of a known
//!    resource with the resolved tags.
//!
//! The table is a plain value handed from phase 1 to phase 2 and on to the
//! diagnostics output. It is never mutated after `build` returns.
//!
//! # Resolution rules
//!
//! - **Owner**: the non-empty value with the highest recency ordinal
//!   (`day * 24 + hour` of the usage start). Equal ordinals keep the value
//!   seen first. A resource whose stored owner is still empty takes the
//!   first non-empty owner regardless of ordinal.
//! - **Production flag**: the last non-empty value in pass order, without
//!   any recency comparison.
//! - Line items without a resource id are account-level charges and are
//!   left untouched.
//!
//! # Examples
//!
//! ```
//! use billtag::resolver::resolve;
//! use billtag::types::{LineItem, OwnerTag, ProductionFlag, ResourceId, parse_usage_start};
//! use rust_decimal::Decimal;
//!
//! let item = |owner: &str, start: &str| LineItem {
//!     resource_id: ResourceId::new("i-1"),
//!     owner_tag: OwnerTag::new(owner),
//!     production_flag: ProductionFlag::default(),
//!     operation: "RunInstances".into(),
//!     usage_type: "BoxUsage".into(),
//!     product_name: "Amazon EC2".into(),
//!     cost: Decimal::ONE,
//!     availability_zone: String::new(),
//!     usage_start: parse_usage_start(start),
//! };
//!
//! let (items, table) = resolve(vec![
//!     item("", "2024-06-01 00:00:00"),
//!     item("alice", "2024-06-15 12:00:00"),
//! ]);
//! assert!(items.iter().all(|i| i.owner_tag.as_str() == "ALICE"));
//! assert_eq!(table.len(), 1);
//! ```

use crate::types::{LineItem, OwnerTag, ProductionFlag, RecencyOrdinal, ResourceId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::btree_map::Entry;
use tracing::{debug, warn};

/// Best known tags for one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceTagState {
    /// Resolved owner tag (empty if the resource was never tagged)
    pub owner_tag: OwnerTag,
    /// Resolved production flag
    pub production_flag: ProductionFlag,
    /// Ordinal of the observation that set `owner_tag`
    pub recency_ordinal: RecencyOrdinal,
    /// Every distinct non-empty owner observed for the resource
    pub distinct_owners: BTreeSet<OwnerTag>,
}

impl ResourceTagState {
    fn seed(item: &LineItem) -> Self {
        let mut distinct_owners = BTreeSet::new();
        if !item.owner_tag.is_empty() {
            distinct_owners.insert(item.owner_tag.clone());
        }
        Self {
            owner_tag: item.owner_tag.clone(),
            production_flag: item.production_flag.clone(),
            recency_ordinal: item.recency(),
            distinct_owners,
        }
    }

    fn observe(&mut self, item: &LineItem) {
        if !item.owner_tag.is_empty() {
            let ordinal = item.recency();
            if self.owner_tag.is_empty() || ordinal > self.recency_ordinal {
                self.owner_tag = item.owner_tag.clone();
                self.recency_ordinal = ordinal;
            }
            if !self.distinct_owners.contains(&item.owner_tag) {
                self.distinct_owners.insert(item.owner_tag.clone());
            }
        }

        if !item.production_flag.is_empty() {
            self.production_flag = item.production_flag.clone();
        }
    }

    /// Whether more than one distinct owner was observed
    pub fn is_ambiguous(&self) -> bool {
        self.distinct_owners.len() > 1
    }
}

/// Resolved tags keyed by resource id
#[derive(Debug, Clone, Default)]
pub struct ResourceTagTable {
    entries: BTreeMap<ResourceId, ResourceTagState>,
}

impl ResourceTagTable {
    /// Resolved state of one resource
    pub fn get(&self, id: &ResourceId) -> Option<&ResourceTagState> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, ordered by resource id
    pub fn iter(&self) -> impl Iterator<Item = (&ResourceId, &ResourceTagState)> {
        self.entries.iter()
    }

    /// Resources that carried more than one distinct owner tag this month
    pub fn ambiguous(&self) -> Vec<(&ResourceId, &ResourceTagState)> {
        self.entries
            .iter()
            .filter(|(_, state)| state.is_ambiguous())
            .collect()
    }

    /// Back-fill resolved tags into every line item of a known resource
    pub fn apply(&self, items: &mut [LineItem]) {
        let mut filled = 0usize;
        for item in items.iter_mut() {
            if item.resource_id.is_empty() {
                continue;
            }
            if let Some(state) = self.entries.get(&item.resource_id) {
                if item.owner_tag != state.owner_tag {
                    filled += 1;
                }
                item.owner_tag = state.owner_tag.clone();
                item.production_flag = state.production_flag.clone();
            }
        }
        debug!("Back-filled owner tag on {} line items", filled);
    }
}

/// Builds a [`ResourceTagTable`] from a month of line items
pub struct TagResolver;

impl TagResolver {
    /// Single pass over `items` in the given order
    pub fn build(items: &[LineItem]) -> ResourceTagTable {
        let mut entries: BTreeMap<ResourceId, ResourceTagState> = BTreeMap::new();

        for item in items {
            if item.resource_id.is_empty() {
                continue;
            }
            match entries.entry(item.resource_id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(ResourceTagState::seed(item));
                }
                Entry::Occupied(mut slot) => slot.get_mut().observe(item),
            }
        }

        let table = ResourceTagTable { entries };
        for (id, state) in table.ambiguous() {
            let owners: Vec<&str> = state.distinct_owners.iter().map(OwnerTag::as_str).collect();
            warn!(
                "Resource {} carries {} owner tags ({}), resolved to {}",
                id,
                owners.len(),
                owners.join(", "),
                state.owner_tag
            );
        }
        debug!("Resolved tags for {} resources", table.len());
        table
    }
}

/// Build the tag table and back-fill `items` with it
pub fn resolve(mut items: Vec<LineItem>) -> (Vec<LineItem>, ResourceTagTable) {
    let table = TagResolver::build(&items);
    table.apply(&mut items);
    (items, table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_usage_start;
    use rust_decimal_macros::dec;

    fn item(resource: &str, owner: &str, prod: &str, start: &str) -> LineItem {
        LineItem {
            resource_id: ResourceId::new(resource),
            owner_tag: OwnerTag::new(owner),
            production_flag: ProductionFlag::new(prod),
            operation: "RunInstances".to_string(),
            usage_type: "BoxUsage:t2.micro".to_string(),
            product_name: "Amazon Elastic Compute Cloud".to_string(),
            cost: dec!(1.00),
            availability_zone: "us-east-1a".to_string(),
            usage_start: parse_usage_start(start),
        }
    }

    #[test]
    fn test_backfills_earlier_untagged_charges() {
        let (items, table) = resolve(vec![
            item("i-1", "", "", "2024-06-01 00:00:00"),
            item("i-1", "alice", "", "2024-06-15 12:00:00"),
        ]);

        assert!(items.iter().all(|i| i.owner_tag.as_str() == "ALICE"));
        let state = table.get(&ResourceId::new("i-1")).unwrap();
        assert_eq!(state.recency_ordinal.value(), 15 * 24 + 12);
    }

    #[test]
    fn test_later_owner_wins() {
        let table = TagResolver::build(&[
            item("i-1", "alice", "", "2024-06-02 00:00:00"),
            item("i-1", "bob", "", "2024-06-20 00:00:00"),
            item("i-1", "carol", "", "2024-06-10 00:00:00"),
        ]);
        assert_eq!(
            table.get(&ResourceId::new("i-1")).unwrap().owner_tag.as_str(),
            "BOB"
        );
    }

    #[test]
    fn test_equal_ordinal_keeps_first_seen() {
        let table = TagResolver::build(&[
            item("i-1", "alice", "", "2024-06-05 10:00:00"),
            item("i-1", "bob", "", "2024-06-05 10:30:00"),
        ]);
        let state = table.get(&ResourceId::new("i-1")).unwrap();
        assert_eq!(state.owner_tag.as_str(), "ALICE");
        assert!(state.is_ambiguous());
        assert_eq!(table.ambiguous().len(), 1);
    }

    #[test]
    fn test_empty_seed_with_later_ordinal_still_takes_owner() {
        let (items, _) = resolve(vec![
            item("i-1", "", "", "2024-06-30 23:00:00"),
            item("i-1", "alice", "", "2024-06-01 00:00:00"),
        ]);
        assert!(items.iter().all(|i| i.owner_tag.as_str() == "ALICE"));
    }

    #[test]
    fn test_unparseable_timestamp_is_ordinal_zero() {
        let table = TagResolver::build(&[
            item("i-1", "alice", "", "not a date"),
            item("i-1", "bob", "", "2024-06-01 01:00:00"),
        ]);
        assert_eq!(
            table.get(&ResourceId::new("i-1")).unwrap().owner_tag.as_str(),
            "BOB"
        );
    }

    #[test]
    fn test_production_flag_last_in_pass_order() {
        let (items, _) = resolve(vec![
            item("i-1", "", "yes", "2024-06-20 00:00:00"),
            item("i-1", "", "", "2024-06-21 00:00:00"),
            item("i-1", "", "no", "2024-06-01 00:00:00"),
        ]);
        assert!(items.iter().all(|i| i.production_flag.as_str() == "no"));
    }

    #[test]
    fn test_never_tagged_resource_stays_empty() {
        let (items, table) = resolve(vec![
            item("vol-1", "", "", "2024-06-01 00:00:00"),
            item("vol-1", "", "", "2024-06-02 00:00:00"),
        ]);
        assert!(items.iter().all(|i| i.owner_tag.is_empty()));
        assert!(table.ambiguous().is_empty());
    }

    #[test]
    fn test_account_level_charges_untouched() {
        let (items, table) = resolve(vec![
            item("", "alice", "", "2024-06-01 00:00:00"),
            item("", "", "", "2024-06-02 00:00:00"),
        ]);
        assert!(table.is_empty());
        assert_eq!(items[0].owner_tag.as_str(), "ALICE");
        assert!(items[1].owner_tag.is_empty());
    }

    #[test]
    fn test_resources_are_independent() {
        let (items, _) = resolve(vec![
            item("i-1", "alice", "", "2024-06-01 00:00:00"),
            item("i-2", "", "", "2024-06-01 00:00:00"),
        ]);
        assert_eq!(items[0].owner_tag.as_str(), "ALICE");
        assert!(items[1].owner_tag.is_empty());
    }
}
