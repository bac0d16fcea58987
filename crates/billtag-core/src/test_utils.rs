//! Shared test utilities for unit tests
//!
//! Note: Integration tests (in tests/) cannot access this module because it's
//! marked with #[cfg(test)]. Integration tests have their own builder in
//! tests/common/mod.rs.

use crate::types::{LineItem, OwnerTag, ProductionFlag, ResourceId, parse_usage_start};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Build a line item with the given resource, owner and cost
pub fn line_item(resource: &str, owner: &str, cost: &str) -> LineItem {
    LineItem {
        resource_id: ResourceId::new(resource),
        owner_tag: OwnerTag::new(owner),
        production_flag: ProductionFlag::default(),
        operation: "RunInstances".to_string(),
        usage_type: "BoxUsage:t2.micro".to_string(),
        product_name: "Amazon Elastic Compute Cloud".to_string(),
        cost: Decimal::from_str(cost).unwrap(),
        availability_zone: "us-east-1a".to_string(),
        usage_start: None,
    }
}

/// Same as [`line_item`] with a `YYYY-MM-DD HH:MM:SS` usage start
pub fn line_item_at(resource: &str, owner: &str, cost: &str, start: &str) -> LineItem {
    LineItem {
        usage_start: parse_usage_start(start),
        ..line_item(resource, owner, cost)
    }
}
