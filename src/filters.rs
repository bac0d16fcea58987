//! Filtering module for resolved line items
//!
//! Filters narrow what goes into a report. They run after tag resolution, so
//! a resource tagged on the 20th still back-fills charges from the 1st even
//! when the report only covers the first week.
//!
//! # Examples
//!
//! ```
//! use billtag::filters::ReportFilter;
//! use chrono::NaiveDate;
//!
//! // First week of June, EC2 only
//! let filter = ReportFilter::new()
//!     .with_since(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
//!     .with_until(NaiveDate::from_ymd_opt(2024, 6, 7).unwrap())
//!     .with_product("Amazon Elastic Compute Cloud".to_string());
//! assert!(!filter.is_empty());
//! ```

use crate::types::LineItem;
use chrono::NaiveDate;
use tracing::debug;

/// Filter configuration for line items
///
/// Supports filtering by usage date range and product name. All filters are
/// optional and can be combined.
#[derive(Debug, Default, Clone)]
pub struct ReportFilter {
    /// Start date filter (inclusive)
    pub since_date: Option<NaiveDate>,
    /// End date filter (inclusive)
    pub until_date: Option<NaiveDate>,
    /// Product name filter (case-insensitive)
    pub product: Option<String>,
}

impl ReportFilter {
    /// Create a new filter with no restrictions
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the start date filter
    pub fn with_since(mut self, date: NaiveDate) -> Self {
        self.since_date = Some(date);
        self
    }

    /// Set the end date filter
    pub fn with_until(mut self, date: NaiveDate) -> Self {
        self.until_date = Some(date);
        self
    }

    /// Set the product filter
    pub fn with_product(mut self, product: String) -> Self {
        self.product = Some(product);
        self
    }

    /// Whether no restriction is configured
    pub fn is_empty(&self) -> bool {
        self.since_date.is_none() && self.until_date.is_none() && self.product.is_none()
    }

    /// Check if a line item passes the filter
    ///
    /// With a date restriction set, items without a usage start never match.
    pub fn matches(&self, item: &LineItem) -> bool {
        if self.since_date.is_some() || self.until_date.is_some() {
            let Some(start) = item.usage_start else {
                return false;
            };
            let date = start.date();

            if let Some(since) = self.since_date
                && date < since
            {
                return false;
            }

            if let Some(until) = self.until_date
                && date > until
            {
                return false;
            }
        }

        if let Some(product) = &self.product
            && !item.product_name.eq_ignore_ascii_case(product.trim())
        {
            return false;
        }

        true
    }

    /// Keep only the matching line items
    pub fn apply(&self, items: Vec<LineItem>) -> Vec<LineItem> {
        if self.is_empty() {
            return items;
        }
        let before = items.len();
        let kept: Vec<LineItem> = items.into_iter().filter(|i| self.matches(i)).collect();
        debug!("Report filter kept {} of {} line items", kept.len(), before);
        kept
    }
}
