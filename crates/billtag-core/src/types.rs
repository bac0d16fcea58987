//! Core domain types for billtag
//!
//! This module contains the fundamental types used throughout the billtag library.
//! Tag values are canonicalized once, when they are constructed, so equality and
//! emptiness checks elsewhere never have to care about case or padding.

use chrono::{Datelike, NaiveDateTime, Timelike};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp format used by the `UsageStartDate` column
pub const USAGE_START_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Label used wherever an empty owner tag needs a printable name
pub const UNTAGGED_LABEL: &str = "untagged";

/// Strongly-typed resource identifier
///
/// An empty id marks an account-level charge that is not attached to any
/// resource (support plans, data transfer summaries, ...).
///
/// # Examples
/// ```
/// use billtag_core::types::ResourceId;
///
/// let id = ResourceId::new("i-0abc123");
/// assert_eq!(id.as_str(), "i-0abc123");
/// assert!(ResourceId::new("").is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(String);

impl ResourceId {
    /// Create a new ResourceId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is an account-level (resource-less) charge
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Owner tag (the `user:KEEP` tag), canonicalized to trimmed uppercase
///
/// # Examples
/// ```
/// use billtag_core::types::OwnerTag;
///
/// let owner = OwnerTag::new(" alice ");
/// assert_eq!(owner.as_str(), "ALICE");
/// assert_eq!(OwnerTag::new("").label(), "untagged");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerTag(String);

impl OwnerTag {
    /// Create a canonical owner tag from a raw tag value
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_uppercase())
    }

    /// The empty (untagged) owner
    pub fn untagged() -> Self {
        Self::default()
    }

    /// Get the canonical value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the tag is absent
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Printable name, never blank: empty owners are reported as `untagged`
    pub fn label(&self) -> &str {
        if self.is_empty() {
            UNTAGGED_LABEL
        } else {
            &self.0
        }
    }
}

impl fmt::Display for OwnerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Production flag (the `user:PROD` tag), canonicalized to trimmed lowercase
///
/// An empty flag means non-production or unknown.
///
/// # Examples
/// ```
/// use billtag_core::types::ProductionFlag;
///
/// let flag = ProductionFlag::new("YES");
/// assert_eq!(flag.as_str(), "yes");
/// assert!(flag.is_production());
/// assert!(!ProductionFlag::new("").is_production());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductionFlag(String);

impl ProductionFlag {
    /// Create a canonical production flag from a raw tag value
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase())
    }

    /// Get the canonical value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the flag is absent
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the flag marks production traffic (`yes` or `true`)
    pub fn is_production(&self) -> bool {
        matches!(self.0.as_str(), "yes" | "true")
    }

    /// Label used in report subtotal rows
    pub fn label(&self) -> &str {
        if self.is_production() {
            "production"
        } else if self.is_empty() {
            "non-production"
        } else {
            &self.0
        }
    }
}

impl fmt::Display for ProductionFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hours since the start of the month: `day * 24 + hour`
///
/// Only meaningful for comparing two observations within one monthly export.
///
/// # Examples
/// ```
/// use billtag_core::types::RecencyOrdinal;
///
/// let ordinal = RecencyOrdinal::from_usage_start("2024-06-15 12:00:00");
/// assert_eq!(ordinal.value(), 15 * 24 + 12);
/// assert_eq!(RecencyOrdinal::from_usage_start("garbage").value(), 0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecencyOrdinal(u32);

impl RecencyOrdinal {
    /// Ordinal used for rows without a usable timestamp
    pub const ZERO: Self = Self(0);

    /// Create from a raw value
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Derive from a parsed timestamp
    pub fn from_timestamp(ts: &NaiveDateTime) -> Self {
        Self(ts.day() * 24 + ts.hour())
    }

    /// Derive from a raw `UsageStartDate` value; unparseable values map to zero
    pub fn from_usage_start(raw: &str) -> Self {
        parse_usage_start(raw)
            .map(|ts| Self::from_timestamp(&ts))
            .unwrap_or(Self::ZERO)
    }

    /// Get the inner value
    pub fn value(&self) -> u32 {
        self.0
    }
}

/// Parse a `UsageStartDate` value (`YYYY-MM-DD HH:MM:SS`)
pub fn parse_usage_start(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), USAGE_START_FORMAT).ok()
}

/// One row of the billing export as read from the CSV file
///
/// Every column is optional at this stage; the normalizer decides which
/// absences are fatal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLineItem {
    /// Record type marker (`LineItem`, `Rounding`, `InvoiceTotal`, ...)
    #[serde(rename = "RecordType", default)]
    pub record_type: Option<String>,
    /// Cost of the row, unparsed
    #[serde(rename = "Cost", default)]
    pub cost: Option<String>,
    /// Billing operation
    #[serde(rename = "Operation", default)]
    pub operation: Option<String>,
    /// Usage type
    #[serde(rename = "UsageType", default)]
    pub usage_type: Option<String>,
    /// Product name
    #[serde(rename = "ProductName", default)]
    pub product_name: Option<String>,
    /// Resource identifier
    #[serde(rename = "ResourceId", default)]
    pub resource_id: Option<String>,
    /// Owner tag
    #[serde(rename = "user:KEEP", default)]
    pub owner_tag: Option<String>,
    /// Production tag
    #[serde(rename = "user:PROD", default)]
    pub production_flag: Option<String>,
    /// Usage window start
    #[serde(rename = "UsageStartDate", default)]
    pub usage_start: Option<String>,
    /// Availability zone
    #[serde(rename = "AvailabilityZone", default)]
    pub availability_zone: Option<String>,
}

/// Normalized billable line item
///
/// Every retained line item has a non-zero cost and came from a `LineItem`
/// record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Resource the charge belongs to (empty for account-level charges)
    pub resource_id: ResourceId,
    /// Owner tag, back-filled by the tag resolver
    pub owner_tag: OwnerTag,
    /// Production flag, back-filled by the tag resolver
    pub production_flag: ProductionFlag,
    /// Billing operation
    pub operation: String,
    /// Usage type
    pub usage_type: String,
    /// Product name
    pub product_name: String,
    /// Charge amount
    pub cost: Decimal,
    /// Availability zone (may be empty)
    pub availability_zone: String,
    /// Usage window start, if the export carried a parseable one
    pub usage_start: Option<NaiveDateTime>,
}

impl LineItem {
    /// Recency ordinal of this observation
    pub fn recency(&self) -> RecencyOrdinal {
        self.usage_start
            .as_ref()
            .map(RecencyOrdinal::from_timestamp)
            .unwrap_or(RecencyOrdinal::ZERO)
    }
}
