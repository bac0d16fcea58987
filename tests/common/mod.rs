//! Common test utilities and helpers for billtag tests
//!
//! Builders for line items and raw export rows, plus a writer for CSV export
//! fixtures in a temporary directory.

#![allow(dead_code)]

use billtag::types::{
    LineItem, OwnerTag, ProductionFlag, RawLineItem, ResourceId, parse_usage_start,
};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use tempfile::TempDir;

/// Column order of generated export fixtures
pub const EXPORT_HEADER: [&str; 13] = [
    "InvoiceID",
    "PayerAccountId",
    "RecordType",
    "ProductName",
    "UsageType",
    "Operation",
    "AvailabilityZone",
    "UsageStartDate",
    "UsageEndDate",
    "Cost",
    "ResourceId",
    "user:KEEP",
    "user:PROD",
];

/// Common product names
pub const EC2: &str = "Amazon Elastic Compute Cloud";
pub const S3: &str = "Amazon Simple Storage Service";
pub const SUPPORT: &str = "AWS Support (Business)";

/// Builder for creating test LineItem instances
pub struct LineItemBuilder {
    item: LineItem,
}

impl LineItemBuilder {
    /// Create a new builder for `resource` with default values
    pub fn new(resource: &str) -> Self {
        Self {
            item: LineItem {
                resource_id: ResourceId::new(resource),
                owner_tag: OwnerTag::default(),
                production_flag: ProductionFlag::default(),
                operation: "RunInstances".to_string(),
                usage_type: "BoxUsage:t2.micro".to_string(),
                product_name: EC2.to_string(),
                cost: Decimal::ONE,
                availability_zone: "us-east-1a".to_string(),
                usage_start: parse_usage_start("2024-06-01 00:00:00"),
            },
        }
    }

    pub fn owner(mut self, owner: &str) -> Self {
        self.item.owner_tag = OwnerTag::new(owner);
        self
    }

    pub fn production(mut self, flag: &str) -> Self {
        self.item.production_flag = ProductionFlag::new(flag);
        self
    }

    pub fn cost(mut self, cost: &str) -> Self {
        self.item.cost = Decimal::from_str(cost).unwrap();
        self
    }

    pub fn at(mut self, start: &str) -> Self {
        self.item.usage_start = parse_usage_start(start);
        self
    }

    pub fn operation(mut self, operation: &str) -> Self {
        self.item.operation = operation.to_string();
        self
    }

    pub fn usage_type(mut self, usage_type: &str) -> Self {
        self.item.usage_type = usage_type.to_string();
        self
    }

    pub fn product(mut self, product: &str) -> Self {
        self.item.product_name = product.to_string();
        self
    }

    pub fn zone(mut self, zone: &str) -> Self {
        self.item.availability_zone = zone.to_string();
        self
    }

    pub fn build(self) -> LineItem {
        self.item
    }
}

/// One row of a CSV export fixture
#[derive(Clone)]
pub struct ExportRow {
    pub record_type: String,
    pub product: String,
    pub usage_type: String,
    pub operation: String,
    pub zone: String,
    pub start: String,
    pub cost: String,
    pub resource: String,
    pub owner: String,
    pub production: String,
}

impl ExportRow {
    /// A billable EC2 line item
    pub fn line_item(resource: &str, owner: &str, cost: &str, start: &str) -> Self {
        Self {
            record_type: "LineItem".to_string(),
            product: EC2.to_string(),
            usage_type: "BoxUsage:t2.micro".to_string(),
            operation: "RunInstances".to_string(),
            zone: "us-east-1a".to_string(),
            start: start.to_string(),
            cost: cost.to_string(),
            resource: resource.to_string(),
            owner: owner.to_string(),
            production: String::new(),
        }
    }

    /// A non-billable summary record
    pub fn record(record_type: &str, cost: &str) -> Self {
        Self {
            record_type: record_type.to_string(),
            product: String::new(),
            usage_type: String::new(),
            operation: String::new(),
            zone: String::new(),
            start: String::new(),
            cost: cost.to_string(),
            resource: String::new(),
            owner: String::new(),
            production: String::new(),
        }
    }

    pub fn production(mut self, flag: &str) -> Self {
        self.production = flag.to_string();
        self
    }

    pub fn product(mut self, product: &str) -> Self {
        self.product = product.to_string();
        self
    }

    pub fn classification(mut self, operation: &str, usage_type: &str) -> Self {
        self.operation = operation.to_string();
        self.usage_type = usage_type.to_string();
        self
    }

    pub fn zone(mut self, zone: &str) -> Self {
        self.zone = zone.to_string();
        self
    }

    /// The same row as the CSV reader would produce it
    pub fn to_raw(&self) -> RawLineItem {
        let opt = |s: &str| Some(s.to_string());
        RawLineItem {
            record_type: opt(&self.record_type),
            cost: opt(&self.cost),
            operation: opt(&self.operation),
            usage_type: opt(&self.usage_type),
            product_name: opt(&self.product),
            resource_id: opt(&self.resource),
            owner_tag: opt(&self.owner),
            production_flag: opt(&self.production),
            usage_start: opt(&self.start),
            availability_zone: opt(&self.zone),
        }
    }
}

/// Write an export fixture named `<account>-aws-billing-...-<month>.csv`
pub fn write_export(dir: &TempDir, month: &str, rows: &[ExportRow]) -> PathBuf {
    let path = dir.path().join(format!(
        "123456789012-aws-billing-detailed-line-items-with-resources-and-tags-{month}.csv"
    ));
    let mut writer = csv::Writer::from_path(&path).unwrap();
    writer.write_record(EXPORT_HEADER).unwrap();
    for (i, row) in rows.iter().enumerate() {
        writer
            .write_record([
                "inv-0001",
                "123456789012",
                row.record_type.as_str(),
                row.product.as_str(),
                row.usage_type.as_str(),
                row.operation.as_str(),
                row.zone.as_str(),
                row.start.as_str(),
                row.start.as_str(),
                row.cost.as_str(),
                row.resource.as_str(),
                row.owner.as_str(),
                row.production.as_str(),
            ])
            .unwrap_or_else(|e| panic!("row {i}: {e}"));
    }
    writer.flush().unwrap();
    path
}

/// A small month: one resource tagged late, one never tagged, one support fee
pub fn sample_month() -> Vec<ExportRow> {
    vec![
        ExportRow::line_item("i-1", "", "10.00", "2024-06-01 00:00:00"),
        ExportRow::line_item("i-1", "alice", "20.00", "2024-06-15 12:00:00").production("yes"),
        ExportRow::line_item("i-2", "bob", "5.50", "2024-06-03 08:00:00").zone("us-east-1c"),
        ExportRow::line_item("vol-1", "", "1.25", "2024-06-02 00:00:00")
            .classification("CreateVolume-Gp2", "EBS:VolumeUsage.gp2"),
        ExportRow::line_item("", "", "100.00", "2024-06-01 00:00:00")
            .product(SUPPORT)
            .classification("", ""),
        ExportRow::record("Rounding", "-0.01"),
        ExportRow::record("InvoiceTotal", "136.74"),
        ExportRow::line_item("i-3", "carol", "0", "2024-06-04 00:00:00"),
    ]
}
