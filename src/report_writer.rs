//! CSV report files
//!
//! Writes three kinds of file into an output directory:
//!
//! - `<owner>_report.csv` per owner, one row per resource + usage type group
//!   with subtotal marker rows in the `Subtotal` / `Subtotal Value` columns
//! - `overall_keep+prod_summary.csv`, one row per owner
//! - `untagged_sorted_reports.csv`, the three untagged sections
//!
//! Files are written with a flexible `csv::Writer` because title, blank and
//! section rows are shorter than data rows.

use crate::aggregation_types::{CostReport, LiveStatus, OwnerBucket, Totals, UntaggedRow};
use crate::error::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the cross-owner summary
pub const SUMMARY_FILE: &str = "overall_keep+prod_summary.csv";

/// File name of the untagged overview
pub const UNTAGGED_FILE: &str = "untagged_sorted_reports.csv";

const OWNER_HEADER: [&str; 11] = [
    "Owner",
    "ResourceId",
    "AvailabilityZone",
    "Operation",
    "UsageType",
    "Production",
    "UsageStartDate",
    "Cost",
    "Subtotal",
    "Subtotal Value",
    "Status",
];

type CsvWriter = csv::Writer<File>;

/// Writes report files for one aggregated month
pub struct ReportWriter {
    dir: PathBuf,
    as_of: NaiveDate,
    detailed: bool,
}

impl ReportWriter {
    /// Write into `dir`, titling reports as covering the month up to `as_of`
    pub fn new(dir: impl Into<PathBuf>, as_of: NaiveDate) -> Self {
        Self {
            dir: dir.into(),
            as_of,
            detailed: false,
        }
    }

    /// Also write every member line item beneath its group row
    pub fn with_detailed(mut self, detailed: bool) -> Self {
        self.detailed = detailed;
        self
    }

    /// Write every owner report, the summary and the untagged overview
    pub fn write_all(&self, report: &CostReport) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.dir)?;

        let mut written = Vec::with_capacity(report.owners.len() + 2);
        let mut taken = HashSet::new();
        for owner in &report.owners {
            let file_name = unique_file_name(&mut taken, owner.label());
            written.push(self.write_owner_to(owner, &file_name)?);
        }
        written.push(self.write_summary(report)?);
        written.push(self.write_untagged(report)?);

        info!(
            "Wrote {} report files to {}",
            written.len(),
            self.dir.display()
        );
        Ok(written)
    }

    fn open(&self, file_name: &str) -> Result<(PathBuf, CsvWriter)> {
        let path = self.dir.join(file_name);
        let writer = csv::WriterBuilder::new().flexible(true).from_path(&path)?;
        debug!("Writing {}", path.display());
        Ok((path, writer))
    }

    fn period(&self) -> String {
        format!("from start of month to {}", self.as_of.format("%Y-%m-%d"))
    }

    /// Write the report of one owner
    pub fn write_owner(&self, owner: &OwnerBucket) -> Result<PathBuf> {
        self.write_owner_to(owner, &owner_report_file_name(owner.label()))
    }

    fn write_owner_to(&self, owner: &OwnerBucket, file_name: &str) -> Result<PathBuf> {
        let label = owner.label();
        let (path, mut w) = self.open(file_name)?;

        w.write_record([""])?;
        w.write_record([format!("Report for {label} {}", self.period())])?;
        w.write_record(OWNER_HEADER)?;

        for bucket in &owner.production {
            for resource in &bucket.resources {
                let status = status_label(resource.status);
                for usage in &resource.usage_types {
                    let subtotal = usage.subtotal.to_string();
                    w.write_record([
                        label,
                        resource.resource_id.as_str(),
                        usage.availability_zone.as_str(),
                        usage.operation.as_str(),
                        usage.usage_type.as_str(),
                        usage.production_flag.as_str(),
                        "",
                        subtotal.as_str(),
                        "",
                        "",
                        status,
                    ])?;

                    if self.detailed {
                        for item in &usage.items {
                            let start = item
                                .usage_start
                                .map(|ts| ts.format(crate::types::USAGE_START_FORMAT).to_string())
                                .unwrap_or_default();
                            let cost = item.cost.to_string();
                            w.write_record([
                                label,
                                item.resource_id.as_str(),
                                item.availability_zone.as_str(),
                                item.operation.as_str(),
                                item.usage_type.as_str(),
                                item.production_flag.as_str(),
                                start.as_str(),
                                cost.as_str(),
                                "",
                                "",
                                "",
                            ])?;
                        }
                    }
                }
                write_marker(
                    &mut w,
                    label,
                    &format!("Subtotal for resource {}", resource.resource_id),
                    resource.subtotal,
                )?;
            }
            write_marker(
                &mut w,
                label,
                &format!("Subtotal for {}", bucket.flag.label()),
                bucket.subtotal,
            )?;
        }

        write_marker(&mut w, label, &format!("TOTAL FOR {label}"), owner.subtotal)?;
        w.flush()?;
        Ok(path)
    }

    /// Write the cross-owner summary
    pub fn write_summary(&self, report: &CostReport) -> Result<PathBuf> {
        let (path, mut w) = self.open(SUMMARY_FILE)?;
        let summaries = report.summaries();
        let totals = Totals::from_summaries(&summaries);

        w.write_record([format!("Summary by owner {}", self.period())])?;
        w.write_record([
            "Owner",
            "Non-production subtotal",
            "Production subtotal",
            "User total",
        ])?;
        w.write_record([""])?;

        for summary in &summaries {
            w.write_record([
                summary.owner.clone(),
                summary.non_production.to_string(),
                summary.production.to_string(),
                summary.total.to_string(),
            ])?;
        }
        w.write_record([
            "TOTAL".to_string(),
            totals.non_production.to_string(),
            totals.production.to_string(),
            totals.total.to_string(),
        ])?;

        w.flush()?;
        Ok(path)
    }

    /// Write the untagged overview
    pub fn write_untagged(&self, report: &CostReport) -> Result<PathBuf> {
        let (path, mut w) = self.open(UNTAGGED_FILE)?;
        let overview = &report.untagged;

        w.write_record([format!("Untagged costs {}", self.period())])?;
        write_untagged_section(
            &mut w,
            "Untagged costs grouped by resource id",
            "ResourceId",
            &overview.by_resource,
        )?;
        write_untagged_section(
            &mut w,
            "Untagged costs by Operation",
            "Operation",
            &overview.by_operation,
        )?;
        write_untagged_section(
            &mut w,
            "Untagged costs by UsageType",
            "UsageType",
            &overview.by_usage_type,
        )?;
        w.write_record([""])?;
        w.write_record(["TOTAL".to_string(), String::new(), overview.total.to_string()])?;

        w.flush()?;
        Ok(path)
    }

    /// Output directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn write_marker(w: &mut CsvWriter, owner: &str, marker: &str, value: Decimal) -> Result<()> {
    let value = value.to_string();
    w.write_record([
        owner,
        "",
        "",
        "",
        "",
        "",
        "",
        "",
        marker,
        value.as_str(),
        "",
    ])?;
    Ok(())
}

fn write_untagged_section(
    w: &mut CsvWriter,
    title: &str,
    key_title: &str,
    rows: &[UntaggedRow],
) -> Result<()> {
    w.write_record([""])?;
    w.write_record([title])?;
    w.write_record(["ProductName", key_title, "Total", "Status"])?;
    for row in rows {
        let total = row.total.to_string();
        w.write_record([
            row.product.as_str(),
            row.key.as_str(),
            total.as_str(),
            status_label(row.status),
        ])?;
    }
    Ok(())
}

fn status_label(status: Option<LiveStatus>) -> &'static str {
    status.map(|s| s.label()).unwrap_or("")
}

/// File name of an owner report, with unsafe characters replaced by `_`
pub fn owner_report_file_name(label: &str) -> String {
    format!("{}_report.csv", sanitize_label(label))
}

fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Owner report file name not yet in `taken`
///
/// Labels that sanitize to an already used name get a `-2`, `-3`, ...
/// suffix in report order. Names are compared ignoring ASCII case, since
/// `untagged` and `UNTAGGED` are one file on case-insensitive filesystems.
fn unique_file_name(taken: &mut HashSet<String>, label: &str) -> String {
    let stem = sanitize_label(label);
    let mut name = format!("{stem}_report.csv");
    let mut n = 1;
    while taken.contains(&name.to_ascii_lowercase()) {
        n += 1;
        name = format!("{stem}-{n}_report.csv");
    }
    if n > 1 {
        warn!("Owner '{}' clashes with another owner's file name, writing {}", label, name);
    }
    taken.insert(name.to_ascii_lowercase());
    name
}
