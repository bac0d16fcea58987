//! Data loader module for locating and parsing the monthly billing export
//!
//! The export is a CSV file with one row per resource/usage-type/time-window
//! charge. It is either given explicitly or located in a data directory by
//! its month suffix, e.g.
//! `123456789012-aws-billing-detailed-line-items-with-resources-and-tags-2024-06.csv`.
//!
//! The data directory defaults to `<data dir>/billtag` and can be overridden
//! with the `BILLTAG_DATA_DIR` environment variable.
//!
//! # Examples
//!
//! ```no_run
//! use billtag::data_loader::ExportLoader;
//!
//! # async fn example() -> billtag::Result<()> {
//! let data_dir = ExportLoader::default_data_dir()?;
//! let loader = ExportLoader::locate(&data_dir, "2024-06")?;
//! let rows = loader.load().await?;
//! println!("{} rows in {}", rows.len(), loader.path().display());
//! # Ok(())
//! # }
//! ```

use crate::error::{BilltagError, Result};
use crate::types::RawLineItem;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the export data directory
pub const DATA_DIR_ENV: &str = "BILLTAG_DATA_DIR";

/// Loader for one billing export file
pub struct ExportLoader {
    path: PathBuf,
}

impl ExportLoader {
    /// Create a loader for an explicit export file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default directory searched for exports
    pub fn default_data_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        dirs::data_dir()
            .map(|dir| dir.join("billtag"))
            .ok_or_else(|| BilltagError::Config("Cannot determine data directory".into()))
    }

    /// Find the export for `month` (YYYY-MM) in `data_dir`
    ///
    /// Matches files named `*-YYYY-MM.csv` up to one directory deep. When
    /// several match, the lexicographically last path wins so the choice is
    /// stable across runs.
    pub fn locate(data_dir: &Path, month: &str) -> Result<Self> {
        let suffix = format!("-{month}.csv");
        let mut candidates: Vec<PathBuf> = walkdir::WalkDir::new(data_dir)
            .min_depth(1)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.ends_with(&suffix))
            })
            .collect();

        candidates.sort();
        debug!(
            "Found {} export candidates for {} in {}",
            candidates.len(),
            month,
            data_dir.display()
        );

        candidates
            .pop()
            .map(Self::new)
            .ok_or_else(|| BilltagError::NoExportFound {
                dir: data_dir.to_path_buf(),
                month: month.to_string(),
            })
    }

    /// Path of the export this loader reads
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the whole export
    pub async fn load(&self) -> Result<Vec<RawLineItem>> {
        let bytes = tokio::fs::read(&self.path).await?;
        let rows = parse_export(bytes.as_slice())?;
        debug!("Parsed {} rows from {}", rows.len(), self.path.display());
        Ok(rows)
    }
}

/// Parse CSV export content into raw rows
///
/// Columns are matched by header name; unknown columns are ignored and
/// missing ones come through as `None`. A row that cannot be read at all is
/// reported as malformed input with its 1-based data row number.
pub fn parse_export<R: Read>(reader: R) -> Result<Vec<RawLineItem>> {
    let mut csv_reader = csv::ReaderBuilder::new().from_reader(reader);
    let mut rows = Vec::new();

    for (index, record) in csv_reader.deserialize::<RawLineItem>().enumerate() {
        let row = record.map_err(|e| BilltagError::malformed(index + 1, e.to_string()))?;
        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "InvoiceID,RecordType,ProductName,UsageType,Operation,AvailabilityZone,UsageStartDate,Cost,ResourceId,user:KEEP,user:PROD";

    #[test]
    fn test_parse_export_by_header_name() {
        let data = format!(
            "{HEADER}\n\
             inv-1,LineItem,Amazon EC2,BoxUsage:t2.micro,RunInstances,us-east-1a,2024-06-01 00:00:00,0.0116,i-1,alice,yes\n\
             inv-1,InvoiceTotal,,,,,,12.00,,,\n"
        );

        let rows = parse_export(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].resource_id.as_deref(), Some("i-1"));
        assert_eq!(rows[0].owner_tag.as_deref(), Some("alice"));
        assert_eq!(rows[0].usage_start.as_deref(), Some("2024-06-01 00:00:00"));
        assert_eq!(rows[1].record_type.as_deref(), Some("InvoiceTotal"));
        assert!(rows[1].resource_id.is_none());
    }

    #[test]
    fn test_ragged_row_is_malformed() {
        let data = format!("{HEADER}\ninv-1,LineItem,Amazon EC2\n");
        let err = parse_export(data.as_bytes()).unwrap_err();
        assert!(matches!(err, BilltagError::MalformedInput { row: 1, .. }));
    }

    #[test]
    fn test_locate_picks_month_suffix() {
        let dir = TempDir::new().unwrap();
        let prefix = "123-aws-billing-detailed-line-items-with-resources-and-tags";
        for month in ["2024-05", "2024-06"] {
            std::fs::write(dir.path().join(format!("{prefix}-{month}.csv")), HEADER).unwrap();
        }
        std::fs::write(dir.path().join(format!("{prefix}-2024-06.csv.zip")), "").unwrap();

        let loader = ExportLoader::locate(dir.path(), "2024-06").unwrap();
        assert!(loader.path().to_string_lossy().ends_with("-2024-06.csv"));
    }

    #[test]
    fn test_locate_missing_month() {
        let dir = TempDir::new().unwrap();
        let err = ExportLoader::locate(dir.path(), "2024-07").err().unwrap();
        assert!(matches!(err, BilltagError::NoExportFound { .. }));
    }

    #[tokio::test]
    async fn test_load_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("export-2024-06.csv");
        tokio::fs::write(
            &path,
            format!("{HEADER}\ninv-1,LineItem,Amazon S3,TimedStorage,PutObject,,2024-06-02 03:00:00,1.25,bucket-a,,\n"),
        )
        .await
        .unwrap();

        let rows = ExportLoader::new(&path).load().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cost.as_deref(), Some("1.25"));
    }
}
