//! End-to-end engine run: normalize → resolve → filter → aggregate
//!
//! A run either completes or fails outright. The only fallible step is
//! normalization, so a malformed export never produces a partial report.

use crate::aggregation::{Aggregator, annotate_live_status};
use crate::aggregation_types::CostReport;
use crate::error::Result;
use crate::filters::ReportFilter;
use crate::normalizer::Normalizer;
use crate::resolver::{ResourceTagTable, resolve};
use crate::types::{LineItem, RawLineItem, ResourceId};
use std::collections::HashSet;
use tracing::info;

/// Result of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Resolved (and filtered) line items in pipeline order
    pub items: Vec<LineItem>,
    /// Tag table built from the whole, unfiltered month
    pub tags: ResourceTagTable,
    /// Aggregated report over `items`
    pub report: CostReport,
}

/// Configured engine run
#[derive(Debug, Default)]
pub struct Pipeline {
    normalizer: Normalizer,
    parallel: bool,
    filter: ReportFilter,
    live_ids: Option<HashSet<ResourceId>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize on the rayon thread pool
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Show a progress bar while normalizing
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.normalizer = self.normalizer.with_progress(show_progress);
        self
    }

    /// Restrict the report to matching line items
    pub fn with_filter(mut self, filter: ReportFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Annotate resources against this set of live ids
    pub fn with_live_ids(mut self, live_ids: HashSet<ResourceId>) -> Self {
        self.live_ids = Some(live_ids);
        self
    }

    /// Run the engine over the raw export rows
    pub fn run(&self, rows: Vec<RawLineItem>) -> Result<PipelineOutput> {
        let row_count = rows.len();
        let items = if self.parallel {
            self.normalizer.normalize_parallel(rows)?
        } else {
            self.normalizer.normalize(rows)?
        };

        let (items, tags) = resolve(items);
        let items = self.filter.apply(items);

        let mut report = Aggregator::aggregate(&items);
        if let Some(live_ids) = &self.live_ids {
            annotate_live_status(&mut report, live_ids);
        }

        info!(
            "Processed {} export rows: {} line items, {} resources, {} owners, total {}",
            row_count,
            items.len(),
            tags.len(),
            report.owners.len(),
            report.grand_total
        );

        Ok(PipelineOutput {
            items,
            tags,
            report,
        })
    }
}
