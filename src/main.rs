//! billtag - Resolve ownership tags and report costs from a monthly billing export

use billtag::{
    BilltagError, ResourceId,
    cli::{Cli, Command, parse_date_filter, parse_month, report_as_of},
    data_loader::ExportLoader,
    error::Result,
    filters::ReportFilter,
    output::get_formatter,
    pipeline::Pipeline,
    provider::{collect_live_resource_ids, list_all_resources},
    report_writer::ReportWriter,
};
use billtag_inventory::InventoryProvider;
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::collections::HashSet;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Open the inventory named on the command line, or the default one
async fn open_inventory(cli: &Cli) -> Result<InventoryProvider> {
    match &cli.inventory {
        Some(path) => InventoryProvider::from_path(path).await,
        None => InventoryProvider::new().await,
    }
}

/// Live resource ids, when an inventory was supplied
///
/// Inventory failures only disable the live-status annotation.
async fn load_live_ids(cli: &Cli) -> Option<HashSet<ResourceId>> {
    cli.inventory.as_ref()?;
    match open_inventory(cli).await {
        Ok(provider) => {
            let ids = collect_live_resource_ids(&provider).await;
            info!(
                "Inventory {} lists {} live resources",
                provider.path().display(),
                ids.len()
            );
            Some(ids)
        }
        Err(e) => {
            warn!("Continuing without live-status annotation: {}", e);
            None
        }
    }
}

fn build_filter(cli: &Cli) -> Result<ReportFilter> {
    let mut filter = ReportFilter::new();
    if let Some(since) = &cli.since {
        filter = filter.with_since(parse_date_filter(since)?);
    }
    if let Some(until) = &cli.until {
        filter = filter.with_until(parse_date_filter(until)?);
    }
    if let Some(product) = &cli.product {
        filter = filter.with_product(product.clone());
    }
    Ok(filter)
}

fn build_loader(cli: &Cli, month_start: NaiveDate) -> Result<ExportLoader> {
    if let Some(path) = &cli.export {
        return Ok(ExportLoader::new(path));
    }
    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => ExportLoader::default_data_dir()?,
    };
    ExportLoader::locate(&data_dir, &month_start.format("%Y-%m").to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging. --verbose overrides RUST_LOG.
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("billtag=info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let command = cli.command.clone().unwrap_or(Command::Summary);
    let formatter = get_formatter(cli.json);

    if command == Command::Inventory {
        info!("Listing resource inventory");
        let provider = open_inventory(&cli).await?;
        let resources = list_all_resources(&provider).await;
        println!("{}", formatter.format_inventory(&resources));
        return Ok(());
    }

    let today = Local::now().date_naive();
    let month_start = match &cli.month {
        Some(month) => parse_month(month)?,
        None => parse_month(&today.format("%Y-%m").to_string())?,
    };

    let loader = build_loader(&cli, month_start)?;
    info!("Loading billing export {}", loader.path().display());
    let rows = loader.load().await?;

    let show_progress = !cli.json && is_terminal::is_terminal(std::io::stdout());
    let mut pipeline = Pipeline::new()
        .with_parallel(cli.parallel)
        .with_progress(show_progress)
        .with_filter(build_filter(&cli)?);
    if let Some(live_ids) = load_live_ids(&cli).await {
        pipeline = pipeline.with_live_ids(live_ids);
    }

    let output = pipeline.run(rows)?;

    match command {
        Command::Report { out_dir, detailed } => {
            info!("Writing reports to {}", out_dir.display());
            let written = ReportWriter::new(out_dir, report_as_of(month_start, today))
                .with_detailed(detailed)
                .write_all(&output.report)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&written)?);
            } else {
                for path in written {
                    println!("Wrote {}", path.display());
                }
            }
        }
        Command::Summary => {
            println!("{}", formatter.format_summary(&output.report));
        }
        Command::Owner { name } => {
            let owner = output.report.owner(&name).ok_or_else(|| {
                BilltagError::InvalidArgument(format!("No costs recorded for owner '{name}'"))
            })?;
            println!("{}", formatter.format_owner(owner));
        }
        Command::Untagged => {
            println!("{}", formatter.format_untagged(&output.report.untagged));
        }
        Command::Tags { ambiguous } => {
            println!("{}", formatter.format_tags(&output.tags, ambiguous));
        }
        // Listed before loading the export
        Command::Inventory => {}
    }

    Ok(())
}
