use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;

use rankscope_core::config::Settings;
use rankscope_core::domain::category::load_tree;
use rankscope_core::pipeline::{Orchestrator, RunOptions};
use rankscope_core::storage::{write_run_report, OutputLayout};

#[derive(Debug, clap::Args)]
pub struct PartitionArgs {
    /// Country code to process (repeatable). Defaults to every country directory.
    #[arg(long = "country")]
    countries: Vec<String>,

    /// Tree depth to process (repeatable). Defaults to every depth.
    #[arg(long = "depth")]
    depths: Vec<u32>,

    /// Process a single category node instead of whole depths.
    #[arg(long, conflicts_with = "depths")]
    category: Option<String>,

    /// Partitions processed at once. Overrides RANKSCOPE_CONCURRENCY.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Compute everything but write no files.
    #[arg(long)]
    dry_run: bool,

    /// Category tree JSON. Overrides RANKSCOPE_CATEGORIES_PATH.
    #[arg(long)]
    categories: Option<PathBuf>,

    /// Overrides RANKSCOPE_DATA_ROOT.
    #[arg(long)]
    data_root: Option<PathBuf>,
}

pub async fn run(settings: &mut Settings, args: PartitionArgs) -> anyhow::Result<()> {
    if let Some(dir) = args.data_root {
        settings.data_root = dir;
    }
    if let Some(path) = args.categories {
        settings.categories_path = path;
    }
    if let Some(n) = args.concurrency {
        anyhow::ensure!(n >= 1, "--concurrency must be >= 1");
        settings.concurrency = n;
    }

    settings.require_data_root()?;
    let categories_path = settings.require_categories_file()?.to_path_buf();
    let tree = tokio::task::spawn_blocking(move || load_tree(&categories_path))
        .await
        .context("join tree load task failed")?
        .context("load category tree")?;

    let layout = OutputLayout::new(settings.output_root());
    let orchestrator = Orchestrator::new(Arc::new(tree), layout.clone());
    let opts = RunOptions {
        countries: (!args.countries.is_empty()).then_some(args.countries),
        depths: (!args.depths.is_empty()).then_some(args.depths),
        category: args.category,
        concurrency: settings.concurrency,
        dry_run: args.dry_run,
    };

    let report = orchestrator.run(&opts).await?;

    for failure in report.failures() {
        let error = failure.error.as_deref().unwrap_or_default();
        sentry_anyhow::capture_anyhow(&anyhow::anyhow!("partition {} failed: {error}", failure.key));
    }
    for code in &report.unknown_categories {
        tracing::error!(category = %code, "category not found in category tree");
    }

    if opts.dry_run {
        tracing::info!(
            partitions_ok = report.partitions_ok,
            partitions_failed = report.partitions_failed,
            dry_run = true,
            "run report not written"
        );
        return Ok(());
    }

    let path = write_run_report(&layout, &report).await?;
    tracing::info!(path = %path.display(), "run report written");
    Ok(())
}
