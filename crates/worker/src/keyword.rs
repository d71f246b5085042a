use std::path::PathBuf;

use rankscope_core::analytics::RankingAggregator;
use rankscope_core::config::Settings;
use rankscope_core::pipeline::run_keyword;
use rankscope_core::storage::OutputLayout;

#[derive(Debug, clap::Args)]
pub struct KeywordArgs {
    /// Country directory to search.
    #[arg(long)]
    country: String,

    /// Matched case-insensitively against product titles.
    #[arg(long)]
    keyword: String,

    /// Compute the report but write no files.
    #[arg(long)]
    dry_run: bool,

    /// Overrides RANKSCOPE_DATA_ROOT.
    #[arg(long)]
    data_root: Option<PathBuf>,
}

pub async fn run(settings: &mut Settings, args: KeywordArgs) -> anyhow::Result<()> {
    if let Some(dir) = args.data_root {
        settings.data_root = dir;
    }
    settings.require_data_root()?;

    let layout = OutputLayout::new(settings.output_root());
    let outcome = run_keyword(
        &layout,
        RankingAggregator::default(),
        &args.country,
        &args.keyword,
        args.dry_run,
    )
    .await?;

    match (&outcome.output, &outcome.summary) {
        (Some(csv), Some(summary)) => tracing::info!(
            country = %outcome.country,
            keyword = %outcome.keyword,
            rows = outcome.stats.rows_matched,
            csv = %csv.display(),
            summary = %summary.display(),
            "keyword report written"
        ),
        _ => tracing::info!(
            country = %outcome.country,
            keyword = %outcome.keyword,
            rows = outcome.stats.rows_matched,
            "keyword report computed (dry run)"
        ),
    }
    Ok(())
}
