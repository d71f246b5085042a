use anyhow::Context;
use rankscope_core::config::Settings;
use rankscope_core::ingest::{country_split, split_by_country};
use rankscope_core::storage::OutputLayout;

pub async fn run(settings: &Settings) -> anyhow::Result<()> {
    let data_root = settings.require_data_root()?.to_path_buf();
    let layout = OutputLayout::new(settings.output_root());

    let summary = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let inputs = country_split::raw_exports(&data_root)
            .with_context(|| format!("list raw exports in {}", data_root.display()))?;
        let summary = split_by_country(&inputs, &layout).context("split exports by country")?;
        Ok(summary)
    })
    .await
    .context("join split task failed")??;

    for (country, rows) in &summary.rows_by_country {
        tracing::info!(%country, rows, "country export written");
    }
    if summary.rows_without_country > 0 {
        tracing::warn!(
            rows = summary.rows_without_country,
            "rows without a usable ranking_country were dropped"
        );
    }
    Ok(())
}
