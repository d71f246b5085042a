use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use crate::analytics::RankingAggregator;
use crate::domain::report::KeywordSummary;
use crate::ingest::csv_source::country_inputs;
use crate::partition::KeywordSelector;
use crate::pipeline::scan::{self, PartitionJob, PartitionStats};
use crate::storage::layout::{is_safe_component, keyword_slug, OutputLayout};
use crate::storage::summary::write_keyword_summary;

#[derive(Debug, Clone, Serialize)]
pub struct KeywordOutcome {
    pub country: String,
    pub keyword: String,
    pub stats: PartitionStats,
    pub output: Option<PathBuf>,
    pub summary: Option<PathBuf>,
}

/// Collects one country's rows whose title contains `keyword` (any case) into
/// `<country>/report/<country>_<keyword>.csv` and writes their summary beside it.
pub async fn run_keyword(
    layout: &OutputLayout,
    aggregator: RankingAggregator,
    country: &str,
    keyword: &str,
    dry_run: bool,
) -> anyhow::Result<KeywordOutcome> {
    let keyword = keyword.trim();
    anyhow::ensure!(!keyword.is_empty(), "keyword must not be blank");
    anyhow::ensure!(
        is_safe_component(&keyword_slug(keyword)),
        "keyword {keyword:?} cannot be used in a file name"
    );
    anyhow::ensure!(is_safe_component(country), "invalid country code {country:?}");

    let files = country_inputs(&layout.country_dir(country))
        .with_context(|| format!("read inputs for {country}"))?;
    let c = country.to_string();
    let inputs = tokio::task::spawn_blocking(move || scan::survey_country(&c, files))
        .await
        .context("join survey task failed")??;

    let output = (!dry_run).then(|| layout.keyword_csv(country, keyword));
    let job = PartitionJob {
        inputs: Arc::new(inputs),
        filter: Arc::new(KeywordSelector::new(keyword).into()),
        output: output.clone(),
    };
    let (result, stats) =
        tokio::task::spawn_blocking(move || scan::scan_partition(&job, &aggregator))
            .await
            .context("join keyword scan failed")??;
    tracing::info!(
        %country,
        keyword,
        rows_scanned = stats.rows_scanned,
        rows_matched = stats.rows_matched,
        dry_run,
        "keyword report built"
    );

    let summary = if dry_run {
        None
    } else {
        let summary = KeywordSummary {
            country: country.to_string(),
            keyword: keyword.to_string(),
            result,
        };
        Some(write_keyword_summary(layout, &summary).await?)
    };

    Ok(KeywordOutcome {
        country: country.to_string(),
        keyword: keyword.to_string(),
        stats,
        output,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "ranking_country,ranking_category,rank,product_title,brand\n\
        US,211,1,Ninja AIR FRYER,Ninja\n\
        US,,4,compact air fryer,\n\
        US,111,2,Linen Shirt,Acme\n";

    fn layout() -> (tempfile::TempDir, OutputLayout) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("US")).unwrap();
        std::fs::write(dir.path().join("US/US.csv"), EXPORT).unwrap();
        let layout = OutputLayout::new(dir.path());
        (dir, layout)
    }

    #[tokio::test]
    async fn matches_titles_ignoring_case_and_keeps_header() {
        let (_dir, layout) = layout();
        let outcome = run_keyword(&layout, RankingAggregator::default(), "US", "Air Fryer", false)
            .await
            .unwrap();

        assert_eq!(outcome.stats.rows_matched, 2);
        let csv = std::fs::read_to_string(layout.keyword_csv("US", "Air Fryer")).unwrap();
        assert_eq!(
            csv,
            "ranking_country,ranking_category,rank,product_title,brand\n\
             US,211,1,Ninja AIR FRYER,Ninja\n\
             US,,4,compact air fryer,\n"
        );
        let path = outcome.summary.unwrap();
        assert!(path.ends_with("US/report/US_Air_Fryer.summary.json"));
        let v: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(v["keyword"], "Air Fryer");
        assert_eq!(v["result"]["record_count"], 2);
        assert_eq!(v["result"]["top_products"][0]["record"]["brand"], "Ninja");
    }

    #[tokio::test]
    async fn no_match_still_writes_header_and_empty_summary() {
        let (_dir, layout) = layout();
        let outcome = run_keyword(&layout, RankingAggregator::default(), "US", "kettle", false)
            .await
            .unwrap();

        assert_eq!(outcome.stats.rows_matched, 0);
        assert_eq!(
            std::fs::read_to_string(layout.keyword_csv("US", "kettle")).unwrap(),
            "ranking_country,ranking_category,rank,product_title,brand\n"
        );
        let v: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(outcome.summary.unwrap()).unwrap(),
        )
        .unwrap();
        assert_eq!(v["result"]["record_count"], 0);
    }

    #[tokio::test]
    async fn dry_run_and_bad_arguments_write_nothing() {
        let (dir, layout) = layout();
        let outcome = run_keyword(&layout, RankingAggregator::default(), "US", "shirt", true)
            .await
            .unwrap();
        assert_eq!(outcome.stats.rows_matched, 1);
        assert!(outcome.output.is_none());

        for (country, keyword) in [("US", "  "), ("US", "../x"), ("..", "shirt"), ("FR", "shirt")] {
            assert!(run_keyword(&layout, RankingAggregator::default(), country, keyword, false)
                .await
                .is_err());
        }
        assert!(!dir.path().join("US/report").exists());
    }
}
