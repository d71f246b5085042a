use std::path::PathBuf;

use anyhow::Context;
use serde::Serialize;

use crate::domain::report::{KeywordSummary, PartitionSummary};
use crate::storage::layout::OutputLayout;

/// Receives each finished partition. Report rendering and delivery plug in here.
#[async_trait::async_trait]
pub trait AggregationConsumer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn consume(&self, summary: &PartitionSummary) -> anyhow::Result<()>;
}

/// Writes `<code>_<country>.summary.json` beside the partition CSV.
#[derive(Debug, Clone)]
pub struct JsonSummaryConsumer {
    layout: OutputLayout,
}

impl JsonSummaryConsumer {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    pub fn path_for(&self, summary: &PartitionSummary) -> PathBuf {
        self.layout
            .summary_json(&summary.key.country, &summary.category_path)
    }
}

#[async_trait::async_trait]
impl AggregationConsumer for JsonSummaryConsumer {
    fn name(&self) -> &'static str {
        "json_summary"
    }

    async fn consume(&self, summary: &PartitionSummary) -> anyhow::Result<()> {
        let path = self.path_for(summary);
        let body = serde_json::to_vec_pretty(summary).context("serialize partition summary")?;
        write_file(&path, &body).await
    }
}

/// Persists a run report as `<root>/_runs/run_<UTC timestamp>.json` and returns its path.
pub async fn write_run_report<T: Serialize + Sync>(
    layout: &OutputLayout,
    report: &T,
) -> anyhow::Result<PathBuf> {
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    let path = layout.runs_dir().join(format!("run_{stamp}.json"));
    let body = serde_json::to_vec_pretty(report).context("serialize run report")?;
    write_file(&path, &body).await?;
    Ok(path)
}

pub async fn write_keyword_summary(
    layout: &OutputLayout,
    summary: &KeywordSummary,
) -> anyhow::Result<PathBuf> {
    let path = layout.keyword_summary_json(&summary.country, &summary.keyword);
    let body = serde_json::to_vec_pretty(summary).context("serialize keyword summary")?;
    write_file(&path, &body).await?;
    Ok(path)
}

async fn write_file(path: &std::path::Path, body: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create {}", parent.display()))?;
    }
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::{AggregationResult, PartitionKey};

    fn summary() -> PartitionSummary {
        PartitionSummary {
            key: PartitionKey::new("US", "11", 2),
            category_name: "Clothing".into(),
            category_path: vec!["1".into(), "11".into()],
            result: AggregationResult {
                latest_timestamp: "2025-06-30 00:00:00 UTC".into(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn json_consumer_writes_beside_partition_csv() {
        let dir = tempfile::tempdir().unwrap();
        let consumer = JsonSummaryConsumer::new(OutputLayout::new(dir.path()));
        consumer.consume(&summary()).await.unwrap();

        let path = dir.path().join("US/1/11/11_US.summary.json");
        let v: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(v["category_name"], "Clothing");
        assert_eq!(v["key"]["depth"], 2);
        assert_eq!(v["result"]["latest_timestamp"], "2025-06-30 00:00:00 UTC");
    }

    #[tokio::test]
    async fn run_report_lands_in_runs_dir() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        let path = write_run_report(&layout, &serde_json::json!({"partitions_ok": 3}))
            .await
            .unwrap();
        assert!(path.starts_with(dir.path().join("_runs")));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("run_") && name.ends_with(".json"));
    }
}
