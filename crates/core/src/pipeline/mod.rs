pub mod keyword;
pub mod scan;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;

use crate::analytics::RankingAggregator;
use crate::domain::category::CategoryTree;
use crate::domain::report::{PartitionKey, PartitionSummary};
use crate::error::PipelineError;
use crate::ingest::csv_source::country_inputs;
use crate::partition::{Partitioner, RowFilter};
use crate::storage::layout::OutputLayout;
use crate::storage::summary::{AggregationConsumer, JsonSummaryConsumer};

pub use keyword::{run_keyword, KeywordOutcome};
pub use scan::{CountryInputs, PartitionJob, PartitionStats};

const DEFAULT_CONCURRENCY: usize = 4;
const PROGRESS_EVERY: usize = 50;

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Restrict to these countries; all country directories otherwise.
    pub countries: Option<Vec<String>>,
    /// Restrict to these depths; `1..=max_depth` otherwise.
    pub depths: Option<Vec<u32>>,
    /// Process only this category node. Overrides `depths`.
    pub category: Option<String>,
    pub concurrency: usize,
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            countries: None,
            depths: None,
            category: None,
            concurrency: DEFAULT_CONCURRENCY,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PartitionOutcome {
    pub key: PartitionKey,
    pub category_name: String,
    pub stats: PartitionStats,
    pub output: Option<PathBuf>,
    pub error: Option<String>,
}

impl PartitionOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedCountry {
    pub country: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub partitions_ok: usize,
    pub partitions_failed: usize,
    pub countries_skipped: Vec<SkippedCountry>,
    pub unknown_categories: Vec<String>,
    pub outcomes: Vec<PartitionOutcome>,
}

impl RunReport {
    fn new(dry_run: bool) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            partitions_ok: 0,
            partitions_failed: 0,
            countries_skipped: Vec::new(),
            unknown_categories: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    fn record(&mut self, outcome: PartitionOutcome) {
        if outcome.is_ok() {
            self.partitions_ok += 1;
        } else {
            self.partitions_failed += 1;
        }
        self.outcomes.push(outcome);
    }

    fn skip_country(&mut self, country: &str, err: &PipelineError) {
        tracing::warn!(%country, error = %err, "skipping country");
        self.countries_skipped.push(SkippedCountry {
            country: country.to_string(),
            reason: err.to_string(),
        });
    }

    pub fn failures(&self) -> impl Iterator<Item = &PartitionOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    pub fn rows_dropped(&self) -> u64 {
        self.outcomes.iter().map(|o| o.stats.rows_dropped).sum()
    }

    pub fn malformed_numbers(&self) -> usize {
        self.outcomes.iter().map(|o| o.stats.malformed_numbers).sum()
    }
}

#[derive(Debug, Clone)]
struct Target {
    code: String,
    filter: Arc<RowFilter>,
    name: String,
    depth: u32,
    path: Vec<String>,
}

pub struct Orchestrator {
    tree: Arc<CategoryTree>,
    layout: OutputLayout,
    consumer: Arc<dyn AggregationConsumer>,
    aggregator: RankingAggregator,
}

impl Orchestrator {
    /// Summaries go to JSON files beside each partition CSV unless another consumer is set.
    pub fn new(tree: Arc<CategoryTree>, layout: OutputLayout) -> Self {
        let consumer = Arc::new(JsonSummaryConsumer::new(layout.clone()));
        Self {
            tree,
            layout,
            consumer,
            aggregator: RankingAggregator::default(),
        }
    }

    pub fn with_consumer(mut self, consumer: Arc<dyn AggregationConsumer>) -> Self {
        self.consumer = consumer;
        self
    }

    pub fn with_aggregator(mut self, aggregator: RankingAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub async fn run(&self, opts: &RunOptions) -> anyhow::Result<RunReport> {
        anyhow::ensure!(opts.concurrency >= 1, "concurrency must be >= 1");
        let mut report = RunReport::new(opts.dry_run);

        let targets = self.targets(opts, &mut report);
        let countries = self.countries(opts, &mut report)?;
        let sem = Arc::new(Semaphore::new(opts.concurrency));

        let surveyed = self.survey(countries, &sem, &mut report).await?;

        let total = surveyed.len() * targets.len();
        tracing::info!(
            countries = surveyed.len(),
            categories = targets.len(),
            total,
            concurrency = opts.concurrency,
            dry_run = opts.dry_run,
            "partition run starting"
        );

        let mut handles = Vec::with_capacity(total);
        for inputs in &surveyed {
            for target in &targets {
                let key = PartitionKey::new(&inputs.country, &target.code, target.depth);
                let output = (!opts.dry_run)
                    .then(|| self.layout.partition_csv(&inputs.country, &target.path));
                let job = PartitionJob {
                    inputs: Arc::clone(inputs),
                    filter: Arc::clone(&target.filter),
                    output: output.clone(),
                };
                let summary_head = (key.clone(), target.name.clone(), target.path.clone());
                let consumer = (!opts.dry_run).then(|| Arc::clone(&self.consumer));
                let aggregator = self.aggregator;

                let permit = Arc::clone(&sem)
                    .acquire_owned()
                    .await
                    .context("partition pool closed")?;
                let handle = tokio::spawn(async move {
                    let _permit = permit;
                    run_job(job, aggregator, summary_head, output, consumer).await
                });
                handles.push((key, target.name.clone(), handle));
            }
        }

        for (idx, (key, category_name, handle)) in handles.into_iter().enumerate() {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(err) => PartitionOutcome {
                    key,
                    category_name,
                    stats: PartitionStats::default(),
                    output: None,
                    error: Some(format!("partition task panicked: {err}")),
                },
            };
            if let Some(error) = &outcome.error {
                tracing::error!(partition = %outcome.key, %error, "partition failed");
            }
            report.record(outcome);

            let n = idx + 1;
            if n == 1 || n == total || n % PROGRESS_EVERY == 0 {
                tracing::info!(
                    processed = n,
                    total,
                    failures = report.partitions_failed,
                    "partition progress"
                );
            }
        }

        report.finished_at = Some(Utc::now());
        tracing::info!(
            partitions_ok = report.partitions_ok,
            partitions_failed = report.partitions_failed,
            countries_skipped = report.countries_skipped.len(),
            rows_dropped = report.rows_dropped(),
            malformed_numbers = report.malformed_numbers(),
            "partition run finished"
        );
        Ok(report)
    }

    fn targets(&self, opts: &RunOptions, report: &mut RunReport) -> Vec<Target> {
        let partitioner = Partitioner::new(&self.tree);
        let nodes = match &opts.category {
            Some(code) => match self.tree.find_or_err(code) {
                Ok(node) => vec![node],
                Err(err) => {
                    tracing::warn!(error = %err, "requested category skipped");
                    report.unknown_categories.push(code.clone());
                    Vec::new()
                }
            },
            None => {
                let mut depths = opts
                    .depths
                    .clone()
                    .unwrap_or_else(|| (1..=self.tree.max_depth()).collect());
                depths.sort_unstable();
                depths.dedup();
                let mut nodes = Vec::new();
                for depth in depths {
                    let at = self.tree.nodes_at_depth(depth);
                    if at.is_empty() {
                        tracing::warn!(depth, max_depth = self.tree.max_depth(), "no categories at depth");
                    }
                    nodes.extend(at);
                }
                nodes
            }
        };

        nodes
            .into_iter()
            .map(|node| Target {
                code: node.code.clone(),
                filter: Arc::new(partitioner.selector(node).into()),
                name: node.name.clone(),
                depth: node.depth,
                path: self
                    .tree
                    .path_to(&node.code)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|n| n.code.clone())
                    .collect(),
            })
            .collect()
    }

    fn countries(&self, opts: &RunOptions, report: &mut RunReport) -> anyhow::Result<Vec<String>> {
        let Some(requested) = &opts.countries else {
            return self
                .layout
                .countries()
                .with_context(|| format!("list countries under {}", self.layout.root().display()));
        };
        let mut out = Vec::with_capacity(requested.len());
        for country in requested {
            let dir = self.layout.country_dir(country);
            if dir.is_dir() {
                out.push(country.clone());
            } else {
                report.skip_country(
                    country,
                    &PipelineError::missing_input(dir, "no country directory"),
                );
            }
        }
        Ok(out)
    }

    async fn survey(
        &self,
        countries: Vec<String>,
        sem: &Arc<Semaphore>,
        report: &mut RunReport,
    ) -> anyhow::Result<Vec<Arc<CountryInputs>>> {
        let mut handles = Vec::with_capacity(countries.len());
        for country in countries {
            let files = match country_inputs(&self.layout.country_dir(&country)) {
                Ok(files) => files,
                Err(err) => {
                    report.skip_country(&country, &err);
                    continue;
                }
            };
            let permit = Arc::clone(sem)
                .acquire_owned()
                .await
                .context("partition pool closed")?;
            let c = country.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                scan::survey_country(&c, files)
            });
            handles.push((country, handle));
        }

        let mut surveyed = Vec::with_capacity(handles.len());
        for (country, handle) in handles {
            match handle.await.context("join survey task failed")? {
                Ok(inputs) => {
                    tracing::info!(
                        %country,
                        files = inputs.files.len(),
                        rows = inputs.rows,
                        categories_present = inputs.present.len(),
                        "surveyed country inputs"
                    );
                    surveyed.push(Arc::new(inputs));
                }
                Err(err) => report.skip_country(&country, &err),
            }
        }
        Ok(surveyed)
    }
}

async fn run_job(
    job: PartitionJob,
    aggregator: RankingAggregator,
    (key, category_name, category_path): (PartitionKey, String, Vec<String>),
    output: Option<PathBuf>,
    consumer: Option<Arc<dyn AggregationConsumer>>,
) -> PartitionOutcome {
    let mut outcome = PartitionOutcome {
        key: key.clone(),
        category_name: category_name.clone(),
        stats: PartitionStats::default(),
        output,
        error: None,
    };

    let scanned = tokio::task::spawn_blocking(move || scan::scan_partition(&job, &aggregator)).await;
    let (result, stats) = match scanned {
        Ok(Ok(done)) => done,
        Ok(Err(err)) => {
            outcome.error = Some(err.to_string());
            return outcome;
        }
        Err(err) => {
            outcome.error = Some(format!("scan task panicked: {err}"));
            return outcome;
        }
    };
    outcome.stats = stats;
    tracing::debug!(
        partition = %key,
        rows_matched = outcome.stats.rows_matched,
        scan_skipped = outcome.stats.scan_skipped,
        "partition aggregated"
    );

    if let Some(consumer) = consumer {
        let summary = PartitionSummary {
            key,
            category_name,
            category_path,
            result,
        };
        if let Err(err) = consumer.consume(&summary).await {
            outcome.error = Some(format!("{} consumer: {err:#}", consumer.name()));
        }
    }
    outcome
}
