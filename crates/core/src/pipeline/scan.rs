use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::analytics::RankingAggregator;
use crate::domain::record::RankingRecord;
use crate::domain::report::AggregationResult;
use crate::error::PipelineError;
use crate::ingest::csv_source::{CsvRecordSource, RecordSource};
use crate::ingest::schema::RecordSchema;
use crate::partition::RowFilter;
use crate::storage::csv_sink::RowWriter;

#[derive(Debug)]
pub struct CountryInputs {
    pub country: String,
    pub files: Vec<PathBuf>,
    pub schema: RecordSchema,
    pub present: HashSet<String>,
    pub rows: u64,
}

pub fn survey_country(country: &str, files: Vec<PathBuf>) -> Result<CountryInputs, PipelineError> {
    let mut schema: Option<RecordSchema> = None;
    let mut present = HashSet::new();
    let mut rows = 0u64;
    let mut readable = Vec::with_capacity(files.len());

    for path in files {
        let stream = match CsvRecordSource.open_records(&path) {
            Ok(stream) => stream,
            Err(err) if err.is_skip() => {
                tracing::warn!(%country, path = %path.display(), error = %err, "skipping empty input");
                continue;
            }
            Err(err) => return Err(err),
        };
        if schema.is_none() {
            schema = Some((**stream.schema()).clone());
        }
        for item in stream {
            match item {
                Ok(row) => {
                    rows += 1;
                    if let Some(code) = row.record.ranking_category {
                        present.insert(code);
                    }
                }
                Err(PipelineError::PartialRow { .. }) => rows += 1,
                Err(err) => return Err(err),
            }
        }
        readable.push(path);
    }

    let Some(schema) = schema else {
        return Err(PipelineError::missing_input(
            country,
            "no readable input files for country",
        ));
    };
    Ok(CountryInputs {
        country: country.to_string(),
        files: readable,
        schema,
        present,
        rows,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartitionStats {
    pub rows_scanned: u64,
    pub rows_matched: u64,
    /// Unreadable rows plus, for category partitions, rows without a category code.
    pub rows_dropped: u64,
    pub malformed_numbers: usize,
    /// The country holds no record this filter can match, so the inputs were not read.
    pub scan_skipped: bool,
}

pub struct PartitionJob {
    pub inputs: Arc<CountryInputs>,
    pub filter: Arc<RowFilter>,
    /// `None` computes without writing.
    pub output: Option<PathBuf>,
}

pub fn scan_partition(
    job: &PartitionJob,
    aggregator: &RankingAggregator,
) -> Result<(AggregationResult, PartitionStats), PipelineError> {
    let inputs = &job.inputs;
    let target = inputs.schema.header();
    let mut writer = match &job.output {
        Some(path) => Some(RowWriter::create(path, target)?),
        None => None,
    };
    let mut stats = PartitionStats::default();
    let mut records: Vec<RankingRecord> = Vec::new();

    if !job.filter.may_match(&inputs.present) {
        stats.scan_skipped = true;
    } else {
        for path in &inputs.files {
            let stream = CsvRecordSource.open_records(path)?;
            let projection = stream.schema().projection_onto(&inputs.schema);
            for item in stream {
                let row = match item {
                    Ok(row) => row,
                    Err(err @ PipelineError::PartialRow { .. }) => {
                        tracing::trace!(path = %path.display(), error = %err, "dropping unreadable row");
                        stats.rows_scanned += 1;
                        stats.rows_dropped += 1;
                        continue;
                    }
                    Err(err) => return Err(err),
                };
                stats.rows_scanned += 1;
                if job.filter.needs_category() && row.record.ranking_category.is_none() {
                    stats.rows_dropped += 1;
                    continue;
                }
                if !job.filter.matches(&row.record) {
                    continue;
                }
                stats.rows_matched += 1;
                if let Some(writer) = writer.as_mut() {
                    writer.write(&projection.apply(&row.raw))?;
                }
                records.push(row.record);
            }
        }
    }

    if let Some(writer) = writer {
        writer.finish()?;
    }
    let result = aggregator.aggregate(&records);
    stats.malformed_numbers = result.malformed_numbers;
    Ok((result, stats))
}
