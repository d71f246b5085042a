use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::PipelineError;
use crate::ingest::csv_source::{CsvRecordSource, RecordSource};
use crate::ingest::schema::RecordSchema;
use crate::storage::csv_sink::RowWriter;
use crate::storage::layout::{is_safe_component, OutputLayout};

#[derive(Debug, Clone, Default, Serialize)]
pub struct SplitSummary {
    pub files_read: usize,
    pub files_skipped: usize,
    pub rows_by_country: BTreeMap<String, u64>,
    pub rows_without_country: u64,
    pub rows_unreadable: u64,
}

impl SplitSummary {
    pub fn rows_written(&self) -> u64 {
        self.rows_by_country.values().sum()
    }
}

/// The first readable file's header becomes the header of every country file; other
/// headers are mapped onto it by column name.
pub fn split_by_country(inputs: &[PathBuf], layout: &OutputLayout) -> Result<SplitSummary, PipelineError> {
    let mut summary = SplitSummary::default();
    let mut target: Option<RecordSchema> = None;
    let mut writers: BTreeMap<String, RowWriter> = BTreeMap::new();

    for path in inputs {
        let stream = match CsvRecordSource.open_records(path) {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping unreadable export");
                summary.files_skipped += 1;
                continue;
            }
        };
        summary.files_read += 1;

        let schema = stream.schema().clone();
        let target = target.get_or_insert_with(|| (*schema).clone());
        let projection = schema.projection_onto(target);
        if !projection.is_identity() {
            tracing::info!(path = %path.display(), "export header differs from first file; mapping columns by name");
        }

        for item in stream {
            let row = match item {
                Ok(row) => row,
                Err(err) => {
                    tracing::debug!(path = %path.display(), error = %err, "unreadable row");
                    summary.rows_unreadable += 1;
                    continue;
                }
            };
            let Some(country) = row.record.ranking_country.as_deref() else {
                summary.rows_without_country += 1;
                continue;
            };
            if !is_safe_component(country) {
                tracing::debug!(country, "country code cannot be used as a directory name");
                summary.rows_without_country += 1;
                continue;
            }

            if !writers.contains_key(country) {
                let out = layout.country_csv(country);
                writers.insert(country.to_string(), RowWriter::create(&out, target.header())?);
            }
            if let Some(writer) = writers.get_mut(country) {
                writer.write(&projection.apply(&row.raw))?;
            }
        }
    }

    for (country, writer) in writers {
        let rows = writer.finish()?;
        summary.rows_by_country.insert(country, rows);
    }

    tracing::info!(
        files_read = summary.files_read,
        files_skipped = summary.files_skipped,
        countries = summary.rows_by_country.len(),
        rows_written = summary.rows_written(),
        rows_without_country = summary.rows_without_country,
        "split exports by country"
    );
    Ok(summary)
}

pub fn raw_exports(data_root: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    crate::ingest::csv_source::csv_files_in(data_root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_rows_per_country_with_first_header() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(
            data.path().join("a.csv"),
            "ranking_country,ranking_category,rank\nUS,1,1\nDE,2,4\n,3,9\nUS,2,2\n",
        )
        .unwrap();
        std::fs::write(
            data.path().join("b.csv"),
            "rank,ranking_country,extra\n7,DE,x\n",
        )
        .unwrap();

        let inputs = raw_exports(data.path()).unwrap();
        let layout = OutputLayout::new(out.path());
        let summary = split_by_country(&inputs, &layout).unwrap();

        assert_eq!(summary.files_read, 2);
        assert_eq!(summary.rows_by_country["US"], 2);
        assert_eq!(summary.rows_by_country["DE"], 2);
        assert_eq!(summary.rows_without_country, 1);

        let us = std::fs::read_to_string(layout.country_csv("US")).unwrap();
        assert_eq!(us, "ranking_country,ranking_category,rank\nUS,1,1\nUS,2,2\n");
        let de = std::fs::read_to_string(layout.country_csv("DE")).unwrap();
        assert_eq!(de, "ranking_country,ranking_category,rank\nDE,2,4\nDE,,7\n");
    }

    #[test]
    fn empty_export_is_skipped() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(data.path().join("a.csv"), "").unwrap();
        std::fs::write(data.path().join("b.csv"), "ranking_country\nFR\n").unwrap();

        let inputs = raw_exports(data.path()).unwrap();
        let summary = split_by_country(&inputs, &OutputLayout::new(out.path())).unwrap();
        assert_eq!(summary.files_skipped, 1);
        assert_eq!(summary.rows_by_country["FR"], 1);
    }

    #[test]
    fn path_like_country_codes_are_not_used_as_directories() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(data.path().join("a.csv"), "ranking_country\n../x\n_runs\n").unwrap();

        let inputs = raw_exports(data.path()).unwrap();
        let summary = split_by_country(&inputs, &OutputLayout::new(out.path())).unwrap();
        assert!(summary.rows_by_country.is_empty());
        assert_eq!(summary.rows_without_country, 2);
    }
}
