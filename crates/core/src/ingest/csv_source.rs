use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv::StringRecord;

use crate::domain::record::{Categorized, RankingRecord};
use crate::error::PipelineError;
use crate::ingest::schema::RecordSchema;

/// A decoded row plus the raw cells it came from, so it can be written back unchanged.
#[derive(Debug, Clone)]
pub struct SourceRow {
    pub line: u64,
    pub raw: StringRecord,
    pub record: RankingRecord,
}

impl Categorized for SourceRow {
    fn category_code(&self) -> Option<&str> {
        self.record.ranking_category.as_deref()
    }
}

pub trait RecordSource {
    type Stream: Iterator<Item = Result<SourceRow, PipelineError>>;

    fn open_records(&self, path: &Path) -> Result<Self::Stream, PipelineError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvRecordSource;

impl RecordSource for CsvRecordSource {
    type Stream = RecordStream<BufReader<File>>;

    fn open_records(&self, path: &Path) -> Result<Self::Stream, PipelineError> {
        if !path.is_file() {
            return Err(PipelineError::missing_input(path, "file does not exist"));
        }
        let file = File::open(path)?;
        RecordStream::from_reader(BufReader::new(file), path)
    }
}

/// A row that cannot be read is yielded as `PartialRow` and iteration continues.
pub struct RecordStream<R: Read> {
    reader: csv::Reader<R>,
    schema: Arc<RecordSchema>,
    path: PathBuf,
    done: bool,
}

impl<R: Read> RecordStream<R> {
    pub fn from_reader(reader: R, path: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let path = path.into();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);
        let header = reader.headers()?.clone();
        if header.is_empty() || header.iter().all(|h| h.trim().is_empty()) {
            return Err(PipelineError::missing_input(path, "empty file"));
        }
        let schema = RecordSchema::from_header(header);
        if !schema.has_category_column() {
            tracing::warn!(path = %path.display(), "input has no ranking_category column; no row can be partitioned");
        }
        Ok(Self {
            reader,
            schema: Arc::new(schema),
            path,
            done: false,
        })
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<R: Read> Iterator for RecordStream<R> {
    type Item = Result<SourceRow, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut raw = StringRecord::new();
        match self.reader.read_record(&mut raw) {
            Ok(true) => {
                let line = raw.position().map(|p| p.line()).unwrap_or(0);
                let record = self.schema.decode(&raw);
                Some(Ok(SourceRow { line, raw, record }))
            }
            Ok(false) => {
                self.done = true;
                None
            }
            Err(err) => {
                if matches!(err.kind(), csv::ErrorKind::Io(_)) {
                    self.done = true;
                    return Some(Err(err.into()));
                }
                let line = err.position().map(|p| p.line()).unwrap_or(0);
                Some(Err(PipelineError::PartialRow {
                    line,
                    reason: err.to_string(),
                }))
            }
        }
    }
}

pub fn country_inputs(country_dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    csv_files_in(country_dir)
}

/// `*.csv` files directly inside `dir` (no recursion), sorted by name.
pub fn csv_files_in(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    if !dir.is_dir() {
        return Err(PipelineError::missing_input(dir, "directory does not exist"));
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if path.is_file() && is_csv {
            files.push(path);
        }
    }
    if files.is_empty() {
        return Err(PipelineError::missing_input(dir, "no .csv files"));
    }
    files.sort();
    Ok(files)
}
