use std::fs::{File, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use csv::StringRecord;

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Overwrite,
    Append,
}

/// Streaming CSV writer for one output file. The header goes out when the file is opened;
/// rows are written verbatim as they arrive.
pub struct RowWriter {
    writer: csv::Writer<BufWriter<File>>,
    path: PathBuf,
    rows: u64,
}

impl RowWriter {
    pub fn create(path: &Path, header: &StringRecord) -> Result<Self, PipelineError> {
        Self::open(path, header, WriteMode::Overwrite)
    }

    pub fn open(path: &Path, header: &StringRecord, mode: WriteMode) -> Result<Self, PipelineError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let (file, needs_header) = match mode {
            WriteMode::Overwrite => (File::create(path)?, true),
            WriteMode::Append => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                let empty = file.metadata()?.len() == 0;
                (file, empty)
            }
        };
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(file));
        if needs_header {
            writer.write_record(header)?;
        }
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            rows: 0,
        })
    }

    pub fn write(&mut self, row: &StringRecord) -> Result<(), PipelineError> {
        self.writer.write_record(row)?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes and returns the number of data rows written.
    pub fn finish(mut self) -> Result<u64, PipelineError> {
        self.writer.flush()?;
        Ok(self.rows)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvRecordSink;

impl CsvRecordSink {
    /// Creates parent directories as needed. Returns the number of rows written.
    pub fn write_records<'r, I>(
        &self,
        path: &Path,
        header: &StringRecord,
        records: I,
        mode: WriteMode,
    ) -> Result<u64, PipelineError>
    where
        I: IntoIterator<Item = &'r StringRecord>,
    {
        let mut writer = RowWriter::open(path, header, mode)?;
        for row in records {
            writer.write(row)?;
        }
        writer.finish()
    }
}
