//! CSV sink for sampled rows.
//!
//! The output file is opened once per run and the header row is written
//! immediately. Rows are appended as they are accepted; [`CsvSink::flush`]
//! pushes buffered rows to disk so that a failing run keeps everything
//! written before the failure.

use crate::Result;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;
use wikisample_core::SampledRow;

/// Configuration for the CSV sink.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Write a leading `bot` column.
    pub include_bot: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self { include_bot: true }
    }
}

/// CSV writer owning the output file.
pub struct CsvSink {
    writer: csv::Writer<File>,
    path: PathBuf,
    config: SinkConfig,
    rows_written: usize,
}

impl CsvSink {
    /// Create (or truncate) the output file and write the header row.
    pub fn create(path: impl AsRef<Path>, config: SinkConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(SampledRow::header(config.include_bot))?;

        debug!(
            "CSV sink opened: path={}, include_bot={}",
            path.display(),
            config.include_bot
        );

        Ok(Self {
            writer,
            path,
            config,
            rows_written: 0,
        })
    }

    /// Append one row.
    pub fn write_row(&mut self, row: &SampledRow) -> Result<()> {
        self.writer
            .write_record(row.to_record(self.config.include_bot))?;
        self.rows_written += 1;
        Ok(())
    }

    /// Flush buffered rows to the file.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and close the file, returning the number of rows written.
    pub fn finish(mut self) -> Result<usize> {
        self.flush()?;
        Ok(self.rows_written)
    }

    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
