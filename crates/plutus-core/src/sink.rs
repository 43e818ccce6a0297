//! Append-only delimited file sink.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::SinkConfig;
use crate::error::AppError;
use crate::models::{FIELD_NAMES, InstrumentRecord};

/// Fixed-schema CSV file that only ever grows.
///
/// The header row is written only when the file does not exist yet or is empty;
/// existing rows are never rewritten or truncated.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &SinkConfig) -> Self {
        Self::new(config.path.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `records` in order and returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::SinkError`] if the file cannot be opened or written.
    pub fn append(&self, records: &[InstrumentRecord]) -> Result<usize, AppError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;
        if !needs_header {
            terminate_last_line(&mut file)?;
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer.write_record(FIELD_NAMES)?;
        }
        for record in records {
            writer.write_record(record.to_row())?;
        }
        writer.flush()?;

        tracing::debug!(
            path = %self.path.display(),
            rows = records.len(),
            header = needs_header,
            "Appended rows to file sink"
        );

        Ok(records.len())
    }
}

/// Adds a line break if the file does not already end with one, so the next row
/// starts on its own line.
fn terminate_last_line(file: &mut File) -> std::io::Result<()> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    if last[0] != b'\n' {
        file.write_all(b"\n")?;
    }
    Ok(())
}
