pub mod csv;


use karma_core::{CoreError, ExportError, PostRecord};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Destination for the final row set.
pub trait RecordSink {
    /// Persist `records`, returning where they went.
    fn write_records(&mut self, records: &[PostRecord]) -> Result<PathBuf, CoreError>;
}

/// Writes records as one delimited text file with a header row.
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    path: PathBuf,
    separator: char,
}

impl CsvFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            separator: csv::DEFAULT_SEPARATOR,
        }
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_file(&self, records: &[PostRecord]) -> std::io::Result<()> {
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);

        csv::write_header(&mut writer, self.separator)?;
        for record in records {
            csv::write_row(&mut writer, &csv::record_cells(record), self.separator)?;
        }
        writer.flush()
    }
}

impl RecordSink for CsvFileSink {
    fn write_records(&mut self, records: &[PostRecord]) -> Result<PathBuf, CoreError> {
        let path_display = self.path.display().to_string();

        if records.is_empty() {
            return Err(ExportError::EmptyDataset { path: path_display }.into());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| ExportError::CreateDirectory {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
        }

        debug!("Writing {} rows to {}", records.len(), path_display);
        self.write_file(records)
            .map_err(|source| ExportError::Write {
                path: path_display.clone(),
                source,
            })?;

        info!("Saved dataset to {}", path_display);
        Ok(self.path.clone())
    }
}
