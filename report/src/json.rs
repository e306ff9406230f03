//! JSON export functionality

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use pipeline_bench_core::Summary;
use thiserror::Error;

/// Export failures
#[derive(Error, Debug)]
pub enum ReportError {
    /// The output file could not be written
    #[error("failed to write {path}: {source}")]
    Io {
        /// Destination path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The summary could not be serialized
    #[error("failed to serialize summary: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Write the summary as pretty-printed JSON, creating parent directories
pub fn export_json(summary: &Summary, path: impl AsRef<Path>) -> Result<(), ReportError> {
    let path = path.as_ref();
    let io_error = |source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }

    let file = File::create(path).map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, summary)?;
    writer.flush().map_err(io_error)
}
