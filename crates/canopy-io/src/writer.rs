//! Report file writer.

use std::fs;
use std::path::Path;

use tracing::{info, instrument};

use crate::TableError;

/// Writes rendered reports to disk.
///
/// Takes already-rendered text, so it has no dependency on `canopy-forest`.
/// Missing parent directories are created.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportWriter;

impl ReportWriter {
    pub fn new() -> Self {
        Self
    }

    /// Write Graphviz DOT text to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::WriteFile`] if the directory or file cannot be written.
    #[instrument(skip(self, dot), fields(path = %path.display(), bytes = dot.len()))]
    pub fn write_dot(&self, path: &Path, dot: &str) -> Result<(), TableError> {
        self.write(path, dot)?;
        info!("tree written");
        Ok(())
    }

    /// Write a JSON summary to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::WriteFile`] if the directory or file cannot be written.
    #[instrument(skip(self, json), fields(path = %path.display()))]
    pub fn write_json(&self, path: &Path, json: &str) -> Result<(), TableError> {
        self.write(path, json)?;
        info!("summary written");
        Ok(())
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), TableError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| TableError::WriteFile {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        fs::write(path, contents).map_err(|e| TableError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
