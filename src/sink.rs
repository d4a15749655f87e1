//! Document sinks – the host's "save bytes under this name" capability.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tempfile::NamedTempFile;

use crate::error::{ExportError, Result};

/// Where finished documents go.
pub trait DocumentSink: Send + Sync {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<()>;
}

/// Writes documents into a directory, creating it if necessary.
///
/// Each document is written to a temporary file in the same directory and
/// renamed into place, so a failed save never leaves a partial file behind.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

}

impl DocumentSink for DirectorySink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
        // Only the final component is honoured so a name cannot escape `dir`.
        let name = Path::new(file_name)
            .file_name()
            .ok_or_else(|| ExportError::Emit(format!("invalid file name {file_name:?}")))?;
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        log::info!("wrote '{}' ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

/// Keeps saved documents in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(file_name, bytes)` saved so far, in save order.
    pub fn files(&self) -> Vec<(String, Vec<u8>)> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DocumentSink for MemorySink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((file_name.to_string(), bytes.to_vec()));
        Ok(())
    }
}
