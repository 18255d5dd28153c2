//! Filesystem sink for emitted artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use core_ir::Result;
use tracing::info;

/// Writes emitted files under one output directory, creating it on demand.
#[derive(Debug, Clone)]
pub struct FileSink {
    out_dir: PathBuf,
}

impl FileSink {
    pub fn new(out_dir: impl Into<PathBuf>) -> Result<FileSink> {
        let out_dir = out_dir.into();
        fs::create_dir_all(&out_dir)?;
        Ok(FileSink { out_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.out_dir.join(name)
    }

    /// Write one artifact; returns its full path.
    pub fn write(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.path_of(name);
        fs::write(&path, content)?;
        info!(target: "emit.files", path = %path.display(), bytes = content.len(), "artifact_written");
        Ok(path)
    }
}
