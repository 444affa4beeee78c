use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::entry::TranscriptEntry;

/// Append-only JSONL transcript writer. One session, one file, one writer.
///
/// The file is created once at session start (replacing any stale file at the
/// same path) and only ever appended to afterwards. Every write is flushed
/// before returning so a crash mid-turn leaves a line-consistent log.
pub struct TranscriptWriter {
    path: PathBuf,
    file: Mutex<File>,
}

impl TranscriptWriter {
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        if path.exists() {
            warn!("Transcript {} already exists, removing it", path.display());
            std::fs::remove_file(&path)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!("Transcript created at {}", path.display());

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Append one entry as a self-contained JSON line and flush.
    pub fn write(&self, entry: &TranscriptEntry) -> io::Result<()> {
        let mut line = serde_json::to_string(entry).map_err(io::Error::other)?;
        line.push('\n');

        let mut file = self.file.lock();
        file.write_all(line.as_bytes())?;
        file.flush()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
