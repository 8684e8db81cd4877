// crates/store/src/learned.rs
//! Durable store for `<learnf>` categories: one JSON record per line,
//! appended as categories are learned and replayed at startup. Corrupt
//! lines are skipped with a warning, never fatal.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use parlance_engine::{LearnedCategory, LearnedSink};
use tracing::{debug, warn};

/// JSONL-backed learned-category store.
pub struct LearnedStore {
    path: PathBuf,
}

impl LearnedStore {
    /// Open (or prepare to create) the store at `path`. Parent
    /// directories are created eagerly so the first append cannot fail
    /// on a missing directory.
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every valid record back, skipping malformed lines.
    pub fn replay(&self) -> std::io::Result<Vec<LearnedCategory>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no learned store yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        let mut records = Vec::new();
        for (number, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<LearnedCategory>(line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(
                        path = %self.path.display(),
                        line = number + 1,
                        %err,
                        "skipping malformed learned record"
                    );
                }
            }
        }
        Ok(records)
    }
}

impl LearnedSink for LearnedStore {
    fn append(&self, record: &LearnedCategory) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let json = serde_json::to_string(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(file, "{json}")
    }
}
