//! Loading stored simulation runs.
//!
//! Runs are persisted as JSON, either as one file holding an array of
//! records or as a directory of record files. Each file in a directory
//! may hold a single record or an array of them.

use crate::models::SimulationRecord;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Errors raised by the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to traverse record directory: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Source of persisted simulation runs.
pub trait RecordStore {
    /// Every stored run, ordered by id.
    fn load_all(&self) -> StoreResult<Vec<SimulationRecord>>;

    /// Delete a run by id. Returns `false` when no run had that id.
    fn delete(&self, id: &str) -> StoreResult<bool>;
}

/// Record store backed by JSON on disk.
pub struct JsonRecordStore {
    root: PathBuf,
    show_progress: bool,
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum RecordFile {
    Many(Vec<SimulationRecord>),
    One(Box<SimulationRecord>),
}

impl RecordFile {
    fn into_records(self) -> Vec<SimulationRecord> {
        match self {
            RecordFile::Many(records) => records,
            RecordFile::One(record) => vec![*record],
        }
    }
}

impl JsonRecordStore {
    /// Open a store rooted at a JSON file or a directory.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        if !root.exists() {
            return Err(StoreError::NotFound(root));
        }
        Ok(Self {
            root,
            show_progress: false,
        })
    }

    /// Show a progress bar while loading a directory.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn read_file(path: &Path) -> StoreResult<Vec<SimulationRecord>> {
        let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed: RecordFile =
            serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(parsed.into_records())
    }

    fn write_file(path: &Path, records: &[SimulationRecord]) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(records).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn record_files(&self) -> StoreResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            // Prune hidden files and directories below the root
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

impl RecordStore for JsonRecordStore {
    fn load_all(&self) -> StoreResult<Vec<SimulationRecord>> {
        let mut records = if self.root.is_file() {
            Self::read_file(&self.root)?
        } else {
            let files = self.record_files()?;
            let pb = self.progress_bar(files.len());
            let mut records = Vec::new();

            for path in &files {
                pb.set_message(
                    path.file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default(),
                );
                match Self::read_file(path) {
                    Ok(mut loaded) => {
                        debug!("Loaded {} record(s) from {}", loaded.len(), path.display());
                        records.append(&mut loaded);
                    }
                    Err(e) => warn!("Skipping {}", e),
                }
                pb.inc(1);
            }
            pb.finish_and_clear();
            records
        };

        records.sort_by(|a, b| a.id.cmp(&b.id));
        info!("Loaded {} simulation record(s) from {}", records.len(), self.root.display());
        Ok(records)
    }

    fn delete(&self, id: &str) -> StoreResult<bool> {
        let files = if self.root.is_file() {
            vec![self.root.clone()]
        } else {
            self.record_files()?
        };

        for path in files {
            let Ok(records) = Self::read_file(&path) else {
                continue;
            };
            if !records.iter().any(|r| r.id == id) {
                continue;
            }

            let remaining: Vec<_> = records.into_iter().filter(|r| r.id != id).collect();
            if remaining.is_empty() && path != self.root {
                fs::remove_file(&path).map_err(|source| StoreError::Io {
                    path: path.clone(),
                    source,
                })?;
            } else {
                Self::write_file(&path, &remaining)?;
            }
            info!("Deleted record {} from {}", id, path.display());
            return Ok(true);
        }

        Ok(false)
    }
}
