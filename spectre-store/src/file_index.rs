//! File-index sidecar: a small persisted map from hour-file path to summary
//! metadata, rebuildable by scanning the data directory (spec.md §4.1 "File
//! close and restart", §6 "File-index sidecar").

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::StoreResult;
use crate::footer::Footer;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FileMetadata {
    pub hour_start: i64,
    pub hour_end: i64,
    pub timestamp_min: i64,
    pub timestamp_max: i64,
    pub event_count: u64,
    pub file_size: u64,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FileIndex {
    files: HashMap<String, FileMetadata>,
}

const SIDECAR_NAME: &str = ".spectre-file-index.bin";

impl FileIndex {
    pub fn get(&self, path: &str) -> Option<&FileMetadata> {
        self.files.get(path)
    }

    pub fn insert(&mut self, path: String, meta: FileMetadata) {
        self.files.insert(path, meta);
    }

    pub fn remove(&mut self, path: &str) {
        self.files.remove(path);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FileMetadata)> {
        self.files.iter()
    }

    pub fn save(&self, data_dir: &Path) -> StoreResult<()> {
        let bytes = rmp_serde::to_vec_named(self).map_err(|e| crate::errors::StoreError::Corruption(e.to_string()))?;
        std::fs::write(data_dir.join(SIDECAR_NAME), bytes)?;
        Ok(())
    }

    /// Loads the sidecar if present; otherwise rebuilds it by reading the
    /// footer of every `.bin` file in `data_dir`. A file with no footer (a
    /// crash mid-write) is skipped with a warning rather than failing the
    /// whole rebuild.
    pub fn load_or_rebuild(data_dir: &Path) -> StoreResult<Self> {
        let sidecar_path = data_dir.join(SIDECAR_NAME);
        if let Ok(bytes) = std::fs::read(&sidecar_path) {
            if let Ok(index) = rmp_serde::from_slice::<FileIndex>(&bytes) {
                return Ok(index);
            }
            warn!("file index sidecar at {} is corrupt, rebuilding from directory scan", sidecar_path.display());
        }
        Self::rebuild(data_dir)
    }

    pub fn rebuild(data_dir: &Path) -> StoreResult<Self> {
        let mut index = FileIndex::default();
        let Ok(entries) = std::fs::read_dir(data_dir) else {
            return Ok(index);
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("bin") {
                continue;
            }
            let Ok(mut file) = std::fs::File::open(&path) else { continue };
            let path_str = path.to_string_lossy().to_string();
            match Footer::read(&mut file, &path_str) {
                Ok((_, section)) => {
                    let file_size = entry.metadata().map(|m| m.len()).unwrap_or_default();
                    let timestamp_min = section.blocks.iter().map(|b| b.timestamp_min).min().unwrap_or(0);
                    let timestamp_max = section.blocks.iter().map(|b| b.timestamp_max).max().unwrap_or(0);
                    let event_count = section.blocks.iter().map(|b| b.event_count as u64).sum();
                    if let Some(label) = hour_label_from_path(&path) {
                        if let Some(bucket) = spectre_core::time::hour_bucket_from_label(&label) {
                            index.insert(
                                path_str,
                                FileMetadata {
                                    hour_start: bucket.start_ns,
                                    hour_end: bucket.end_ns,
                                    timestamp_min,
                                    timestamp_max,
                                    event_count,
                                    file_size,
                                },
                            );
                        }
                    }
                },
                Err(e) => {
                    warn!("skipping {} while rebuilding file index: {e}", path.display());
                },
            }
        }
        info!("rebuilt file index with {} entries from {}", index.files.len(), data_dir.display());
        Ok(index)
    }
}

fn hour_label_from_path(path: &Path) -> Option<String> {
    path.file_stem()?.to_str().map(str::to_string)
}

pub fn hour_file_path(data_dir: &Path, label: &str) -> PathBuf {
    data_dir.join(format!("{label}.bin"))
}
