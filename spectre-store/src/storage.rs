//! Storage coordinator: owns all open hour-files, dispatches writes and
//! queries to them, and runs retention. Mirrors the manager pattern the
//! teacher uses for its trace manager — an `Arc<Mutex<_>>`-guarded resource
//! reached through a thin async API, with background maintenance as a
//! separate task rather than folded into the write path.

use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use clockabilly::{Clockable, UtcClock};
use metrics::counter;
use serde::Serialize;
use spectre_core::errors::EmptyResult;
use spectre_core::time::hour_bucket;
use spectre_types::{Event, ResourceLastState};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::compression::CodecRegistry;
use crate::config::StoreConfig;
use crate::errors::{StoreError, StoreResult};
use crate::file_index::{hour_file_path, FileIndex, FileMetadata};
use crate::footer::Footer;
use crate::hour_file::{filter_non_deleted, query_blocks, synthesize_state_events, HourFile, QueryFilter};

pub type WriteCallback = Box<dyn Fn(&Event) -> EmptyResult + Send + Sync>;

/// On-disk summary for operator inspection (`spectre store stats`).
#[derive(Clone, Debug, Default, Serialize)]
pub struct StoreStats {
    pub file_count: usize,
    pub open_files: usize,
    pub total_events: u64,
    pub total_bytes: u64,
}

pub struct Storage {
    config: StoreConfig,
    codecs: Arc<CodecRegistry>,
    clock: Box<dyn Clockable + Send + Sync>,
    open_files: RwLock<HashMap<String, Arc<Mutex<HourFile>>>>,
    last_activity: RwLock<HashMap<String, i64>>,
    file_index: RwLock<FileIndex>,
    callbacks: RwLock<Vec<WriteCallback>>,
}

impl Storage {
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        Self::with_clock(config, Box::new(UtcClock))
    }

    pub fn with_clock(config: StoreConfig, clock: Box<dyn Clockable + Send + Sync>) -> StoreResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let file_index = FileIndex::load_or_rebuild(&config.data_dir)?;
        Ok(Storage {
            config,
            codecs: Arc::new(CodecRegistry::default()),
            clock,
            open_files: RwLock::new(HashMap::new()),
            last_activity: RwLock::new(HashMap::new()),
            file_index: RwLock::new(file_index),
            callbacks: RwLock::new(Vec::new()),
        })
    }

    pub async fn register_callback(&self, cb: WriteCallback) {
        self.callbacks.write().await.push(cb);
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Routes `event` to its hour-file, opening/creating it (with carryover
    /// state computed from the previous hour) if needed, per spec.md §4.1
    /// "Write path".
    pub async fn write_event(&self, event: Event) -> StoreResult<()> {
        let bucket = hour_bucket(event.timestamp);
        let hf = self.get_or_open(&bucket.label, event.timestamp).await?;

        {
            let mut file = hf.lock().await;
            file.write_event(event.clone())?;
        }
        counter!("spectre_store_events_written_total").increment(1);
        self.last_activity.write().await.insert(bucket.label.clone(), self.clock.now_ts());

        let callbacks = self.callbacks.read().await;
        for cb in callbacks.iter() {
            if let Err(e) = cb(&event) {
                warn!("write callback failed for event {}: {e}", event.id);
            }
        }
        Ok(())
    }

    async fn get_or_open(&self, label: &str, ts: i64) -> StoreResult<Arc<Mutex<HourFile>>> {
        if let Some(hf) = self.open_files.read().await.get(label) {
            return Ok(hf.clone());
        }

        let mut open_files = self.open_files.write().await;
        if let Some(hf) = open_files.get(label) {
            return Ok(hf.clone());
        }

        let bucket = hour_bucket(ts);
        let path = hour_file_path(&self.config.data_dir, label);
        let mut hf = if path.exists() {
            HourFile::open_restored(bucket.clone(), path.clone(), self.codecs.clone())?
        } else {
            HourFile::open_new(bucket.clone(), path.clone(), self.codecs.clone())?
        };

        let carryover = self.carryover_states(&open_files, &bucket.prev().label).await?;
        hf.set_initial_resource_states(carryover);

        let arc = Arc::new(Mutex::new(hf));
        open_files.insert(label.to_string(), arc.clone());
        Ok(arc)
    }

    /// Final states of the preceding hour, filtered to non-deleted
    /// resources: from the open hour-file if still resident, else read from
    /// its on-disk index section if it exists.
    async fn carryover_states(
        &self,
        open_files: &HashMap<String, Arc<Mutex<HourFile>>>,
        prev_label: &str,
    ) -> StoreResult<HashMap<String, ResourceLastState>> {
        if let Some(prev) = open_files.get(prev_label) {
            let prev = prev.lock().await;
            return Ok(filter_non_deleted(prev.final_resource_states()));
        }

        let prev_path = hour_file_path(&self.config.data_dir, prev_label);
        if !prev_path.exists() {
            return Ok(HashMap::new());
        }
        let mut file = File::open(&prev_path)?;
        match Footer::read(&mut file, &prev_path.to_string_lossy()) {
            Ok((_, index)) => Ok(filter_non_deleted(index.final_resource_states)),
            Err(StoreError::NoFooter(_)) => Ok(HashMap::new()),
            Err(e) => Err(e),
        }
    }

    /// Answers a time-window + filter query by merging results from every
    /// hour-file overlapping the window, open or on disk (spec.md §4.1 "Read
    /// path").
    pub async fn query_events(&self, start_ns: i64, end_ns: i64, filter: QueryFilter<'_>) -> StoreResult<Vec<Event>> {
        let mut out = Vec::new();
        let mut bucket = hour_bucket(start_ns);
        loop {
            if bucket.start_ns >= end_ns {
                break;
            }
            out.extend(self.query_hour(&bucket, start_ns, end_ns, &filter).await?);
            bucket = bucket.next();
        }
        out.sort_by_key(|ev| ev.timestamp);
        Ok(out)
    }

    async fn query_hour(&self, bucket: &spectre_core::time::HourBucket, start_ns: i64, end_ns: i64, filter: &QueryFilter<'_>) -> StoreResult<Vec<Event>> {
        if let Some(hf) = self.open_files.read().await.get(&bucket.label) {
            let hf = hf.lock().await;
            return hf.query(start_ns, end_ns, filter);
        }

        let path = hour_file_path(&self.config.data_dir, &bucket.label);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut file = File::open(&path)?;
        let index = match Footer::read(&mut file, &path.to_string_lossy()) {
            Ok((_, index)) => index,
            Err(StoreError::NoFooter(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut out = query_blocks(&path, &index, &self.codecs, start_ns, end_ns, filter)?;

        let open_files = self.open_files.read().await;
        let carryover = self.carryover_states(&open_files, &bucket.prev().label).await?;
        out.extend(synthesize_state_events(bucket.start_ns, &carryover, start_ns, end_ns, filter));
        Ok(out)
    }

    /// Closes every hour-file whose last write is older than
    /// `close_after_idle`, called periodically by the background closer.
    pub async fn close_idle(&self) -> StoreResult<()> {
        let cutoff = self.clock.now_ts() - self.config.close_after_idle().as_secs() as i64;
        let stale: Vec<String> = self
            .last_activity
            .read()
            .await
            .iter()
            .filter(|(_, &ts)| ts < cutoff)
            .map(|(label, _)| label.clone())
            .collect();

        for label in stale {
            self.close_file(&label).await?;
        }
        Ok(())
    }

    async fn close_file(&self, label: &str) -> StoreResult<()> {
        let hf = {
            let mut open_files = self.open_files.write().await;
            open_files.remove(label)
        };
        let Some(hf) = hf else { return Ok(()) };

        let mut hf = hf.lock().await;
        hf.finalize()?;
        let file_size = std::fs::metadata(hf.path())?.len();

        if let Some(bucket) = spectre_core::time::hour_bucket_from_label(label) {
            let mut index = self.file_index.write().await;
            index.insert(
                label.to_string(),
                FileMetadata { hour_start: bucket.start_ns, hour_end: bucket.end_ns, timestamp_min: bucket.start_ns, timestamp_max: bucket.end_ns, event_count: hf.event_count(), file_size },
            );
            index.save(&self.config.data_dir)?;
        }

        self.last_activity.write().await.remove(label);
        counter!("spectre_store_hour_files_closed_total").increment(1);
        info!("closed idle hour file {label}");
        Ok(())
    }

    /// Summary of everything on disk, for the `store stats` CLI command.
    pub async fn stats(&self) -> StoreStats {
        let index = self.file_index.read().await;
        let mut stats = StoreStats::default();
        for (_, meta) in index.iter() {
            stats.file_count += 1;
            stats.total_events += meta.event_count;
            stats.total_bytes += meta.file_size;
        }
        stats.open_files = self.open_files.read().await.len();
        stats
    }

    /// Finalizes every currently open hour-file and persists the file-index
    /// sidecar, called on shutdown.
    pub async fn shutdown(&self) -> StoreResult<()> {
        let labels: Vec<String> = self.open_files.read().await.keys().cloned().collect();
        for label in labels {
            self.close_file(&label).await?;
        }
        self.file_index.read().await.save(&self.config.data_dir)?;
        Ok(())
    }

    /// Removes whole hour-files older than `max_age_hours`, falling back to
    /// file mtime if the filename can't be parsed as an hour label.
    pub async fn delete_old_files(&self, max_age_hours: i64) -> StoreResult<usize> {
        let cutoff_ns = spectre_core::time::sec_to_ns(self.clock.now_ts()) - max_age_hours * spectre_core::time::NANOS_PER_HOUR;
        let mut removed = 0;

        let Ok(entries) = std::fs::read_dir(&self.config.data_dir) else { return Ok(0) };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("bin") {
                continue;
            }
            let is_old = match path.file_stem().and_then(|s| s.to_str()).and_then(spectre_core::time::hour_bucket_from_label) {
                Some(bucket) => bucket.end_ns <= cutoff_ns,
                None => entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|mtime| mtime.duration_since(std::time::UNIX_EPOCH).ok())
                    .is_some_and(|since_epoch| (since_epoch.as_secs() as i64) * spectre_core::time::NANOS_PER_SEC <= cutoff_ns),
            };
            if is_old {
                if let Some(label) = path.file_stem().and_then(|s| s.to_str()) {
                    self.open_files.write().await.remove(label);
                    self.last_activity.write().await.remove(label);
                    self.file_index.write().await.remove(label);
                }
                if let Err(e) = std::fs::remove_file(&path) {
                    error!("could not remove old hour file {}: {e}", path.display());
                    continue;
                }
                removed += 1;
            }
        }
        if removed > 0 {
            self.file_index.read().await.save(&self.config.data_dir)?;
        }
        Ok(removed)
    }

    /// Rewrites each closed file's index section in place, dropping deleted
    /// resources' carryover state once it's older than `max_age_days`
    /// (spec.md §4.1 "Retention").
    pub async fn cleanup_old_state_snapshots(&self, max_age_days: i64) -> StoreResult<usize> {
        let cutoff_ns = spectre_core::time::sec_to_ns(self.clock.now_ts()) - max_age_days * 24 * spectre_core::time::NANOS_PER_HOUR;
        let mut rewritten = 0;

        let Ok(entries) = std::fs::read_dir(&self.config.data_dir) else { return Ok(0) };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("bin") {
                continue;
            }
            if self.rewrite_state_snapshot(&path, cutoff_ns)? {
                rewritten += 1;
            }
        }
        Ok(rewritten)
    }

    fn rewrite_state_snapshot(&self, path: &PathBuf, cutoff_ns: i64) -> StoreResult<bool> {
        let mut file = File::open(path)?;
        let (footer, mut index) = match Footer::read(&mut file, &path.to_string_lossy()) {
            Ok(pair) => pair,
            Err(StoreError::NoFooter(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        drop(file);

        let before = index.final_resource_states.len();
        index.final_resource_states.retain(|_, s| s.timestamp >= cutoff_ns || s.event_type != spectre_types::EventType::Delete);
        if index.final_resource_states.len() == before {
            return Ok(false);
        }

        let mut file = std::fs::OpenOptions::new().write(true).open(path)?;
        file.set_len(footer.index_offset)?;
        use std::io::{Seek, SeekFrom};
        file.seek(SeekFrom::Start(footer.index_offset))?;
        Footer::write(&mut file, &index)?;
        Ok(true)
    }
}
