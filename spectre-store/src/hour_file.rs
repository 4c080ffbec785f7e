//! A single hour's append-only event file, holding a mix of restored
//! (already on disk), finalized (written this process), and buffered
//! (not yet flushed) blocks, per spec.md §4.1.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use spectre_core::time::HourBucket;
use spectre_types::{Event, EventType, ResourceLastState};
use tracing::{debug, warn};

use crate::block::BlockMetadata;
use crate::codec::{frame_events, unframe_events};
use crate::compression::{CodecRegistry, CompressionKind};
use crate::errors::{StoreError, StoreResult};
use crate::footer::Footer;
use crate::index::{IndexDimension, IndexSection};

/// Events are grouped into blocks of roughly this many before being flushed
/// and compressed as a unit.
pub const BLOCK_SIZE: usize = 256;

/// Tag written immediately before each block's header, so a block-section
/// rescan (no footer available) can tell a genuine header from a truncated
/// write or arbitrary bytes.
const BLOCK_HEADER_MAGIC: &[u8; 4] = b"SPBK";

/// magic(4) + id(8) + timestamp_min(8) + timestamp_max(8) + event_count(4) +
/// compression(1) + byte_len(4), immediately preceding the block's compressed
/// payload. Self-describing so a crash before the footer is written still
/// leaves every already-flushed block recoverable.
const BLOCK_HEADER_LEN: usize = 4 + 8 + 8 + 8 + 4 + 1 + 4;

fn write_block_header(buf: &mut Vec<u8>, meta: &BlockMetadata) {
    buf.extend_from_slice(BLOCK_HEADER_MAGIC);
    buf.extend_from_slice(&meta.id.to_le_bytes());
    buf.extend_from_slice(&meta.timestamp_min.to_le_bytes());
    buf.extend_from_slice(&meta.timestamp_max.to_le_bytes());
    buf.extend_from_slice(&meta.event_count.to_le_bytes());
    buf.push(meta.compression.as_u8());
    buf.extend_from_slice(&meta.byte_len.to_le_bytes());
}

pub struct QueryFilter<'a> {
    pub kind: Option<&'a str>,
    pub namespace: Option<&'a str>,
    pub api_group: Option<&'a str>,
}

impl QueryFilter<'_> {
    fn matches(&self, ev: &Event) -> bool {
        self.kind.is_none_or(|k| ev.resource.kind == k)
            && self.namespace.is_none_or(|n| ev.resource.namespace == n)
            && self.api_group.is_none_or(|g| ev.resource.api_group == g)
    }
}

pub struct HourFile {
    pub bucket: HourBucket,
    path: PathBuf,
    index: IndexSection,
    current_buffer: Vec<Event>,
    next_block_id: u64,
    /// Byte offset at which the next appended block should start; for a
    /// restored file this is right after the last restored block, once the
    /// stale index section and footer have been truncated away.
    append_offset: u64,
    closed: bool,
    codecs: Arc<CodecRegistry>,
    /// Non-deleted final states carried over from the previous hour-file,
    /// surfaced as synthetic `state-<uid>` events at `bucket.start_ns`.
    initial_resource_states: std::collections::HashMap<String, ResourceLastState>,
}

impl HourFile {
    pub fn open_new(bucket: HourBucket, path: PathBuf, codecs: Arc<CodecRegistry>) -> StoreResult<Self> {
        File::create(&path)?;
        Ok(HourFile {
            bucket,
            path,
            index: IndexSection::default(),
            current_buffer: Vec::new(),
            next_block_id: 0,
            append_offset: 0,
            closed: false,
            codecs,
            initial_resource_states: std::collections::HashMap::new(),
        })
    }

    /// Installs the carryover state computed by the caller from the previous
    /// hour-file (spec.md §4.1 "Carryover across hour boundaries").
    pub fn set_initial_resource_states(&mut self, states: std::collections::HashMap<String, ResourceLastState>) {
        self.initial_resource_states = states;
    }

    /// Reopens a file that already has data on disk. If it has a valid
    /// footer, the index section is trusted and the file is truncated back
    /// to just after the last block so new blocks can be appended in its
    /// place. If the footer is missing or corrupt (a crash mid-write), the
    /// block section is rescanned to recover whatever was fully written.
    pub fn open_restored(bucket: HourBucket, path: PathBuf, codecs: Arc<CodecRegistry>) -> StoreResult<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        let path_str = path.to_string_lossy().to_string();

        let (index, append_offset, next_block_id) = match Footer::read(&mut file, &path_str) {
            Ok((footer, index)) => {
                let next_id = index.blocks.iter().map(|b| b.id + 1).max().unwrap_or(0);
                (index, footer.index_offset, next_id)
            },
            Err(e) => {
                warn!("hour file {path_str} has no usable footer ({e}), rescanning block section");
                rescan_block_section(&mut file)?
            },
        };

        file.set_len(append_offset)?;
        file.seek(SeekFrom::Start(append_offset))?;

        Ok(HourFile {
            bucket,
            path,
            index,
            current_buffer: Vec::new(),
            next_block_id,
            append_offset,
            closed: false,
            codecs,
            initial_resource_states: std::collections::HashMap::new(),
        })
    }

    pub fn write_event(&mut self, event: Event) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::Corruption(format!("hour file {} already closed", self.path.display())));
        }
        if !self.bucket.contains(event.timestamp) {
            return Err(StoreError::OutOfHourBounds { ts: event.timestamp, start: self.bucket.start_ns, end: self.bucket.end_ns });
        }
        self.record_last_state(
            &event.resource.uid,
            ResourceLastState { event_type: event.event_type, timestamp: event.timestamp, data: event.data.clone(), resource: event.resource.clone() },
        );
        self.current_buffer.push(event);
        if self.current_buffer.len() >= BLOCK_SIZE {
            self.flush_block()?;
        }
        Ok(())
    }

    /// Records the last observed state for a resource, superseding any
    /// earlier entry; read back on the next hour's cold start (spec.md §4.1
    /// "otherwise it reads the previous file's index section from disk").
    pub fn record_last_state(&mut self, uid: &str, state: ResourceLastState) {
        self.index.final_resource_states.insert(uid.to_string(), state);
    }

    /// The carryover set for the *next* hour: initial states not touched
    /// this hour, overlaid with whatever this hour's events updated.
    pub fn final_resource_states(&self) -> std::collections::HashMap<String, ResourceLastState> {
        let mut states = self.initial_resource_states.clone();
        states.extend(self.index.final_resource_states.clone());
        states
    }

    fn flush_block(&mut self) -> StoreResult<()> {
        if self.current_buffer.is_empty() {
            return Ok(());
        }
        let events = std::mem::take(&mut self.current_buffer);
        let timestamp_min = events.iter().map(|e| e.timestamp).min().unwrap_or(self.bucket.start_ns);
        let timestamp_max = events.iter().map(|e| e.timestamp).max().unwrap_or(self.bucket.start_ns);

        let framed = frame_events(&events)?;
        let codec = self.codecs.get(CompressionKind::Zstd);
        let payload = codec.compress(&framed)?;

        let meta = BlockMetadata {
            id: self.next_block_id,
            timestamp_min,
            timestamp_max,
            event_count: events.len() as u32,
            byte_len: payload.len() as u32,
            compression: CompressionKind::Zstd,
            file_offset: self.append_offset + BLOCK_HEADER_LEN as u64,
        };

        let mut header = Vec::with_capacity(BLOCK_HEADER_LEN);
        write_block_header(&mut header, &meta);

        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.seek(SeekFrom::Start(self.append_offset))?;
        file.write_all(&header)?;
        file.write_all(&payload)?;

        let dims = index_dims(&events);
        self.index.record_block(meta, &dims);

        self.append_offset += BLOCK_HEADER_LEN as u64 + payload.len() as u64;
        self.next_block_id += 1;
        debug!("flushed block {} ({} events) to {}", meta.id, meta.event_count, self.path.display());
        Ok(())
    }

    /// Flushes any buffered events and writes the footer, marking the file
    /// complete. Idempotent once closed.
    pub fn finalize(&mut self) -> StoreResult<()> {
        if self.closed {
            return Ok(());
        }
        self.flush_block()?;
        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.seek(SeekFrom::Start(self.append_offset))?;
        Footer::write(&mut file, &self.index)?;
        self.closed = true;
        Ok(())
    }

    pub fn event_count(&self) -> u64 {
        self.index.blocks.iter().map(|b| b.event_count as u64).sum::<u64>() + self.current_buffer.len() as u64
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads events overlapping `[start_ns, end_ns)`, merging the current
    /// in-memory buffer with on-disk blocks, following spec.md §4.1's read
    /// path: narrow by inverted index when a filter dimension is given, then
    /// confirm with block timestamp bounds before decompressing.
    pub fn query(&self, start_ns: i64, end_ns: i64, filter: &QueryFilter) -> StoreResult<Vec<Event>> {
        let mut out = query_blocks(&self.path, &self.index, &self.codecs, start_ns, end_ns, filter)?;

        for ev in &self.current_buffer {
            if ev.timestamp >= start_ns && ev.timestamp < end_ns && filter.matches(ev) {
                out.push(ev.clone());
            }
        }

        out.extend(synthesize_state_events(self.bucket.start_ns, &self.initial_resource_states, start_ns, end_ns, filter));

        out.sort_by_key(|ev| ev.timestamp);
        Ok(out)
    }
}

fn candidate_block_ids(index: &IndexSection, filter: &QueryFilter) -> Vec<u64> {
    let mut sets = Vec::new();
    if let Some(k) = filter.kind {
        sets.push(index.candidates(IndexDimension::Kind, k).to_vec());
    }
    if let Some(n) = filter.namespace {
        sets.push(index.candidates(IndexDimension::Namespace, n).to_vec());
    }
    if let Some(g) = filter.api_group {
        sets.push(index.candidates(IndexDimension::ApiGroup, g).to_vec());
    }

    if sets.is_empty() {
        return index.blocks.iter().map(|b| b.id).collect();
    }

    let mut iter = sets.into_iter();
    let mut intersection: std::collections::HashSet<u64> = iter.next().unwrap().into_iter().collect();
    for s in iter {
        let s: std::collections::HashSet<u64> = s.into_iter().collect();
        intersection = intersection.intersection(&s).copied().collect();
    }
    intersection.into_iter().collect()
}

/// Reads and filters the on-disk blocks of an hour-file's index section.
/// Usable both by an open `HourFile` and, for a closed file not currently
/// resident in memory, directly against its footer-read index section.
pub(crate) fn query_blocks(
    path: &Path,
    index: &IndexSection,
    codecs: &CodecRegistry,
    start_ns: i64,
    end_ns: i64,
    filter: &QueryFilter,
) -> StoreResult<Vec<Event>> {
    let mut out = Vec::new();
    let candidate_ids = candidate_block_ids(index, filter);
    let mut file = File::open(path)?;
    for block_id in candidate_ids {
        let Some(meta) = index.block(block_id) else { continue };
        if meta.timestamp_max < start_ns || meta.timestamp_min >= end_ns {
            continue;
        }
        file.seek(SeekFrom::Start(meta.file_offset))?;
        let mut payload = vec![0u8; meta.byte_len as usize];
        file.read_exact(&mut payload)?;
        let codec = codecs.get(meta.compression);
        let framed = codec.decompress(&payload)?;
        for ev in unframe_events(&framed) {
            if ev.timestamp >= start_ns && ev.timestamp < end_ns && filter.matches(&ev) {
                out.push(ev);
            }
        }
    }
    Ok(out)
}

/// Synthesizes `state-<uid>` snapshot events at the hour's start for any
/// carried-over non-deleted resource (spec.md §4.1 "Carryover across hour
/// boundaries").
pub(crate) fn synthesize_state_events(
    bucket_start_ns: i64,
    states: &std::collections::HashMap<String, ResourceLastState>,
    start_ns: i64,
    end_ns: i64,
    filter: &QueryFilter,
) -> Vec<Event> {
    let mut out = Vec::new();
    for (uid, state) in states {
        let synthetic = Event {
            id: Event::state_event_id(uid),
            timestamp: bucket_start_ns,
            event_type: EventType::Create,
            resource: state.resource.clone(),
            data: state.data.clone(),
        };
        if synthetic.timestamp >= start_ns && synthetic.timestamp < end_ns && filter.matches(&synthetic) {
            out.push(synthetic);
        }
    }
    out
}

/// Filters a carryover state map the way a closing hour-file's
/// `finalResourceStates` must be filtered before becoming the next hour's
/// initial state: deleted resources do not carry forward.
pub fn filter_non_deleted(states: std::collections::HashMap<String, ResourceLastState>) -> std::collections::HashMap<String, ResourceLastState> {
    states.into_iter().filter(|(_, s)| s.event_type != EventType::Delete).collect()
}

fn index_dims(events: &[Event]) -> Vec<(IndexDimension, &str)> {
    let mut dims = Vec::new();
    let mut seen_kinds = std::collections::HashSet::new();
    let mut seen_ns = std::collections::HashSet::new();
    let mut seen_groups = std::collections::HashSet::new();
    for ev in events {
        if seen_kinds.insert(ev.resource.kind.as_str()) {
            dims.push((IndexDimension::Kind, ev.resource.kind.as_str()));
        }
        if seen_ns.insert(ev.resource.namespace.as_str()) {
            dims.push((IndexDimension::Namespace, ev.resource.namespace.as_str()));
        }
        if seen_groups.insert(ev.resource.api_group.as_str()) {
            dims.push((IndexDimension::ApiGroup, ev.resource.api_group.as_str()));
        }
    }
    dims
}

/// Rebuilds an index section by walking the block section's self-describing
/// headers from the start of the file, recovering every block that was fully
/// `flush_block()`'d before a crash (spec.md §4.1: "already-finalized blocks
/// are recovered"). Stops at the first header that doesn't parse, whose
/// magic doesn't match, or whose payload is short — that's either the
/// unflushed tail buffer (lost, as always) or a write torn mid-block, and
/// either way nothing past it can be trusted.
fn rescan_block_section(file: &mut File) -> StoreResult<(IndexSection, u64, u64)> {
    file.seek(SeekFrom::Start(0))?;
    let codecs = CodecRegistry::default();
    let mut index = IndexSection::default();
    let mut offset = 0u64;
    let mut next_block_id = 0u64;

    loop {
        let mut header = [0u8; BLOCK_HEADER_LEN];
        if file.read_exact(&mut header).is_err() {
            break;
        }
        if &header[0..4] != BLOCK_HEADER_MAGIC {
            break;
        }
        let id = u64::from_le_bytes(header[4..12].try_into().unwrap());
        let timestamp_min = i64::from_le_bytes(header[12..20].try_into().unwrap());
        let timestamp_max = i64::from_le_bytes(header[20..28].try_into().unwrap());
        let event_count = u32::from_le_bytes(header[28..32].try_into().unwrap());
        let Ok(compression) = CompressionKind::from_u8(header[32]) else { break };
        let byte_len = u32::from_le_bytes(header[33..37].try_into().unwrap());

        let mut payload = vec![0u8; byte_len as usize];
        if file.read_exact(&mut payload).is_err() {
            break;
        }

        let codec = codecs.get(compression);
        let Ok(framed) = codec.decompress(&payload) else { break };
        let events = unframe_events(&framed);
        let dims = index_dims(&events);

        let meta =
            BlockMetadata { id, timestamp_min, timestamp_max, event_count, byte_len, compression, file_offset: offset + BLOCK_HEADER_LEN as u64 };
        index.record_block(meta, &dims);

        offset += BLOCK_HEADER_LEN as u64 + byte_len as u64;
        next_block_id = id + 1;
    }

    debug!("rescanned block section, recovered {} block(s) up to offset {offset}", index.blocks.len());
    Ok((index, offset, next_block_id))
}
