//! Block metadata and payload framing, per spec.md §4.1 "A block groups a
//! run of events written close together in time".

use serde::{Deserialize, Serialize};

use crate::compression::CompressionKind;

/// Metadata recorded in an hour-file's index section for one block.
///
/// `file_offset` is not named directly in spec.md's block attribute list but
/// is required to support random access on restore; spec.md §9 permits
/// appending new index fields across versions, so it's carried here rather
/// than recomputed by re-scanning block headers on every read.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct BlockMetadata {
    pub id: u64,
    pub timestamp_min: i64,
    pub timestamp_max: i64,
    pub event_count: u32,
    pub byte_len: u32,
    pub compression: CompressionKind,
    pub file_offset: u64,
}
