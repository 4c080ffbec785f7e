//! Event (de)serialization and framing inside a block payload.
//!
//! Framing is a length-prefixed sequence: `uvarint(len) ++ len bytes of the
//! event's serialized form`, per spec.md §4.1. Events are serialized with
//! MessagePack (`rmp-serde`), matching the teacher's choice for its own binary
//! trace format.

use std::io::Cursor;

use spectre_core::varint::{read_uvarint, write_uvarint};
use spectre_types::Event;
use tracing::warn;

use crate::errors::{StoreError, StoreResult};

pub fn encode_event(ev: &Event) -> StoreResult<Vec<u8>> {
    rmp_serde::to_vec_named(ev).map_err(|e| StoreError::MalformedEvent(e.to_string()))
}

pub fn decode_event(bytes: &[u8]) -> StoreResult<Event> {
    rmp_serde::from_slice(bytes).map_err(|e| StoreError::MalformedEvent(e.to_string()))
}

/// Frames a sequence of events into a single buffer suitable for compression.
pub fn frame_events(events: &[Event]) -> StoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    for ev in events {
        let encoded = encode_event(ev)?;
        write_uvarint(&mut buf, encoded.len() as u64)?;
        buf.extend_from_slice(&encoded);
    }
    Ok(buf)
}

/// Decodes a framed buffer back into events. Per spec.md §7, a malformed
/// length prefix or truncated event mid-stream is a corruption: we log and
/// return whatever events were readable before the break, rather than failing
/// the whole block.
pub fn unframe_events(buf: &[u8]) -> Vec<Event> {
    let mut cursor = Cursor::new(buf);
    let mut events = Vec::new();
    loop {
        let len = match read_uvarint(&mut cursor) {
            Ok(len) => len,
            Err(_) if cursor.position() as usize >= buf.len() => break,
            Err(e) => {
                warn!("truncated varint length in block payload: {e}");
                break;
            },
        };
        let start = cursor.position() as usize;
        let end = start + len as usize;
        if end > buf.len() {
            warn!("event frame length {len} exceeds remaining block payload, skipping rest of block");
            break;
        }
        match decode_event(&buf[start..end]) {
            Ok(ev) => events.push(ev),
            Err(e) => {
                warn!("could not decode event frame: {e}, skipping rest of block");
                break;
            },
        }
        cursor.set_position(end as u64);
    }
    events
}

impl From<spectre_core::varint::VarintError> for StoreError {
    fn from(e: spectre_core::varint::VarintError) -> Self {
        StoreError::Corruption(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;
    use spectre_types::{EventType, ResourceMetadata};

    use super::*;

    fn fake_event(id: &str, ts: i64) -> Event {
        Event {
            id: id.into(),
            timestamp: ts,
            event_type: EventType::Create,
            resource: ResourceMetadata { uid: id.into(), kind: "Pod".into(), ..Default::default() },
            data: serde_json::json!({}),
        }
    }

    #[rstest]
    fn test_frame_roundtrip() {
        let events = vec![fake_event("e1", 1), fake_event("e2", 2)];
        let framed = frame_events(&events).unwrap();
        let decoded = unframe_events(&framed);
        assert_eq!(decoded, events);
    }

    #[rstest]
    fn test_truncated_block_skips_rest() {
        let events = vec![fake_event("e1", 1), fake_event("e2", 2)];
        let mut framed = frame_events(&events).unwrap();
        framed.truncate(framed.len() - 2);
        let decoded = unframe_events(&framed);
        assert_eq!(decoded, vec![fake_event("e1", 1)]);
    }
}
