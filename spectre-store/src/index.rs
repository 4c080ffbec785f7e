//! In-file index section: block metadata, the `{kind, namespace, apiGroup}`
//! inverted index, and final per-resource state carried across hour
//! boundaries (spec.md §4.1 "Index section").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use spectre_types::ResourceLastState;

use crate::block::BlockMetadata;

/// The three dimensions the inverted index is fixed to (spec.md §6:
/// "Inverted-index dimensions are fixed to `{kind, namespace, apiGroup}`").
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IndexDimension {
    Kind,
    Namespace,
    ApiGroup,
}

impl IndexDimension {
    fn tag(self) -> &'static str {
        match self {
            IndexDimension::Kind => "kind",
            IndexDimension::Namespace => "namespace",
            IndexDimension::ApiGroup => "apiGroup",
        }
    }
}

fn composite_key(dim: IndexDimension, value: &str) -> String {
    format!("{}\u{1}{value}", dim.tag())
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct IndexSection {
    pub blocks: Vec<BlockMetadata>,
    inverted_index: HashMap<String, Vec<u64>>,
    pub final_resource_states: HashMap<String, ResourceLastState>,
}

impl IndexSection {
    pub fn record_block(&mut self, meta: BlockMetadata, dims: &[(IndexDimension, &str)]) {
        for (dim, value) in dims {
            self.inverted_index.entry(composite_key(*dim, value)).or_default().push(meta.id);
        }
        self.blocks.push(meta);
    }

    pub fn candidates(&self, dim: IndexDimension, value: &str) -> &[u64] {
        self.inverted_index.get(&composite_key(dim, value)).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn block(&self, id: u64) -> Option<&BlockMetadata> {
        self.blocks.iter().find(|b| b.id == id)
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;
    use crate::compression::CompressionKind;

    fn meta(id: u64) -> BlockMetadata {
        BlockMetadata { id, timestamp_min: 0, timestamp_max: 1, event_count: 1, byte_len: 1, compression: CompressionKind::None, file_offset: 0 }
    }

    #[rstest]
    fn test_candidates_lookup() {
        let mut idx = IndexSection::default();
        idx.record_block(meta(7), &[(IndexDimension::Kind, "Pod"), (IndexDimension::Namespace, "default")]);
        assert_eq!(idx.candidates(IndexDimension::Kind, "Pod"), &[7]);
        assert_eq!(idx.candidates(IndexDimension::Namespace, "default"), &[7]);
        assert!(idx.candidates(IndexDimension::Kind, "Service").is_empty());
    }
}
