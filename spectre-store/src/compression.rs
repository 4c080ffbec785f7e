use serde::{Deserialize, Serialize};

use crate::errors::StoreError;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum CompressionKind {
    None,
    Zstd,
}

impl CompressionKind {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            CompressionKind::None => 0,
            CompressionKind::Zstd => 1,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Result<Self, StoreError> {
        match v {
            0 => Ok(CompressionKind::None),
            1 => Ok(CompressionKind::Zstd),
            other => Err(StoreError::Corruption(format!("unknown compression tag {other}"))),
        }
    }
}

/// A block payload codec. Kept as a trait/registry (rather than a single
/// hardwired algorithm) so the per-block `compression` tag in block metadata
/// round-trips regardless of which codec wrote it.
pub trait Codec: Send + Sync {
    fn kind(&self) -> CompressionKind;
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, StoreError>;
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, StoreError>;
}

struct NoneCodec;

impl Codec for NoneCodec {
    fn kind(&self) -> CompressionKind {
        CompressionKind::None
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, StoreError> {
        Ok(input.to_vec())
    }

    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, StoreError> {
        Ok(input.to_vec())
    }
}

pub struct ZstdCodec {
    pub level: i32,
}

impl Codec for ZstdCodec {
    fn kind(&self) -> CompressionKind {
        CompressionKind::Zstd
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, StoreError> {
        zstd::stream::encode_all(input, self.level).map_err(|e| StoreError::Corruption(format!("zstd compress: {e}")))
    }

    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, StoreError> {
        zstd::stream::decode_all(input).map_err(|e| StoreError::Corruption(format!("zstd decompress: {e}")))
    }
}

pub struct CodecRegistry {
    none: NoneCodec,
    zstd: ZstdCodec,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        CodecRegistry { none: NoneCodec, zstd: ZstdCodec { level: 3 } }
    }
}

impl CodecRegistry {
    pub fn get(&self, kind: CompressionKind) -> &dyn Codec {
        match kind {
            CompressionKind::None => &self.none,
            CompressionKind::Zstd => &self.zstd,
        }
    }
}
