//! Hour-file footer: the fixed-size trailer that lets a restored file be
//! opened without rescanning every block, per spec.md §4.1.
//!
//! ```text
//! [ block section ............................... ]
//! [ index section: rmp-serde Vec<BlockMetadata>     ]
//! [ footer (fixed size, last FOOTER_SIZE bytes)      ]
//!   magic(8) | version(u32) | index_offset(u64) | index_len(u64) | crc32(u32)
//! ```
//!
//! The footer's own CRC covers the index section bytes, not the block
//! section: blocks are validated individually as they're read (a corrupt
//! block is skippable; a corrupt index is not, so it gets the stronger
//! whole-section check).

use std::io::{Read, Seek, SeekFrom, Write};

use crc32fast::Hasher;

use crate::errors::{StoreError, StoreResult};
use crate::index::IndexSection;

const MAGIC: &[u8; 8] = b"SPECTR01";
const FORMAT_VERSION: u32 = 1;

/// magic(8) + version(4) + index_offset(8) + index_len(8) + crc(4)
pub const FOOTER_SIZE: u64 = 8 + 4 + 8 + 8 + 4;

pub struct Footer {
    pub index_offset: u64,
    pub index_len: u64,
}

impl Footer {
    pub fn write<W: Write + Seek>(w: &mut W, index: &IndexSection) -> StoreResult<()> {
        let index_offset = w.stream_position()?;
        let index_bytes = rmp_serde::to_vec_named(index).map_err(|e| StoreError::Corruption(e.to_string()))?;
        w.write_all(&index_bytes)?;

        let mut hasher = Hasher::new();
        hasher.update(&index_bytes);
        let crc = hasher.finalize();

        w.write_all(MAGIC)?;
        w.write_all(&FORMAT_VERSION.to_le_bytes())?;
        w.write_all(&index_offset.to_le_bytes())?;
        w.write_all(&(index_bytes.len() as u64).to_le_bytes())?;
        w.write_all(&crc.to_le_bytes())?;
        w.flush()?;
        Ok(())
    }

    /// Reads the footer and the index section it points to, validating the
    /// magic bytes and CRC. Returns `StoreError::NoFooter` if the trailer is
    /// missing or malformed, signalling the caller to fall back to a
    /// block-section scan.
    pub fn read<R: Read + Seek>(r: &mut R, path_hint: &str) -> StoreResult<(Footer, IndexSection)> {
        let len = r.seek(SeekFrom::End(0))?;
        if len < FOOTER_SIZE {
            return Err(StoreError::NoFooter(path_hint.to_string()));
        }
        r.seek(SeekFrom::Start(len - FOOTER_SIZE))?;

        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(StoreError::NoFooter(path_hint.to_string()));
        }

        let mut version_buf = [0u8; 4];
        r.read_exact(&mut version_buf)?;
        let version = u32::from_le_bytes(version_buf);
        if version > FORMAT_VERSION {
            return Err(StoreError::Corruption(format!(
                "hour file {path_hint} has unsupported format version {version}"
            )));
        }

        let mut offset_buf = [0u8; 8];
        r.read_exact(&mut offset_buf)?;
        let index_offset = u64::from_le_bytes(offset_buf);

        let mut len_buf = [0u8; 8];
        r.read_exact(&mut len_buf)?;
        let index_len = u64::from_le_bytes(len_buf);

        let mut crc_buf = [0u8; 4];
        r.read_exact(&mut crc_buf)?;
        let expected_crc = u32::from_le_bytes(crc_buf);

        r.seek(SeekFrom::Start(index_offset))?;
        let mut index_bytes = vec![0u8; index_len as usize];
        r.read_exact(&mut index_bytes)?;

        let mut hasher = Hasher::new();
        hasher.update(&index_bytes);
        if hasher.finalize() != expected_crc {
            return Err(StoreError::Corruption(format!("index section CRC mismatch in {path_hint}")));
        }

        let index: IndexSection =
            rmp_serde::from_slice(&index_bytes).map_err(|e| StoreError::Corruption(e.to_string()))?;

        Ok((Footer { index_offset, index_len }, index))
    }
}
