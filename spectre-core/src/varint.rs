//! Unsigned LEB128 varints, used to length-prefix events inside a block payload
//! (spec.md §4.1: "a length-prefixed sequence using unsigned variable-length
//! integers followed by that many bytes of the event's serialized form").

use std::io::{self, Read, Write};

pub fn write_uvarint<W: Write>(w: &mut W, mut value: u64) -> io::Result<()> {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        w.write_all(&[byte])?;
        if value == 0 {
            return Ok(());
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VarintError {
    #[error("unexpected end of input while reading varint")]
    Truncated,
    #[error("varint exceeds 64 bits")]
    Overflow,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub fn read_uvarint<R: Read>(r: &mut R) -> Result<u64, VarintError> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    loop {
        if shift >= 64 {
            return Err(VarintError::Overflow);
        }
        let mut byte = [0u8; 1];
        match r.read(&mut byte)? {
            0 => return Err(VarintError::Truncated),
            _ => {},
        }
        result |= ((byte[0] & 0x7f) as u64) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}
