//!
//! Applies a delta instruction stream against a fully materialized base to
//! reconstruct the target object's payload. Chain resolution (following a
//! delta's base to *its* base, recursively) lives in `crate::repository`,
//! which owns the catalog lookups; this module is the pure byte-level
//! transform, taking a base payload and a delta payload and producing the
//! result payload.

use anyhow::Result;
use std::io::Read;

use crate::error::ReaderError;
use crate::varint::read_length_varint;

///
/// Applies `delta` (the instruction stream read from a pack's `ofs_delta` or
/// `ref_delta` entry) against `base`, returning the reconstructed payload.
///
pub fn apply(base: &[u8], delta: &[u8]) -> Result<Vec<u8>> {
    let mut cursor = delta;

    let source_size = read_length_varint(&mut cursor)?;
    if source_size as usize != base.len() {
        return Err(ReaderError::MalformedDelta(format!(
            "delta source size {} does not match base length {}",
            source_size,
            base.len()
        ))
        .into());
    }
    let result_size = read_length_varint(&mut cursor)?;

    let mut out = Vec::with_capacity(result_size as usize);

    while !cursor.is_empty() {
        let op = read_u8(&mut cursor)?;
        if op & 0x80 != 0 {
            if op == 0x80 {
                // Reserved all-zero-selector copy: no offset bytes, no
                // length bytes. Treated as a defined zero-byte no-op rather
                // than falling into the general "length == 0 -> 0x10000"
                // rule below, which would otherwise turn this into a
                // spurious 64KB copy from the start of the base.
                continue;
            }

            // Copy instruction: bits 0..3 select which offset bytes follow,
            // bits 4..5 select which length bytes follow, bit 6 is unused.
            let mut offset: u32 = 0;
            let mut length: u32 = 0;
            for i in 0..4 {
                if op & (1 << i) != 0 {
                    offset |= (read_u8(&mut cursor)? as u32) << (8 * i);
                }
            }
            for i in 0..2 {
                if op & (1 << (4 + i)) != 0 {
                    length |= (read_u8(&mut cursor)? as u32) << (8 * i);
                }
            }
            if length == 0 {
                length = 0x10000;
            }

            let offset = offset as usize;
            let length = length as usize;
            let end = offset
                .checked_add(length)
                .ok_or_else(|| ReaderError::MalformedDelta("copy range overflows".to_string()))?;
            if end > base.len() {
                return Err(ReaderError::MalformedDelta(format!(
                    "copy range {}..{} exceeds base length {}",
                    offset,
                    end,
                    base.len()
                ))
                .into());
            }
            out.extend_from_slice(&base[offset..end]);
        } else if op == 0 {
            return Err(ReaderError::MalformedDelta("reserved opcode 0".to_string()).into());
        } else {
            // Insert instruction: the low 7 bits are the literal length.
            let len = op as usize;
            if cursor.len() < len {
                return Err(
                    ReaderError::MalformedDelta("insert runs past end of stream".to_string()).into(),
                );
            }
            out.extend_from_slice(&cursor[..len]);
            cursor = &cursor[len..];
        }
    }

    if out.len() != result_size as usize {
        return Err(ReaderError::MalformedDelta(format!(
            "reconstructed {} bytes, delta declared {}",
            out.len(),
            result_size
        ))
        .into());
    }

    Ok(out)
}

fn read_u8(cursor: &mut &[u8]) -> Result<u8> {
    let mut buf = [0u8; 1];
    cursor.read_exact(&mut buf).map_err(|_| {
        ReaderError::MalformedDelta("instruction stream ended mid-opcode".to_string())
    })?;
    Ok(buf[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_bytes(source_size: u8, result_size: u8, ops: &[u8]) -> Vec<u8> {
        let mut buf = vec![source_size, result_size];
        buf.extend_from_slice(ops);
        buf
    }

    #[test]
    fn copy_then_insert_reconstructs_target() {
        let base = b"abc";
        // copy 3 bytes from offset 0 (0x90 0x00 0x03), then insert 1 byte 'X'
        let delta = delta_bytes(3, 4, &[0x90, 0x00, 0x03, 0x01, b'X']);
        let result = apply(base, &delta).unwrap();
        assert_eq!(result, b"abcX");
    }

    #[test]
    fn pure_insert() {
        let base = b"";
        let delta = delta_bytes(0, 5, &[0x05, b'h', b'e', b'l', b'l', b'o']);
        let result = apply(base, &delta).unwrap();
        assert_eq!(result, b"hello");
    }

    #[test]
    fn zero_length_copy_field_means_full_segment() {
        // copy with only offset byte present (op=0x81), length omitted -> 0x10000
        // use a tiny base instead to keep the test fast: a length field of 0
        // should only be inferred when the length bits were absent, not when
        // explicitly zero; here we just exercise the no-length-bits path with
        // a small base smaller than 0x10000, which must fail range checking.
        let base = b"ab";
        let delta = delta_bytes(2, 2, &[0x81, 0x00]);
        assert!(apply(base, &delta).is_err());
    }

    #[test]
    fn reserved_all_zero_selector_copy_is_a_no_op() {
        // op = 0x80: copy bit set, every selector bit clear -- no offset
        // bytes, no length bytes follow. Must append nothing, not fall back
        // to the "absent length -> 0x10000" rule.
        let base = b"ab";
        let delta = delta_bytes(2, 0, &[0x80]);
        let result = apply(base, &delta).unwrap();
        assert_eq!(result, b"");
    }

    #[test]
    fn copy_out_of_range_is_rejected() {
        let base = b"ab";
        let delta = delta_bytes(2, 2, &[0x90, 0x05, 0x02]);
        assert!(apply(base, &delta).is_err());
    }

    #[test]
    fn reserved_opcode_zero_is_rejected() {
        let base = b"ab";
        let delta = delta_bytes(2, 0, &[0x00]);
        assert!(apply(base, &delta).is_err());
    }

    #[test]
    fn mismatched_source_size_is_rejected() {
        let base = b"ab";
        let delta = delta_bytes(3, 0, &[]);
        assert!(apply(base, &delta).is_err());
    }
}
