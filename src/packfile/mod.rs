//!
//! Binary decoding of the pack stream format: given a byte offset within a
//! `.pack` file, read the per-object variable header and inflate its
//! compressed payload. Resolving delta chains to materialized objects is a
//! separate concern, handled by `crate::delta` over raw entries this module
//! produces.

pub mod index;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::Result;
use flate2::{Decompress, FlushDecompress, Status};

use crate::error::ReaderError;
use crate::hash::Sha;
use crate::varint::read_offset_varint;

/// The type tag carried by a pack entry's header byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackObjectType {
    Commit,
    Tree,
    Blob,
    Tag,
    OfsDelta,
    RefDelta,
}

impl PackObjectType {
    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(PackObjectType::Commit),
            2 => Ok(PackObjectType::Tree),
            3 => Ok(PackObjectType::Blob),
            4 => Ok(PackObjectType::Tag),
            6 => Ok(PackObjectType::OfsDelta),
            7 => Ok(PackObjectType::RefDelta),
            other => Err(ReaderError::MalformedPack(format!("unknown type tag {}", other)).into()),
        }
    }
}

/// What a delta entry names its base by.
#[derive(Clone, Debug)]
pub enum DeltaBase {
    /// `ofs_delta`: the base's header starts `offset` bytes before this
    /// entry's own header.
    Offset(u64),
    /// `ref_delta`: the base is named directly by hash.
    Reference(Sha),
}

///
/// One decoded pack entry: a header (type + declared size + delta base, if
/// any) and its fully-inflated payload. For a delta entry the payload is the
/// delta instruction stream, not a materialized object — see `crate::delta`.
///
pub struct PackEntry {
    pub object_type: PackObjectType,
    pub declared_size: u64,
    pub delta_base: Option<DeltaBase>,
    pub payload: Vec<u8>,
}

///
/// A read handle onto a single `.pack` file. Every read seeks independently;
/// no seek position is shared across calls, so entries may be read from the
/// same `PackFile` value in any order, including recursively while resolving
/// a delta chain.
///
pub struct PackFile {
    file: File,
}

impl PackFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(PackFile {
            file: File::open(path)?,
        })
    }

    ///
    /// Decodes the entry whose header begins at `offset`.
    ///
    pub fn read_at_offset(&mut self, offset: u64) -> Result<PackEntry> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut reader = &mut self.file;

        let mut b = read_u8(&mut reader)?;
        let object_type = PackObjectType::from_tag((b >> 4) & 0x7)?;
        let mut size = (b & 0x0f) as u64;
        let mut shift = 4u32;
        while b & 0x80 != 0 {
            b = read_u8(&mut reader)?;
            size |= ((b & 0x7f) as u64) << shift;
            shift += 7;
        }

        let delta_base = match object_type {
            PackObjectType::OfsDelta => {
                let rel = read_offset_varint(&mut reader, true)?;
                Some(DeltaBase::Offset(offset.checked_sub(rel).ok_or_else(|| {
                    ReaderError::MalformedPack("ofs_delta base offset underflows".to_string())
                })?))
            }
            PackObjectType::RefDelta => {
                let mut buf = [0u8; 20];
                reader.read_exact(&mut buf)?;
                Some(DeltaBase::Reference(Sha::from_array(buf)))
            }
            _ => None,
        };

        let payload = inflate_to_size(&mut reader, size as usize)?;

        Ok(PackEntry {
            object_type,
            declared_size: size,
            delta_base,
            payload,
        })
    }
}

///
/// Inflates a zlib stream from `r`, stopping once `expected_len` bytes have
/// been produced. Using the streaming `Decompress` API (rather than a
/// `ZlibDecoder<R>` wrapper) lets us read exactly the compressed bytes
/// belonging to this entry and leave the reader positioned just past them,
/// without needing to know the compressed length up front.
///
fn inflate_to_size<R: Read>(r: &mut R, expected_len: usize) -> Result<Vec<u8>> {
    let mut decompress = Decompress::new(true);
    let mut out = vec![0u8; expected_len];
    let mut in_buf = [0u8; 4096];
    // Bytes already read from `r` but not yet consumed by `decompress` --
    // carried across reads rather than dropped, since a single call isn't
    // guaranteed to consume everything it's given even when output space
    // remains.
    let mut pending_start = 0usize;
    let mut pending_end = 0usize;
    let mut produced = 0usize;

    loop {
        if pending_start == pending_end {
            let n = r.read(&mut in_buf)?;
            if n == 0 {
                return Err(ReaderError::MalformedPack(
                    "pack entry truncated before declared size reached".to_string(),
                )
                .into());
            }
            pending_start = 0;
            pending_end = n;
        }

        let before_in = decompress.total_in();
        let status = decompress
            .decompress(
                &in_buf[pending_start..pending_end],
                &mut out[produced..],
                FlushDecompress::None,
            )
            .map_err(|e| ReaderError::MalformedPack(format!("zlib error: {}", e)))?;
        let consumed = (decompress.total_in() - before_in) as usize;
        pending_start += consumed;
        produced = decompress.total_out() as usize;

        match status {
            Status::StreamEnd => break,
            Status::Ok | Status::BufError => {
                if produced >= expected_len {
                    break;
                }
                if consumed == 0 && pending_start == pending_end {
                    // Made no progress and exhausted this chunk; loop back
                    // to read more input.
                    continue;
                }
            }
        }
    }

    if produced != expected_len {
        return Err(ReaderError::MalformedPack(format!(
            "decompressed {} bytes, declared size was {}",
            produced, expected_len
        ))
        .into());
    }

    Ok(out)
}

fn read_u8<R: Read>(r: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}
