// Reading from a pack index:
//
//   1. Check the leading byte of the sha, M
//   2. end <- fanout[M], the number of objects with sha lexically <= M
//   3. start <- 0 if M == 0 else fanout[M - 1]
//   4. Slice shas[start:end] to get the candidate entries
//   5. Binary search within that slice
//   6. Return the offset for a match, if any
//
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use byteorder::{BigEndian, ReadBytesExt};
use tracing::debug;

use crate::error::ReaderError;
use crate::hash::Sha;

const MAGIC: [u8; 4] = [0xff, 0x74, 0x4f, 0x63];
const VERSION: u32 = 2;

///
/// Version 2 of the pack index: separate tables for the fanout, the sorted
/// shas, their CRC32s (read but unused by this reader), and their offsets
/// into the companion `.pack` file.
///
pub struct PackIndex {
    fanout: [u32; 256],
    shas: Vec<Sha>,
    offsets: Vec<u64>,
    pack_path: PathBuf,
}

impl PackIndex {
    ///
    /// Opens and parses a `.idx` file, deriving the companion `.pack` path by
    /// substituting the extension. Fails with `MissingPack` if that file
    /// does not exist.
    ///
    pub fn open<P: AsRef<Path>>(idx_path: P) -> Result<Self> {
        let idx_path = idx_path.as_ref();
        let pack_path = idx_path.with_extension("pack");
        if !pack_path.exists() {
            return Err(ReaderError::MissingPack(pack_path).into());
        }

        let mut contents = Vec::new();
        File::open(idx_path)
            .with_context(|| format!("opening index {}", idx_path.display()))?
            .read_to_end(&mut contents)?;

        let mut index = Self::parse(&contents)?;
        index.pack_path = pack_path;
        Ok(index)
    }

    fn parse(full: &[u8]) -> Result<Self> {
        let mut content = full;
        let mut magic = [0u8; 4];
        content.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(ReaderError::UnsupportedIndex(format!(
                "bad magic: {:02x?}",
                magic
            ))
            .into());
        }

        let version = content.read_u32::<BigEndian>()?;
        if version != VERSION {
            return Err(ReaderError::UnsupportedIndex(format!(
                "unsupported version: {}",
                version
            ))
            .into());
        }

        let mut fanout = [0u32; 256];
        for f in fanout.iter_mut() {
            *f = content.read_u32::<BigEndian>()?;
        }
        let count = fanout[255] as usize;

        let mut shas = Vec::with_capacity(count);
        for _ in 0..count {
            let mut buf = [0u8; 20];
            content.read_exact(&mut buf)?;
            shas.push(Sha::from_array(buf));
        }

        // CRC32s: present in the format, unused by a read-only reader.
        for _ in 0..count {
            content.read_u32::<BigEndian>()?;
        }

        let mut offsets = Vec::with_capacity(count);
        for _ in 0..count {
            let raw = content.read_u32::<BigEndian>()?;
            if raw & 0x8000_0000 != 0 {
                return Err(ReaderError::UnsupportedIndex(
                    "large (64-bit) pack offsets are not supported".to_string(),
                )
                .into());
            }
            offsets.push(raw as u64);
        }

        // Trailer: pack checksum, then index checksum over everything
        // preceding it. We don't hard-fail a mismatch here -- the reader's
        // job is to serve what's on disk -- but it's re-derived and
        // compared, surfacing a mismatch via a debug trace rather than
        // silently discarding it.
        let mut pack_checksum = [0u8; 20];
        content.read_exact(&mut pack_checksum)?;
        let mut idx_checksum = [0u8; 20];
        content.read_exact(&mut idx_checksum)?;

        let body_len = full.len() - idx_checksum.len();
        let computed = Sha::compute_from_bytes(&full[..body_len]);
        if computed.as_bytes() != &idx_checksum {
            debug!(
                expected = %Sha::from_array(idx_checksum),
                computed = %computed,
                "pack index trailer checksum mismatch"
            );
        }

        Ok(PackIndex {
            fanout,
            shas,
            offsets,
            pack_path: PathBuf::new(),
        })
    }

    pub fn pack_path(&self) -> &Path {
        &self.pack_path
    }

    pub fn len(&self) -> usize {
        self.shas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shas.is_empty()
    }

    ///
    /// Returns the offset in the pack file for the given hash, if present.
    ///
    pub fn find(&self, sha: &Sha) -> Option<u64> {
        let bucket = sha.as_bytes()[0] as usize;
        let start = if bucket > 0 {
            self.fanout[bucket - 1] as usize
        } else {
            0
        };
        let end = self.fanout[bucket] as usize;

        self.shas[start..end]
            .binary_search(sha)
            .ok()
            .map(|i| self.offsets[start + i])
    }

    ///
    /// Iterates every `(hash, offset)` pair recorded by this index, in
    /// ascending-hash order.
    ///
    pub fn entries(&self) -> impl Iterator<Item = (&Sha, u64)> {
        self.shas.iter().zip(self.offsets.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fanout_only_header(shas: &[[u8; 20]]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        buf.extend_from_slice(&VERSION.to_be_bytes());

        let mut fanout = [0u32; 256];
        for sha in shas {
            for f in fanout.iter_mut().skip(sha[0] as usize) {
                *f += 1;
            }
        }
        for f in fanout.iter() {
            buf.extend_from_slice(&f.to_be_bytes());
        }
        let mut sorted = shas.to_vec();
        sorted.sort();
        for sha in &sorted {
            buf.extend_from_slice(sha);
        }
        // crc32s
        for _ in &sorted {
            buf.extend_from_slice(&0u32.to_be_bytes());
        }
        // offsets: just use the index as a fake offset
        for (i, _) in sorted.iter().enumerate() {
            buf.extend_from_slice(&(i as u32).to_be_bytes());
        }
        buf.extend_from_slice(&[0u8; 20]); // pack checksum
        buf.extend_from_slice(&[0u8; 20]); // idx checksum (unchecked)
        buf
    }

    #[test]
    fn finds_known_hash_and_misses_unknown() {
        let a = [0x01; 20];
        let b = [0x02; 20];
        let bytes = fanout_only_header(&[a, b]);
        let mut index = PackIndex::parse(&bytes).unwrap();
        index.pack_path = PathBuf::from("test.pack");

        assert_eq!(index.find(&Sha::from_array(a)), Some(0));
        assert_eq!(index.find(&Sha::from_array(b)), Some(1));
        assert_eq!(index.find(&Sha::from_array([0xff; 20])), None);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = fanout_only_header(&[[0x01; 20]]);
        bytes[0] = 0x00;
        assert!(PackIndex::parse(&bytes).is_err());
    }

    #[test]
    fn rejects_large_offset_flag() {
        let bytes = fanout_only_header(&[[0x01; 20]]);
        // offsets table is the 4-byte-per-entry block right before the
        // 40-byte trailer (pack checksum + idx checksum).
        let offsets_start = bytes.len() - 40 - 4;
        let mut bytes = bytes;
        bytes[offsets_start] = 0x80;
        assert!(PackIndex::parse(&bytes).is_err());
    }
}
