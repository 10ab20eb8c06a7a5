//! End-to-end coverage across catalog, pack-stream decoding, and delta
//! application, driven entirely through the public `Repository` façade
//! against hand-built loose objects, a pack file, and its index.

use std::io::Write;
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use podb::{Repository, Sha};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn init_git_dir(root: &Path) -> std::path::PathBuf {
    let git_dir = root.join(".git");
    std::fs::create_dir_all(git_dir.join("objects/pack")).unwrap();
    git_dir
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn write_loose(objects_dir: &Path, contents: &[u8]) -> Sha {
    let hash = Sha::compute_from_bytes(contents);
    let hex = hash.hex();
    let shard = objects_dir.join(&hex[0..2]);
    std::fs::create_dir_all(&shard).unwrap();
    std::fs::write(shard.join(&hex[2..]), zlib(contents)).unwrap();
    hash
}

fn pack_entry_header(type_tag: u8, size: u64) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut b0 = (type_tag << 4) | ((size & 0x0f) as u8);
    let mut rest = size >> 4;
    if rest != 0 {
        b0 |= 0x80;
    }
    buf.push(b0);
    while rest != 0 {
        let mut byte = (rest & 0x7f) as u8;
        rest >>= 7;
        if rest != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
    }
    buf
}

fn offset_varint(mut rel: u64) -> Vec<u8> {
    // Encodes the +1-per-continuation-byte ofs_delta base offset, matching
    // `crate::varint::read_offset_varint`'s decoding rule.
    let mut digits = vec![(rel & 0x7f) as u8];
    rel >>= 7;
    while rel != 0 {
        rel -= 1;
        digits.push((rel & 0x7f) as u8 | 0x80);
        rel >>= 7;
    }
    digits.reverse();
    digits
}

/// Builds a `.idx`/`.pack` pair holding `entries` (hash, pack-local bytes at
/// that offset within the pack body that follows the 12-byte header).
fn write_pack(pack_dir: &Path, name: &str, pack_body: &[u8], entries: &[(Sha, u64)]) {
    let mut pack_bytes = Vec::new();
    pack_bytes.extend_from_slice(b"PACK");
    pack_bytes.extend_from_slice(&2u32.to_be_bytes());
    pack_bytes.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    pack_bytes.extend_from_slice(pack_body);
    pack_bytes.extend_from_slice(&[0u8; 20]);
    std::fs::write(pack_dir.join(format!("{}.pack", name)), &pack_bytes).unwrap();

    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    let mut idx_bytes = Vec::new();
    idx_bytes.extend_from_slice(&[0xff, 0x74, 0x4f, 0x63]);
    idx_bytes.extend_from_slice(&2u32.to_be_bytes());

    let mut fanout = [0u32; 256];
    for (hash, _) in &sorted {
        for f in fanout.iter_mut().skip(hash.as_bytes()[0] as usize) {
            *f += 1;
        }
    }
    for f in fanout.iter() {
        idx_bytes.extend_from_slice(&f.to_be_bytes());
    }
    for (hash, _) in &sorted {
        idx_bytes.extend_from_slice(hash.as_bytes());
    }
    for _ in &sorted {
        idx_bytes.extend_from_slice(&0u32.to_be_bytes());
    }
    for (_, offset) in &sorted {
        idx_bytes.extend_from_slice(&(*offset as u32).to_be_bytes());
    }
    idx_bytes.extend_from_slice(&[0u8; 20]);
    idx_bytes.extend_from_slice(&[0u8; 20]);

    std::fs::write(pack_dir.join(format!("{}.idx", name)), &idx_bytes).unwrap();
}

#[test]
fn empty_repo_lists_zero_objects() {
    let dir = TempDir::new().unwrap();
    init_git_dir(dir.path());
    let repo = Repository::open(dir.path()).unwrap();
    assert_eq!(repo.object_count(), 0);
}

#[test]
fn loose_blob_round_trips() {
    let dir = TempDir::new().unwrap();
    let git_dir = init_git_dir(dir.path());
    let hash = write_loose(&git_dir.join("objects"), b"blob 5\0hello");

    let repo = Repository::open(dir.path()).unwrap();
    let obj = repo.open_object(&hash).unwrap();
    assert_eq!(obj.payload, b"hello");
}

#[test]
fn pack_offset_delta_materializes_through_the_repository() {
    let dir = TempDir::new().unwrap();
    let git_dir = init_git_dir(dir.path());
    let pack_dir = git_dir.join("objects/pack");

    let base_hash = Sha::compute_from_bytes(b"base-object-key");
    let delta_hash = Sha::compute_from_bytes(b"delta-object-key");

    let base_header = pack_entry_header(3, 3); // blob, size 3
    let base_offset = 0u64;

    let mut body = Vec::new();
    body.extend_from_slice(&base_header);
    body.extend_from_slice(&zlib(b"abc"));

    let delta_offset = body.len() as u64;
    let delta_header = pack_entry_header(6, 4); // ofs_delta, result size 4
    // delta instructions: (src=3,dst=4) copy 3 bytes at base offset 0, insert 1 'X'
    let delta_payload_plain: Vec<u8> = vec![3, 4, 0x90, 0x00, 0x03, 0x01, b'X'];
    body.extend_from_slice(&delta_header);
    body.extend_from_slice(&offset_varint(delta_offset - base_offset));
    body.extend_from_slice(&zlib(&delta_payload_plain));

    write_pack(
        &pack_dir,
        "pack-test",
        &body,
        &[
            (base_hash.clone(), 12 + base_offset),
            (delta_hash.clone(), 12 + delta_offset),
        ],
    );

    let repo = Repository::open(dir.path()).unwrap();
    assert_eq!(repo.object_count(), 2);

    let base_obj = repo.open_object(&base_hash).unwrap();
    assert_eq!(base_obj.payload, b"abc");
    assert_eq!(base_obj.delta_applied, None);

    let delta_obj = repo.open_object(&delta_hash).unwrap();
    assert_eq!(delta_obj.payload, b"abcX");
    assert_eq!(delta_obj.delta_applied, Some(podb::DeltaKind::Offset));
}

#[test]
fn ref_delta_chain_resolves_through_a_loose_base() {
    let dir = TempDir::new().unwrap();
    let git_dir = init_git_dir(dir.path());
    let objects_dir = git_dir.join("objects");
    let pack_dir = objects_dir.join("pack");

    let base_hash = write_loose(&objects_dir, b"blob 3\0abc");

    let mut body = Vec::new();

    // First ref_delta: base "abc" -> "abcX" (copy 3 bytes, insert 'X').
    let delta1_header = pack_entry_header(7, 4); // ref_delta, result size 4
    let delta1_payload_plain: Vec<u8> = vec![3, 4, 0x90, 0x00, 0x03, 0x01, b'X'];
    let delta1_offset = body.len() as u64;
    body.extend_from_slice(&delta1_header);
    body.extend_from_slice(base_hash.as_bytes());
    body.extend_from_slice(&zlib(&delta1_payload_plain));
    let delta1_hash = Sha::compute_from_bytes(b"ref-delta-one-key");

    // Second ref_delta: "abcX" -> "abcXY" (copy 4 bytes, insert 'Y'), naming
    // the first delta (itself unresolved at parse time) as its base by hash.
    let delta2_header = pack_entry_header(7, 5); // ref_delta, result size 5
    let delta2_payload_plain: Vec<u8> = vec![4, 5, 0x90, 0x00, 0x04, 0x01, b'Y'];
    let delta2_offset = body.len() as u64;
    body.extend_from_slice(&delta2_header);
    body.extend_from_slice(delta1_hash.as_bytes());
    body.extend_from_slice(&zlib(&delta2_payload_plain));
    let delta2_hash = Sha::compute_from_bytes(b"ref-delta-two-key");

    write_pack(
        &pack_dir,
        "pack-chain",
        &body,
        &[
            (delta1_hash.clone(), 12 + delta1_offset),
            (delta2_hash.clone(), 12 + delta2_offset),
        ],
    );

    let repo = Repository::open(dir.path()).unwrap();

    let delta1_obj = repo.open_object(&delta1_hash).unwrap();
    assert_eq!(delta1_obj.payload, b"abcX");
    assert_eq!(delta1_obj.delta_applied, Some(podb::DeltaKind::Reference));

    let delta2_obj = repo.open_object(&delta2_hash).unwrap();
    assert_eq!(delta2_obj.payload, b"abcXY");
    assert_eq!(delta2_obj.delta_applied, Some(podb::DeltaKind::Reference));
}

#[test]
fn unknown_hash_is_reported() {
    let dir = TempDir::new().unwrap();
    init_git_dir(dir.path());
    let repo = Repository::open(dir.path()).unwrap();
    let missing = Sha::compute_from_bytes(b"nothing-here");
    assert!(repo.open_object(&missing).is_err());
}
