//!
//! Parses the payload of a `tree` object: a concatenation of entries, each
//! an ASCII octal-looking mode, a NUL-terminated name, and a raw 20-byte
//! hash, with no other framing.

use nom::bytes::complete::{tag, take, take_while1};
use nom::combinator::map_res;
use nom::sequence::tuple;
use nom::IResult;

use crate::hash::Sha;

/// How a tree entry's mode classifies it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Blob,
    Executable,
    SubTree,
    Symlink,
    Submodule,
    /// A mode this reader doesn't special-case, kept rather than dropped.
    Other,
}

impl EntryKind {
    fn from_mode(mode: u32) -> Self {
        match mode {
            0o100644 => EntryKind::Blob,
            0o100755 => EntryKind::Executable,
            0o040000 => EntryKind::SubTree,
            0o120000 => EntryKind::Symlink,
            0o160000 => EntryKind::Submodule,
            _ => EntryKind::Other,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: u32,
    pub kind: EntryKind,
    pub name: String,
    pub hash: Sha,
}

///
/// A parsed tree: the full ordered entry list as it appeared in the payload
/// (already name-sorted, since that's how git writes them), plus the
/// sub-tree/blob convenience splits callers most often want.
///
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn parse(payload: &[u8]) -> anyhow::Result<Self> {
        let mut entries = Vec::new();
        let mut rest = payload;
        while !rest.is_empty() {
            let (remainder, entry) = parse_entry(rest)
                .map_err(|e| crate::error::ReaderError::MalformedObject(format!("{}", e)))?;
            entries.push(entry);
            rest = remainder;
        }
        Ok(Tree { entries })
    }

    pub fn sub_trees(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter().filter(|e| e.kind == EntryKind::SubTree)
    }

    pub fn blobs(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.kind, EntryKind::Blob | EntryKind::Executable))
    }

    pub fn others(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter().filter(|e| {
            matches!(
                e.kind,
                EntryKind::Symlink | EntryKind::Submodule | EntryKind::Other
            )
        })
    }
}

fn mode_number(bytes: &[u8]) -> Result<u32, std::num::ParseIntError> {
    // Tree modes are ASCII octal-looking decimal digit strings (e.g.
    // "100644"), but git writes and reads them as plain base-10 text, not
    // base-8 -- parse them the same way.
    std::str::from_utf8(bytes).unwrap_or("").parse::<u32>()
}

fn parse_entry(input: &[u8]) -> IResult<&[u8], TreeEntry> {
    let (input, (mode, _, name_bytes, _, hash_bytes)) = tuple((
        map_res(take_while1(|b: u8| b.is_ascii_digit()), mode_number),
        tag(b" "),
        take_while1(|b: u8| b != 0),
        tag(b"\0"),
        take(20usize),
    ))(input)?;

    let name = String::from_utf8_lossy(name_bytes).into_owned();
    let mut hash_arr = [0u8; 20];
    hash_arr.copy_from_slice(hash_bytes);

    Ok((
        input,
        TreeEntry {
            mode,
            kind: EntryKind::from_mode(mode),
            name,
            hash: Sha::from_array(hash_arr),
        },
    ))
}
