//!
//! Enumerates every object a repository knows about — loose files plus
//! every pack index — into a single lookup from hash to storage location,
//! along with the `(pack-file, offset) -> hash` reverse index `ofs_delta`
//! resolution needs.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::hash::Sha;
use crate::packfile::index::PackIndex;

///
/// Where an object's bytes live.
///
#[derive(Clone, Debug)]
pub enum Location {
    Loose,
    Packed { pack_path: PathBuf, offset: u64 },
}

pub struct Catalog {
    locations: HashMap<Sha, Location>,
    /// `(pack-file, offset) -> hash`, populated alongside `locations` while
    /// walking each index, so `ofs_delta` bases resolve in O(1) instead of a
    /// linear scan over every catalog entry.
    by_offset: HashMap<(PathBuf, u64), Sha>,
}

impl Catalog {
    ///
    /// Builds a catalog for the object store rooted at `objects_dir`
    /// (typically `<repo>/.git/objects`). Loose entries are enumerated
    /// first, then packs; on hash collision the packed entry wins, matching
    /// this build order.
    ///
    pub fn build(objects_dir: &Path) -> Result<Self> {
        let mut locations = HashMap::new();
        let mut by_offset = HashMap::new();

        for_each_loose_entry(objects_dir, |hash| {
            locations.insert(hash, Location::Loose);
        })?;

        let pack_dir = objects_dir.join("pack");
        if pack_dir.is_dir() {
            let mut idx_paths: Vec<PathBuf> = std::fs::read_dir(&pack_dir)
                .with_context(|| format!("reading pack directory {}", pack_dir.display()))?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension() == Some(OsStr::new("idx")))
                .collect();
            idx_paths.sort();

            for idx_path in idx_paths {
                let index = PackIndex::open(&idx_path)?;
                let pack_path = index.pack_path().to_path_buf();
                for (hash, offset) in index.entries() {
                    by_offset
                        .entry((pack_path.clone(), offset))
                        .or_insert_with(|| hash.clone());

                    // Packed always beats loose, but among packs the first
                    // index enumerated (sorted idx-filename order) wins --
                    // don't let a later pack's entry for the same hash
                    // displace an earlier one.
                    let already_packed = matches!(locations.get(&hash), Some(Location::Packed { .. }));
                    if !already_packed {
                        locations.insert(
                            hash.clone(),
                            Location::Packed {
                                pack_path: pack_path.clone(),
                                offset,
                            },
                        );
                    }
                }
            }
        }

        debug!(object_count = locations.len(), "catalog built");

        Ok(Catalog {
            locations,
            by_offset,
        })
    }

    pub fn locate(&self, hash: &Sha) -> Option<&Location> {
        self.locations.get(hash)
    }

    pub fn resolve_offset(&self, pack_path: &Path, offset: u64) -> Option<&Sha> {
        self.by_offset.get(&(pack_path.to_path_buf(), offset))
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Sha, &Location)> {
        self.locations.iter()
    }
}

fn for_each_loose_entry(objects_dir: &Path, mut f: impl FnMut(Sha)) -> Result<()> {
    if !objects_dir.is_dir() {
        return Ok(());
    }
    let mut shard_dirs: Vec<PathBuf> = std::fs::read_dir(objects_dir)
        .with_context(|| format!("reading objects directory {}", objects_dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir() && p.file_name().and_then(OsStr::to_str).map_or(false, |n| n.len() == 2))
        .collect();
    shard_dirs.sort();

    for shard in shard_dirs {
        let prefix = shard.file_name().and_then(OsStr::to_str).unwrap_or("").to_string();
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&shard)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        entries.sort();

        for entry in entries {
            let suffix = match entry.file_name().and_then(OsStr::to_str) {
                Some(s) => s,
                None => continue,
            };
            let hex = format!("{}{}", prefix, suffix);
            if let Ok(hash) = Sha::from_hex_str(&hex) {
                f(hash);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_objects_dir_yields_empty_catalog() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("pack")).unwrap();
        let catalog = Catalog::build(dir.path()).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn finds_loose_entries() {
        let dir = TempDir::new().unwrap();
        let hash = Sha::compute_from_bytes(b"blob 5\0hello");
        let hex = hash.hex();
        let shard = dir.path().join(&hex[0..2]);
        std::fs::create_dir_all(&shard).unwrap();
        std::fs::write(shard.join(&hex[2..]), b"placeholder").unwrap();

        let catalog = Catalog::build(dir.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(matches!(catalog.locate(&hash), Some(Location::Loose)));
    }
}
