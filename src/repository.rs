//!
//! Binds a filesystem path to its catalog and exposes the reader's public
//! surface: opening objects by hash, materializing deltas, listing the
//! catalog, and reading the current head reference.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::trace;

use crate::catalog::{Catalog, Location};
use crate::delta;
use crate::error::ReaderError;
use crate::hash::Sha;
use crate::loose::{self, ObjectType};
use crate::packfile::{DeltaBase, PackFile, PackObjectType};

/// Which on-disk pack encoding produced a materialized object, kept around
/// for diagnostics even once the payload has been fully reconstructed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaKind {
    Offset,
    Reference,
}

/// A fully reconstructed object: no delta indirection remains.
pub struct MaterializedObject {
    pub hash: Sha,
    pub object_type: ObjectType,
    pub payload: Vec<u8>,
    /// `Some(kind)` if this object's immediate on-disk entry was a delta
    /// against some base (the base may itself have been a delta; this only
    /// describes the entry this hash names). `None` for loose objects and
    /// non-delta packed entries.
    pub delta_applied: Option<DeltaKind>,
}

pub struct Repository {
    git_dir: PathBuf,
    objects_dir: PathBuf,
    catalog: Catalog,
}

impl Repository {
    ///
    /// Validates `<path>/.git` is a directory and builds its catalog.
    ///
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let git_dir = path.join(".git");
        if !git_dir.is_dir() {
            return Err(ReaderError::NotARepository(git_dir).into());
        }
        let objects_dir = git_dir.join("objects");
        let catalog = Catalog::build(&objects_dir)
            .with_context(|| format!("building catalog under {}", objects_dir.display()))?;

        Ok(Repository {
            git_dir,
            objects_dir,
            catalog,
        })
    }

    ///
    /// Looks up `hash` in the catalog and materializes it, recursively
    /// resolving any delta chain.
    ///
    pub fn open_object(&self, hash: &Sha) -> Result<MaterializedObject> {
        match self
            .catalog
            .locate(hash)
            .ok_or_else(|| ReaderError::UnknownHash(hash.hex()))?
        {
            Location::Loose => {
                let obj = loose::read(&self.objects_dir, hash)?;
                Ok(MaterializedObject {
                    hash: hash.clone(),
                    object_type: obj.object_type,
                    payload: obj.payload,
                    delta_applied: None,
                })
            }
            Location::Packed { pack_path, offset } => self.materialize_packed(pack_path, *offset, hash),
        }
    }

    fn materialize_packed(&self, pack_path: &Path, offset: u64, hash: &Sha) -> Result<MaterializedObject> {
        let mut pack = PackFile::open(pack_path)?;
        let entry = pack.read_at_offset(offset)?;

        let object_type = match entry.object_type {
            PackObjectType::Commit => ObjectType::Commit,
            PackObjectType::Tree => ObjectType::Tree,
            PackObjectType::Blob => ObjectType::Blob,
            PackObjectType::Tag => ObjectType::Tag,
            PackObjectType::OfsDelta | PackObjectType::RefDelta => {
                let delta_kind = match entry.object_type {
                    PackObjectType::OfsDelta => DeltaKind::Offset,
                    PackObjectType::RefDelta => DeltaKind::Reference,
                    _ => unreachable!("matched on a delta variant above"),
                };
                let base_hash = match &entry.delta_base {
                    Some(DeltaBase::Offset(base_offset)) => self
                        .catalog
                        .resolve_offset(pack_path, *base_offset)
                        .cloned()
                        .ok_or_else(|| {
                            ReaderError::UnresolvedBase(format!(
                                "no catalog entry at offset {} in {}",
                                base_offset,
                                pack_path.display()
                            ))
                        })?,
                    Some(DeltaBase::Reference(sha)) => sha.clone(),
                    None => unreachable!("delta entry without a delta base"),
                };

                trace!(base = %base_hash, "resolving delta base");
                let base = self.open_object(&base_hash)?;
                let payload = delta::apply(&base.payload, &entry.payload)?;
                return Ok(MaterializedObject {
                    hash: hash.clone(),
                    object_type: base.object_type,
                    payload,
                    delta_applied: Some(delta_kind),
                });
            }
        };

        Ok(MaterializedObject {
            hash: hash.clone(),
            object_type,
            payload: entry.payload,
            delta_applied: None,
        })
    }

    pub fn list_objects(&self) -> impl Iterator<Item = (&Sha, &Location)> {
        self.catalog.iter()
    }

    pub fn object_count(&self) -> usize {
        self.catalog.len()
    }

    ///
    /// Reads `HEAD`, following one symbolic redirection (`ref: <path>`), or
    /// accepting a raw 40-char hash directly (detached-head state).
    ///
    pub fn head_reference(&self) -> Result<String> {
        let head_path = self.git_dir.join("HEAD");
        let contents = std::fs::read_to_string(&head_path)
            .with_context(|| format!("reading {}", head_path.display()))?;
        let contents = contents.trim();

        if let Some(rest) = contents.strip_prefix("ref:") {
            let ref_path = self.git_dir.join(rest.trim());
            let target = std::fs::read_to_string(&ref_path)
                .with_context(|| format!("reading {}", ref_path.display()))?;
            Ok(target.trim().to_string())
        } else {
            Sha::from_hex_str(contents)
                .map_err(|_| ReaderError::MalformedObject(format!("HEAD contents not understood: {:?}", contents)))?;
            Ok(contents.to_string())
        }
    }
}
