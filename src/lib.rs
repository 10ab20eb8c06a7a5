//!
//! A read-only reader for a git-style content-addressed object store:
//! loose and packed objects, delta resolution, and tree parsing, fronted by
//! a small repository façade.

pub mod catalog;
pub mod cli;
pub mod delta;
pub mod error;
pub mod hash;
pub mod loose;
pub mod packfile;
pub mod repository;
pub mod tree;
pub mod varint;

pub use error::ReaderError;
pub use hash::Sha;
pub use repository::{DeltaKind, MaterializedObject, Repository};
