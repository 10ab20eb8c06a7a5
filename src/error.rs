use std::fmt;
use std::io;
use std::path::PathBuf;

///
/// The flat set of error conditions this reader can report.
///
/// Every fallible operation in the crate returns one of these, wrapped in
/// `anyhow::Result` at the API boundary so callers get free `Context`
/// (`.context("...")`) without us having to hand-roll conversions for every
/// leaf `io::Error`.
///
#[derive(Debug)]
pub enum ReaderError {
    NotARepository(PathBuf),
    UnknownHash(String),
    MissingPack(PathBuf),
    UnsupportedIndex(String),
    MalformedObject(String),
    MalformedPack(String),
    MalformedDelta(String),
    IntegrityMismatch { expected: String, actual: String },
    UnresolvedBase(String),
    Io(io::Error),
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderError::NotARepository(path) => {
                write!(f, "not a repository: {}", path.display())
            }
            ReaderError::UnknownHash(hash) => write!(f, "unknown object: {}", hash),
            ReaderError::MissingPack(path) => {
                write!(f, "index present but pack file missing: {}", path.display())
            }
            ReaderError::UnsupportedIndex(reason) => write!(f, "unsupported pack index: {}", reason),
            ReaderError::MalformedObject(reason) => write!(f, "malformed loose object: {}", reason),
            ReaderError::MalformedPack(reason) => write!(f, "malformed pack entry: {}", reason),
            ReaderError::MalformedDelta(reason) => write!(f, "malformed delta stream: {}", reason),
            ReaderError::IntegrityMismatch { expected, actual } => write!(
                f,
                "integrity mismatch: expected {}, computed {}",
                expected, actual
            ),
            ReaderError::UnresolvedBase(reason) => write!(f, "could not resolve delta base: {}", reason),
            ReaderError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for ReaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReaderError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ReaderError {
    fn from(e: io::Error) -> Self {
        ReaderError::Io(e)
    }
}
