//!
//! Reads a single loose object: `<objects-dir>/<hash[0:2]>/<hash[2:]>`, a
//! zlib stream of `"<type> <len>\0<payload>"`.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::Result;
use flate2::read::ZlibDecoder;

use crate::error::ReaderError;
use crate::hash::Sha;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectType {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectType {
    fn from_token(token: &str) -> Result<Self> {
        match token {
            "commit" => Ok(ObjectType::Commit),
            "tree" => Ok(ObjectType::Tree),
            "blob" => Ok(ObjectType::Blob),
            "tag" => Ok(ObjectType::Tag),
            other => Err(ReaderError::MalformedObject(format!("unknown object type {:?}", other)).into()),
        }
    }
}

pub struct LooseObject {
    pub object_type: ObjectType,
    pub payload: Vec<u8>,
}

///
/// Reads and verifies the loose object named `hash` under `objects_dir`.
///
pub fn read(objects_dir: &Path, hash: &Sha) -> Result<LooseObject> {
    let hex = hash.hex();
    let path = objects_dir.join(&hex[0..2]).join(&hex[2..]);

    let mut compressed = Vec::new();
    File::open(&path)?.read_to_end(&mut compressed)?;

    let mut data = Vec::new();
    ZlibDecoder::new(&compressed[..]).read_to_end(&mut data)?;

    let computed = Sha::compute_from_bytes(&data);
    if &computed != hash {
        return Err(ReaderError::IntegrityMismatch {
            expected: hash.hex(),
            actual: computed.hex(),
        }
        .into());
    }

    let nul = data
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| ReaderError::MalformedObject("missing header terminator".to_string()))?;

    let header = std::str::from_utf8(&data[..nul])
        .map_err(|_| ReaderError::MalformedObject("header is not valid utf-8".to_string()))?;
    let mut parts = header.splitn(2, ' ');
    let type_token = parts
        .next()
        .ok_or_else(|| ReaderError::MalformedObject("missing type token".to_string()))?;
    let len_token = parts
        .next()
        .ok_or_else(|| ReaderError::MalformedObject("missing length token".to_string()))?;

    let object_type = ObjectType::from_token(type_token)?;
    let declared_len: usize = len_token
        .parse()
        .map_err(|_| ReaderError::MalformedObject(format!("invalid length {:?}", len_token)))?;

    let payload = data[nul + 1..].to_vec();
    if payload.len() != declared_len {
        return Err(ReaderError::MalformedObject(format!(
            "declared length {} does not match actual payload length {}",
            declared_len,
            payload.len()
        ))
        .into());
    }

    Ok(LooseObject {
        object_type,
        payload,
    })
}
