use std::fmt;

use crate::error::ReaderError;

///
/// A 160-bit object identifier.
///
/// Equality is byte equality; the canonical textual form is 40 lower-case
/// hex characters, produced and parsed via `faster-hex` the same way the
/// rest of the object-store tooling in this family of crates does.
///
#[derive(Clone, Hash, PartialOrd, Ord, PartialEq, Eq)]
pub struct Sha {
    contents: [u8; 20],
}

impl Sha {
    pub fn from_hex(hex: &[u8]) -> Result<Self, ReaderError> {
        use faster_hex::hex_decode;

        if hex.len() != 40 {
            return Err(ReaderError::MalformedObject(format!(
                "hash has length {}, expected 40",
                hex.len()
            )));
        }
        let mut contents = [0u8; 20];
        hex_decode(hex, &mut contents)
            .map_err(|e| ReaderError::MalformedObject(format!("invalid hex hash: {}", e)))?;
        Ok(Self { contents })
    }

    pub fn from_hex_str(hex: &str) -> Result<Self, ReaderError> {
        Self::from_hex(hex.as_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReaderError> {
        if bytes.len() != 20 {
            return Err(ReaderError::MalformedObject(format!(
                "hash has length {}, expected 20",
                bytes.len()
            )));
        }
        let mut contents = [0u8; 20];
        contents.copy_from_slice(bytes);
        Ok(Self { contents })
    }

    pub fn from_array(bytes: [u8; 20]) -> Self {
        Self { contents: bytes }
    }

    pub fn compute_from_bytes(bytes: &[u8]) -> Self {
        use sha1::Digest;
        use sha1::Sha1;

        let contents: [u8; 20] = Sha1::digest(bytes).into();
        Self { contents }
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.contents
    }

    pub fn hex(&self) -> String {
        faster_hex::hex_string(&self.contents[..])
    }
}

impl fmt::Display for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hex())
    }
}

impl fmt::Debug for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha({})", self.hex())
    }
}
