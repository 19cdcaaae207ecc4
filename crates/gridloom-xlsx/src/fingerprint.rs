use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Identity of the source package captured at open time: byte size plus a
/// SHA-256 digest of the whole file.
///
/// Computed by streaming the file in fixed-size chunks, never by loading it
/// into memory. Two fingerprints of the same bytes are always equal, so the
/// staleness check before a surgical write is a pure value comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceFingerprint {
    byte_size: u64,
    digest: [u8; 32],
}

const CHUNK_SIZE: usize = 8 * 1024;

impl SourceFingerprint {
    pub fn from_path(path: &Path) -> Result<Self, std::io::Error> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, std::io::Error> {
        let mut hasher = Sha256::new();
        let mut byte_size = 0u64;
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            let n = reader.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            hasher.update(&chunk[..n]);
            byte_size += n as u64;
        }
        Ok(Self {
            byte_size,
            digest: hasher.finalize().into(),
        })
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    /// Compare against another fingerprint. The digest comparison runs in
    /// constant time so the check does not leak where two files diverge.
    pub fn matches(&self, other: &SourceFingerprint) -> bool {
        let digest_eq: bool = self.digest.as_ref().ct_eq(other.digest.as_ref()).into();
        self.byte_size == other.byte_size && digest_eq
    }

    pub fn digest_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for b in self.digest {
            out.push_str(&format!("{b:02x}"));
        }
        out
    }
}

impl fmt::Display for SourceFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes, sha256:{}", self.byte_size, self.digest_hex())
    }
}
