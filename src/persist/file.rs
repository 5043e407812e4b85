//! One file per formula under a directory.
//!
//! ## File format
//!
//! ```text
//! Offset  Size  Field
//! 0       4     Magic bytes: b"FMLA"
//! 4       2     Format version (u16, little-endian)
//! 6       2     Reserved (zero)
//! 8       4     Flags (u32, reserved)
//! 12      4     Payload length in bytes (u32, little-endian)
//! 16      16    BLAKE3 hash of the payload (truncated to 16 bytes)
//! 32..    var   JSON payload: {"formulaId": .., "sequence": [..]}
//! ```
//!
//! The format version must match exactly.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::{FormulaStore, PersistenceError};
use crate::types::{FormulaId, Sequence};
use crate::wire::{WireToken, decode_sequence, encode_sequence};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const MAGIC: &[u8; 4] = b"FMLA";
const FORMAT_VERSION: u16 = 1;
const HEADER_SIZE: usize = 32;
const EXTENSION: &str = "fmla";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A stored file whose framing does not check out.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("not a formula file: invalid magic bytes")]
    BadMagic,

    #[error("incompatible format version: file is v{found}, supported is v{supported}")]
    IncompatibleVersion { found: u16, supported: u16 },

    #[error("integrity check failed: BLAKE3 checksum mismatch")]
    ChecksumMismatch,

    #[error("payload length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: u32, actual: usize },

    #[error("payload too large: {0} bytes")]
    TooLarge(usize),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSequence {
    formula_id: String,
    sequence: Vec<WireToken>,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Stores each formula in `<dir>/<hash of id>.fmla`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Use `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding `formula_id`. Ids are hashed so any string is a safe name.
    #[must_use]
    pub fn path_for(&self, formula_id: &FormulaId) -> PathBuf {
        let hash = blake3::hash(formula_id.as_str().as_bytes());
        let hex = hash.to_hex();
        let name = &hex[..32];
        self.dir.join(format!("{name}.{EXTENSION}"))
    }

    pub fn remove(&self, formula_id: &FormulaId) -> Result<bool, PersistenceError> {
        match fs::remove_file(self.path_for(formula_id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl FormulaStore for FileStore {
    fn save(&mut self, formula_id: &FormulaId, sequence: &Sequence) -> Result<(), PersistenceError> {
        let stored = StoredSequence {
            formula_id: formula_id.to_string(),
            sequence: encode_sequence(sequence),
        };
        let bytes = encode(&serde_json::to_vec(&stored)?)?;

        let path = self.path_for(formula_id);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;
        debug!(formula_id = %formula_id, path = %path.display(), bytes = bytes.len(), "wrote formula file");
        Ok(())
    }

    fn load(&self, formula_id: &FormulaId) -> Result<Option<Sequence>, PersistenceError> {
        let bytes = match fs::read(self.path_for(formula_id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredSequence = serde_json::from_slice(decode(&bytes)?)?;
        Ok(Some(decode_sequence(stored.sequence)?))
    }
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

fn encode(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let payload_len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge(payload.len()))?;
    let hash = blake3::hash(payload);

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&payload_len.to_le_bytes());
    buf.extend_from_slice(&hash.as_bytes()[..16]);
    buf.extend_from_slice(payload);
    Ok(buf)
}

#[allow(clippy::cast_possible_truncation)] // HEADER_SIZE is 32
fn decode(bytes: &[u8]) -> Result<&[u8], FrameError> {
    if bytes.len() < HEADER_SIZE {
        return Err(FrameError::LengthMismatch {
            expected: HEADER_SIZE as u32,
            actual: bytes.len(),
        });
    }
    if &bytes[0..4] != MAGIC {
        return Err(FrameError::BadMagic);
    }

    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FORMAT_VERSION {
        return Err(FrameError::IncompatibleVersion {
            found: version,
            supported: FORMAT_VERSION,
        });
    }

    let payload_len = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
    let payload = &bytes[HEADER_SIZE..];
    if payload.len() != payload_len as usize {
        return Err(FrameError::LengthMismatch {
            expected: payload_len,
            actual: payload.len(),
        });
    }

    if blake3::hash(payload).as_bytes()[..16] != bytes[16..32] {
        return Err(FrameError::ChecksumMismatch);
    }
    Ok(payload)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
