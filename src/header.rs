//! Fixed-size file header shared by the keon and keva formats.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{Error, SIGNATURE_KEON, SIGNATURE_KEVA};

/// Byte length of the on-disk header: ten big-endian unsigned 64-bit words.
pub const HEADER_LEN: usize = 80;

/// Store kind, as recorded in the header signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    /// Set-only store (`.keon`).
    Keon,
    /// Key-to-value store (`.keva`).
    Keva,
}

/// Decoded file header.
///
/// The header carries everything a loader needs to rebuild the slot array
/// without recomputing geometry, plus a checksum for payload validation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Header {
    /// Format signature; see [`SIGNATURE_KEON`] and [`SIGNATURE_KEVA`].
    pub signature: u64,
    /// XOR fold of every key slot at save time.
    pub checksum: u64,
    /// Unix seconds at save time; informational.
    pub timestamp: u64,
    /// Occupied slots at save time.
    pub count: u64,
    /// Declared capacity.
    pub max: u64,
    /// Number of buckets.
    pub depth: u64,
    /// Slots per bucket.
    pub width: u64,
    /// Bucket padding in thousandths, as resolved at construction.
    pub density: u64,
    /// Outer displacement rounds configured for inserts.
    pub shuffler: u64,
    /// Cyclic-movement limit configured for inserts.
    pub tracker: u64,
}

impl Header {
    pub(crate) fn encode(&self) -> [u8; HEADER_LEN] {
        let words = [
            self.signature,
            self.checksum,
            self.timestamp,
            self.count,
            self.max,
            self.depth,
            self.width,
            self.density,
            self.shuffler,
            self.tracker,
        ];
        let mut raw = [0u8; HEADER_LEN];
        for (i, word) in words.into_iter().enumerate() {
            raw[i * 8..i * 8 + 8].copy_from_slice(&word.to_be_bytes());
        }
        raw
    }

    pub(crate) fn decode(raw: &[u8; HEADER_LEN]) -> Header {
        let word = |i: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&raw[i * 8..i * 8 + 8]);
            u64::from_be_bytes(bytes)
        };
        Header {
            signature: word(0),
            checksum: word(1),
            timestamp: word(2),
            count: word(3),
            max: word(4),
            depth: word(5),
            width: word(6),
            density: word(7),
            shuffler: word(8),
            tracker: word(9),
        }
    }

    /// Validity probe: a plausible signature plus non-zero checksum,
    /// timestamp, and capacity.
    pub fn is_valid(&self) -> bool {
        self.signature > 0xFF00 && self.checksum > 0 && self.timestamp > 0 && self.max > 0
    }

    /// Store kind denoted by the signature, if recognized.
    pub fn kind(&self) -> Option<Kind> {
        match self.signature {
            SIGNATURE_KEON => Some(Kind::Keon),
            SIGNATURE_KEVA => Some(Kind::Keva),
            _ => None,
        }
    }

    /// Total slot count described by the header geometry.
    pub fn slots(&self) -> u64 {
        self.depth * self.width
    }
}

/// Read and validate the header of a store file without touching its payload.
///
/// # Errors
///
/// Returns [`Error::InvalidHeader`] when the file is shorter than a header or
/// fails the validity probe; IO failures opening the file are forwarded.
pub fn info<P: AsRef<Path>>(path: P) -> Result<Header, Error> {
    let mut file = File::open(path)?;
    let mut raw = [0u8; HEADER_LEN];
    file.read_exact(&mut raw).map_err(|_| Error::InvalidHeader)?;
    let header = Header::decode(&raw);
    if !header.is_valid() {
        return Err(Error::InvalidHeader);
    }
    Ok(header)
}

// The validity probe requires a non-zero timestamp.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(1)
}
