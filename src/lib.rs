//! Compact cuckoo-style key stores with a stable on-disk format.
//!
//! Two variants share one engine: [`Keon`], a set-only store answering
//! membership questions, and [`Keva`], a key-to-`u64` store. Keys are
//! reduced to non-zero 64-bit fingerprints and spread over bucketed slots
//! by three-choice hashing; when every candidate slot is taken, inserts
//! rebalance residents with short randomized displacement walks. With a
//! padding density of zero the table approximates a minimum perfect hash:
//! builds get slower, lookups stay at most `3 × width` comparisons.
//!
//! Stores are built once (or updated in bulk via [`Keon::merge`] /
//! [`Keva::merge`]), saved as flat files, and queried many times.
//!
//! ```
//! use kvs::Keon;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = Keon::with_capacity(100)?;
//! assert!(store.insert(b"example.com").ok);
//! assert!(store.lookup(b"example.com"));
//! assert!(!store.lookup(b"example.org"));
//! # Ok(())
//! # }
//! ```
//!
//! Readers borrow `&self` (lookup, export, checksum) and mutators borrow
//! `&mut self` (insert, update, remove, merge); that split is the entire
//! concurrency contract. There is no internal locking.

use std::hash::Hasher;

/// File signature of a set-only store.
pub const SIGNATURE_KEON: u64 = 0xFF01;
/// File signature of a key-value store.
pub const SIGNATURE_KEVA: u64 = 0xFF02;

// Candidate-bucket mixing primes. Placement on disk depends on these exact
// values; changing either breaks compatibility with existing store files.
pub(crate) const MIX_PRIME_1: u64 = 0x9E37_79B9_7F4A_7C15;
pub(crate) const MIX_PRIME_2: u64 = 0x85EB_CA77_C2B2_AE63;

/// Error type for store file operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// The file header is unreadable or fails the validity probe.
    #[error("invalid store header")]
    InvalidHeader,
    /// The header signature does not match the store kind being loaded.
    #[error("unexpected store signature {0:#x}")]
    Signature(u64),
    /// The payload length disagrees with the header geometry.
    #[error("payload length disagrees with header geometry")]
    Length,
    /// The slot payload does not reproduce the recorded checksum.
    #[error("checksum validation failed")]
    Checksum,
}

/// Outcome flags of a single insert or update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InsertReport {
    /// The key is now present and this call placed it (or refreshed its
    /// value, for an update of an existing key).
    pub ok: bool,
    /// The fingerprint was already present before this call.
    pub exist: bool,
    /// The store is at capacity, or the displacement walk exhausted its
    /// budget; the store is unchanged either way.
    pub no_space: bool,
}

/// Outcome flags of a single remove.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RemoveReport {
    /// The fingerprint was usable (non-zero).
    pub ok: bool,
    /// The fingerprint was found and its slot reclaimed.
    pub exist: bool,
}

/// Reduce a key to its non-zero 64-bit fingerprint under hasher `H`.
///
/// Zero marks empty slots, so a zero hash is pinned to 1.
pub(crate) fn fingerprint<H: Hasher + Default>(key: &[u8]) -> u64 {
    let mut hasher = H::default();
    hasher.write(key);
    match hasher.finish() {
        0 => 1,
        hash => hash,
    }
}

/// Resolve zero-valued tuning options to their defaults.
///
/// A density of 1000 deliberately maps to zero padding: the caller is asking
/// for a minimum perfect table and accepts the build-time cost.
pub(crate) fn resolve_options(
    mut density: u64,
    mut width: u64,
    mut shuffler: u64,
    mut tracker: u64,
) -> (u64, u64, u64, u64) {
    if density == 0 {
        density = 25; // 2.5% padding
    }
    if density == 1000 {
        density = 0;
    }
    if width == 0 {
        width = 3;
    }
    if shuffler == 0 {
        shuffler = 500;
        if tracker == 0 {
            tracker = 50;
        }
    }
    if tracker == 0 {
        tracker = 17 * width;
    }
    (density, width, shuffler, tracker)
}

mod header;
pub use header::{info, Header, Kind, HEADER_LEN};

mod keon;
pub use keon::{Fingerprints, Keon, KeonBuilder, KeonBuilderError};

mod keva;
pub use keva::{Entries, Keva, KevaBuilder, KevaBuilderError};

mod merge;
pub use merge::{MergeAction, MergeReport};
