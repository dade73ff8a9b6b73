//! Bulk composition of a loaded store with another store file.
//!
//! Merge streams the source file's payload and applies each non-zero
//! fingerprint to the target with the raw (already-hashed) operations, so
//! slots move between files without touching the hasher. The result carries
//! an XOR of the fingerprints actually applied; the target's checksum must
//! land exactly on `before XOR applied` or the merge reports failure.

use std::fs::File;
use std::hash::Hasher;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::header::{Header, HEADER_LEN};
use crate::{Keon, Keva, SIGNATURE_KEON, SIGNATURE_KEVA};

/// What to do with the source file's fingerprints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MergeAction {
    /// Add the source's entries to the target.
    #[default]
    Insert,
    /// Delete the source's entries from the target.
    Remove,
}

/// Outcome of a merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// The merge ran to completion and the checksum identity held.
    pub ok: bool,
    /// The source was rejected: wrong signature, empty, or zero checksum.
    pub invalid: bool,
    /// The source cannot fit, either up front or mid-stream. The up-front
    /// check charges the full source count against the target's capacity
    /// whatever the action, removes included.
    pub no_space: bool,
    /// Fingerprints actually inserted or removed; pre-existing entries on
    /// insert (and absent ones on remove) are skipped, not counted.
    pub items: u64,
    /// XOR of the applied fingerprints.
    pub checksum: u64,
}

fn open_source<P: AsRef<Path>>(path: P) -> Option<(BufReader<File>, Header)> {
    let mut reader = BufReader::new(File::open(path).ok()?);
    let mut raw = [0u8; HEADER_LEN];
    reader.read_exact(&mut raw).ok()?;
    Some((reader, Header::decode(&raw)))
}

impl<H: Hasher + Default> Keon<H> {
    /// Apply another keon file's fingerprints to this store.
    ///
    /// The source is rejected with `no_space` unless
    /// `len() + source.count <= capacity()`, for removes as well as inserts.
    /// A partially applied merge (after a mid-stream failure) is permitted;
    /// the caller can detect it through `ok` and the checksum identity.
    pub fn merge<P: AsRef<Path>>(&mut self, path: P, action: MergeAction) -> MergeReport {
        let mut report = MergeReport::default();
        let before = self.checksum();

        let Some((mut reader, source)) = open_source(path) else {
            report.invalid = true;
            return report;
        };

        report.invalid =
            source.signature != SIGNATURE_KEON || source.count == 0 || source.checksum == 0;
        report.no_space = self.len() + source.count > self.capacity();
        report.ok = !report.invalid && !report.no_space;
        if !report.ok {
            return report;
        }

        let mut word = [0u8; 8];
        while reader.read_exact(&mut word).is_ok() {
            let hash = u64::from_be_bytes(word);
            if hash == 0 {
                continue;
            }
            match action {
                MergeAction::Insert => {
                    let applied = self.insert_raw(hash);
                    if applied.exist {
                        continue;
                    }
                    if applied.no_space {
                        report.ok = false;
                        report.no_space = true;
                        return report;
                    }
                    if !applied.ok {
                        break;
                    }
                    report.checksum ^= hash;
                    report.items += 1;
                }
                MergeAction::Remove => {
                    if self.remove_raw(hash).exist {
                        report.checksum ^= hash;
                        report.items += 1;
                    }
                }
            }
        }

        report.ok = self.checksum() == before ^ report.checksum;
        report
    }
}

impl<H: Hasher + Default> Keva<H> {
    /// Apply another keva file's entries to this store.
    ///
    /// The source is rejected with `no_space` unless
    /// `len() + source.count <= capacity()`, for removes as well as inserts.
    /// Inserts run with update semantics: an entry whose fingerprint already
    /// exists refreshes the stored value but is skipped in the item count,
    /// keeping the checksum identity intact.
    pub fn merge<P: AsRef<Path>>(&mut self, path: P, action: MergeAction) -> MergeReport {
        let mut report = MergeReport::default();
        let before = self.checksum();

        let Some((mut reader, source)) = open_source(path) else {
            report.invalid = true;
            return report;
        };

        report.invalid =
            source.signature != SIGNATURE_KEVA || source.count == 0 || source.checksum == 0;
        report.no_space = self.len() + source.count > self.capacity();
        report.ok = !report.invalid && !report.no_space;
        if !report.ok {
            return report;
        }

        let mut key_word = [0u8; 8];
        let mut value_word = [0u8; 8];
        loop {
            if reader.read_exact(&mut key_word).is_err()
                || reader.read_exact(&mut value_word).is_err()
            {
                break;
            }
            let hash = u64::from_be_bytes(key_word);
            if hash == 0 {
                continue;
            }
            match action {
                MergeAction::Insert => {
                    let applied = self.update_raw(hash, u64::from_be_bytes(value_word));
                    if applied.exist {
                        continue;
                    }
                    if applied.no_space {
                        report.ok = false;
                        report.no_space = true;
                        return report;
                    }
                    if !applied.ok {
                        break;
                    }
                    report.checksum ^= hash;
                    report.items += 1;
                }
                MergeAction::Remove => {
                    if self.remove_raw(hash).exist {
                        report.checksum ^= hash;
                        report.items += 1;
                    }
                }
            }
        }

        report.ok = self.checksum() == before ^ report.checksum;
        report
    }
}
