//! KE:ON, the set-only membership store.
//!
//! A cuckoo-style hash table that distributes and rebalances fingerprints
//! across three candidate buckets. Behaves like a `HashSet<Vec<u8>>` that
//! only remembers 64-bit fingerprints: far smaller, and packable to within
//! a few percent of its declared capacity (or exactly to it, at density 0).

use std::collections::HashMap;
use std::fs::File;
use std::hash::Hasher;
use std::io::{BufReader, BufWriter, Read, Write};
use std::marker::PhantomData;
use std::path::Path;

use derive_builder::Builder;
use rand::Rng;
use twox_hash::XxHash64;

use crate::header::{unix_now, Header, HEADER_LEN};
use crate::{
    fingerprint, resolve_options, Error, InsertReport, RemoveReport, MIX_PRIME_1, MIX_PRIME_2,
    SIGNATURE_KEON,
};

/// Set-only cuckoo store over 64-bit key fingerprints.
///
/// Construction fixes the geometry: `depth` buckets of `width` slots are
/// allocated from the declared capacity and padding density, and none of it
/// may change afterwards because lookups on a loaded file depend on the
/// placement the builder produced.
///
/// The hasher `H` must be deterministic; store files are only interchangeable
/// between stores using the same `H`. The default is xxhash64 with seed 0,
/// which is stable across platforms and toolchains.
#[derive(Debug, Builder)]
#[builder(
    pattern = "owned",
    build_fn(private, name = "base_build", validate = "Self::validate")
)]
pub struct Keon<H = XxHash64>
where
    H: Hasher + Default,
{
    /// Maximum number of fingerprints the store accepts.
    capacity: u64,

    /// Bucket padding in thousandths above `capacity / width`. Zero selects
    /// the default of 25 (2.5%); 1000 selects no padding at all, trading
    /// build time for a minimum perfect table.
    #[builder(default = "0")]
    density: u64,

    /// Slots per bucket; zero selects the default of 3.
    #[builder(default = "0")]
    width: u64,

    /// Outer displacement rounds before an insert gives up; zero selects the
    /// default of 500.
    #[builder(default = "0")]
    shuffler: u64,

    /// Unique `(bucket, fingerprint)` movements tolerated per round before
    /// the walk jumps to a fresh track; zero derives `17 × width` (or 50
    /// when the shuffler was also defaulted).
    #[builder(default = "0")]
    tracker: u64,

    /// Number of buckets, derived from capacity, width and density.
    #[builder(setter(skip))]
    depth: u64,

    /// Occupied slots.
    #[builder(setter(skip))]
    count: u64,

    /// Flat bucket array of `depth * width` slots; 0 marks an empty slot.
    #[builder(setter(skip))]
    slots: Vec<u64>,

    #[builder(setter(skip))]
    _hasher: PhantomData<H>,
}

impl<H: Hasher + Default> KeonBuilder<H> {
    fn validate(&self) -> Result<(), String> {
        if self.capacity == Some(0) {
            return Err("capacity must be greater than zero".into());
        }
        Ok(())
    }

    /// Build a [`Keon`] with the configured tuning and derived geometry.
    pub fn build(self) -> Result<Keon<H>, KeonBuilderError> {
        let mut keon = self.base_build()?;
        (keon.density, keon.width, keon.shuffler, keon.tracker) =
            resolve_options(keon.density, keon.width, keon.shuffler, keon.tracker);

        keon.depth = keon.capacity / keon.width;
        if keon.depth * keon.width < keon.capacity {
            keon.depth += 1;
        }
        keon.depth += keon.depth * keon.density / 1000;
        keon.slots = vec![0u64; (keon.depth * keon.width) as usize];
        Ok(keon)
    }
}

impl Keon<XxHash64> {
    /// Create a new builder with default tuning.
    pub fn builder() -> KeonBuilder<XxHash64> {
        KeonBuilder::default()
    }

    /// Create a store for `capacity` keys with default tuning.
    pub fn with_capacity(capacity: u64) -> Result<Keon<XxHash64>, KeonBuilderError> {
        Self::builder().capacity(capacity).build()
    }
}

impl<H: Hasher + Default> Keon<H> {
    /// Number of stored fingerprints.
    pub fn len(&self) -> u64 {
        self.count
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Declared capacity.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Fill ratio in whole percent.
    pub fn ratio(&self) -> u64 {
        if self.capacity == 0 {
            return 0;
        }
        self.count * 100 / self.capacity
    }

    /// Order-independent checksum: XOR fold over every slot.
    pub fn checksum(&self) -> u64 {
        self.slots.iter().fold(0, |acc, &slot| acc ^ slot)
    }

    /// Membership test for `key`; at most `3 × width` slot comparisons.
    pub fn lookup(&self, key: &[u8]) -> bool {
        let hash = fingerprint::<H>(key);
        for &base in &self.candidates(hash) {
            for slot in base..base + self.width {
                if self.slots[slot as usize] == hash {
                    return true;
                }
            }
        }
        false
    }

    /// Insert `key`; an already-present fingerprint reports `exist` and
    /// leaves the store unchanged.
    pub fn insert(&mut self, key: &[u8]) -> InsertReport {
        self.place(fingerprint::<H>(key), false)
    }

    /// Insert `key`, also reporting `ok` when the fingerprint was already
    /// present.
    pub fn update(&mut self, key: &[u8]) -> InsertReport {
        self.place(fingerprint::<H>(key), true)
    }

    /// Insert a pre-computed fingerprint, bypassing the hasher.
    ///
    /// Used to move slots between stores without re-hashing; the caller is
    /// responsible for the fingerprint being non-zero.
    pub fn insert_raw(&mut self, hash: u64) -> InsertReport {
        self.place(hash, false)
    }

    /// [`insert_raw`](Self::insert_raw) with update semantics.
    pub fn update_raw(&mut self, hash: u64) -> InsertReport {
        self.place(hash, true)
    }

    /// Remove `key` if present.
    pub fn remove(&mut self, key: &[u8]) -> RemoveReport {
        self.unplace(fingerprint::<H>(key))
    }

    /// Remove a pre-computed fingerprint, bypassing the hasher.
    pub fn remove_raw(&mut self, hash: u64) -> RemoveReport {
        self.unplace(hash)
    }

    /// Iterate the stored fingerprints in storage order, big-endian encoded.
    ///
    /// Each call starts a fresh pass; the iterator borrows the store and is
    /// safe to run alongside other readers.
    pub fn export(&self) -> Fingerprints<'_> {
        Fingerprints {
            slots: &self.slots,
            index: 0,
        }
    }

    /// Slot-base offsets of the three candidate buckets for `hash`.
    fn candidates(&self, hash: u64) -> [u64; 3] {
        [
            self.width * (hash % self.depth),
            self.width * ((hash ^ MIX_PRIME_1) % self.depth),
            self.width * ((hash ^ MIX_PRIME_2) % self.depth),
        ]
    }

    /// Place `hash` in one of its candidate buckets, displacing residents
    /// if necessary.
    ///
    /// The displacement phase runs up to `shuffler` short random walks. Each
    /// walk swaps the carried fingerprint into a random candidate slot and
    /// tries to re-home the displaced resident in one of its *other* buckets;
    /// a `(bucket, fingerprint)` tracker aborts the walk once it starts
    /// cycling, and the next walk restarts with fresh random picks. Restart
    /// over persistence is deliberate: many short tracks locate an open slot
    /// about twice as fast as one long one.
    ///
    /// Every swap is journaled. If the whole budget exhausts, the journal is
    /// unwound in reverse so a failed insert leaves the store byte-identical
    /// to its pre-call state.
    fn place(&mut self, hash: u64, update: bool) -> InsertReport {
        let mut report = InsertReport::default();
        if self.count == self.capacity {
            report.no_space = true;
            return report;
        }
        if hash == 0 {
            return report;
        }

        let mut index = self.candidates(hash);
        let mut empty = None;

        // One pass over all candidate slots settles both questions: is the
        // fingerprint already present, and where is the first open slot.
        for &base in &index {
            for slot in base..base + self.width {
                let n = slot as usize;
                if self.slots[n] == hash {
                    report.exist = true;
                    report.ok = update;
                    return report;
                }
                if self.slots[n] == 0 && empty.is_none() {
                    empty = Some(n);
                }
            }
        }

        if let Some(n) = empty {
            self.slots[n] = hash;
            self.count += 1;
            report.ok = true;
            return report;
        }

        let mut rng = rand::rng();
        let mut carried = hash;
        let mut journal: Vec<usize> = Vec::new();

        for _ in 0..self.shuffler {
            let mut cyclic: HashMap<(u64, u64), u8> =
                HashMap::with_capacity(self.tracker as usize);

            loop {
                let random: [u8; 8] = rng.random();
                let base = index[(u64::from_le_bytes(random) % 3) as usize];
                let n = (base + u64::from(random[7]) % self.width) as usize;

                let moves = cyclic.entry((base, carried)).or_insert(0);
                *moves += 1;
                if *moves > self.width as u8 || cyclic.len() as u64 == self.tracker {
                    break; // cycling; jump tracks with fresh picks
                }

                std::mem::swap(&mut self.slots[n], &mut carried);
                journal.push(n);
                index = self.candidates(carried);

                for &alt in &index {
                    if alt == base {
                        continue; // skip the bucket the swap came from
                    }
                    for slot in alt..alt + self.width {
                        let m = slot as usize;
                        if self.slots[m] == 0 {
                            self.slots[m] = carried;
                            self.count += 1;
                            report.ok = true;
                            return report;
                        }
                    }
                }
            }
        }

        // Out of shuffle budget: unwind the walk, swap by swap.
        while let Some(n) = journal.pop() {
            std::mem::swap(&mut self.slots[n], &mut carried);
        }
        report.no_space = true;
        report
    }

    /// Remove `hash`, keeping the occupied slots of its bucket left-dense.
    fn unplace(&mut self, hash: u64) -> RemoveReport {
        let mut report = RemoveReport {
            ok: hash != 0,
            exist: false,
        };
        if hash == 0 {
            return report;
        }
        for &base in &self.candidates(hash) {
            for slot in base..base + self.width {
                let n = slot as usize;
                if self.slots[n] == hash {
                    // Shift the bucket tail left one slot and wipe the end;
                    // the first-empty heuristic in place() relies on it.
                    let end = (base + self.width) as usize;
                    self.slots.copy_within(n + 1..end, n);
                    self.slots[end - 1] = 0;
                    self.count -= 1;
                    report.exist = true;
                    return report;
                }
            }
        }
        report
    }

    /// Write the store to `path`, replacing any existing file.
    ///
    /// The file is flushed and fsynced before returning; there is no
    /// durability under a partial write beyond the whole-file replace.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(&file);
        writer.write_all(&self.header().encode())?;
        for &slot in &self.slots {
            writer.write_all(&slot.to_be_bytes())?;
        }
        writer.flush()?;
        drop(writer);
        file.sync_all()?;
        Ok(())
    }

    /// Load a store from `path`, validating signature, length and checksum.
    ///
    /// Geometry and tuning come straight from the header; nothing is
    /// recomputed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut raw = [0u8; HEADER_LEN];
        reader.read_exact(&mut raw).map_err(|_| Error::InvalidHeader)?;
        let header = Header::decode(&raw);
        if header.signature != SIGNATURE_KEON {
            return Err(Error::Signature(header.signature));
        }
        let slots = header
            .depth
            .checked_mul(header.width)
            .filter(|&total| total > 0)
            .ok_or(Error::InvalidHeader)?;

        let mut keon = Keon {
            capacity: header.max,
            density: header.density,
            width: header.width,
            shuffler: header.shuffler,
            tracker: header.tracker,
            depth: header.depth,
            count: header.count,
            slots: vec![0u64; slots as usize],
            _hasher: PhantomData,
        };

        let mut word = [0u8; 8];
        for slot in keon.slots.iter_mut() {
            reader.read_exact(&mut word).map_err(|_| Error::Length)?;
            *slot = u64::from_be_bytes(word);
        }
        if reader.read(&mut word)? != 0 {
            return Err(Error::Length);
        }
        if keon.checksum() != header.checksum {
            return Err(Error::Checksum);
        }
        Ok(keon)
    }

    fn header(&self) -> Header {
        Header {
            signature: SIGNATURE_KEON,
            checksum: self.checksum(),
            timestamp: unix_now(),
            count: self.count,
            max: self.capacity,
            depth: self.depth,
            width: self.width,
            density: self.density,
            shuffler: self.shuffler,
            tracker: self.tracker,
        }
    }
}

/// Iterator over stored fingerprints in storage order; see [`Keon::export`].
pub struct Fingerprints<'a> {
    slots: &'a [u64],
    index: usize,
}

impl Iterator for Fingerprints<'_> {
    type Item = [u8; 8];

    fn next(&mut self) -> Option<[u8; 8]> {
        while self.index < self.slots.len() {
            let slot = self.slots[self.index];
            self.index += 1;
            if slot != 0 {
                return Some(slot.to_be_bytes());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // depth 3 x width 3, no padding: candidate buckets are hash % 3 and
    // small multiples of 3 land in bucket 0 first.
    fn nine_slot_store() -> Keon {
        Keon::builder()
            .capacity(9)
            .density(1000)
            .build()
            .unwrap()
    }

    #[test]
    fn geometry_from_capacity() {
        let keon = nine_slot_store();
        assert_eq!(keon.depth, 3);
        assert_eq!(keon.width, 3);
        assert_eq!(keon.slots.len(), 9);
        assert_eq!(keon.density, 0);
        assert_eq!(keon.shuffler, 500);
        assert_eq!(keon.tracker, 50);
    }

    #[test]
    fn remove_compacts_bucket_tail() {
        let mut keon = nine_slot_store();
        for hash in [3u64, 6, 9] {
            assert!(keon.insert_raw(hash).ok);
        }
        assert_eq!(&keon.slots[0..3], &[3, 6, 9]);

        let report = keon.remove_raw(6);
        assert!(report.ok && report.exist);
        assert_eq!(&keon.slots[0..3], &[3, 9, 0]);
        assert_eq!(keon.len(), 2);

        // Absent fingerprint: usable but not found.
        let report = keon.remove_raw(6);
        assert!(report.ok && !report.exist);
        // The empty sentinel is never usable.
        let report = keon.remove_raw(0);
        assert!(!report.ok && !report.exist);
    }

    #[test]
    fn exhausted_displacement_rolls_back() {
        let mut keon = nine_slot_store();

        // Fingerprints whose candidate buckets all sit inside {0, 1} and
        // touch both: six of them fill those buckets completely, and a
        // seventh can never be placed no matter how the walk shuffles.
        let mut confined = Vec::new();
        let mut hash = 1u64;
        while confined.len() < 7 {
            let buckets = keon.candidates(hash).map(|base| base / keon.width);
            if buckets.iter().all(|&b| b < 2)
                && buckets.contains(&0)
                && buckets.contains(&1)
            {
                confined.push(hash);
            }
            hash += 1;
        }

        for &hash in &confined[..6] {
            assert!(keon.insert_raw(hash).ok);
        }
        let slots_before = keon.slots.clone();
        let checksum_before = keon.checksum();

        let report = keon.insert_raw(confined[6]);
        assert!(report.no_space && !report.ok && !report.exist);
        // Exhaustion, not capacity: the store still has room elsewhere.
        assert!(keon.len() < keon.capacity());
        assert_eq!(keon.len(), 6);
        // The failed walk left no trace.
        assert_eq!(keon.slots, slots_before);
        assert_eq!(keon.checksum(), checksum_before);
    }

    #[test]
    fn full_store_reports_no_space_untouched() {
        let mut keon = nine_slot_store();
        let mut inserted = 0u64;
        let mut hash = 1u64;
        while inserted < 9 {
            let report = keon.insert_raw(hash);
            if report.ok {
                inserted += 1;
            } else if report.no_space {
                // Zero padding may wedge before full; that is the
                // perfect-hash trade-off, not a failure of this test.
                break;
            }
            hash += 1;
        }
        let len = keon.len();
        let checksum = keon.checksum();
        if len == keon.capacity() {
            let report = keon.insert_raw(hash + 1);
            assert!(report.no_space);
            assert_eq!(keon.len(), len);
            assert_eq!(keon.checksum(), checksum);
        }
    }

    #[test]
    fn occupied_slots_stay_in_candidate_buckets() {
        let mut keon = Keon::builder().capacity(300).density(25).build().unwrap();
        for i in 0..300u64 {
            assert!(keon.insert(&i.to_be_bytes()).ok);
        }
        for (n, &slot) in keon.slots.iter().enumerate() {
            if slot == 0 {
                continue;
            }
            let bucket = n as u64 / keon.width * keon.width;
            assert!(
                keon.candidates(slot).contains(&bucket),
                "slot {n} holds a fingerprint outside its candidate buckets"
            );
        }
    }
}
