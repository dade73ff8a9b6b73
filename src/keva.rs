//! KE:VA, the key-to-`u64` lookup store.
//!
//! Same engine as [`Keon`](crate::Keon) with a value array running parallel
//! to the key slots: every swap, shift and overwrite that touches a key slot
//! touches the matching value slot. Behaves like a `HashMap<Vec<u8>, u64>`
//! that only remembers key fingerprints.

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
    SIGNATURE_KEVA,
};

/// Key-to-`u64` cuckoo store over 64-bit key fingerprints.
///
/// See [`Keon`](crate::Keon) for the geometry and hasher contract; the file
/// payload differs only in carrying 16-byte key/value pairs per slot.
#[derive(Debug, Builder)]
#[builder(
    pattern = "owned",
    build_fn(private, name = "base_build", validate = "Self::validate")
)]
pub struct Keva<H = XxHash64>
where
    H: Hasher + Default,
{
    /// Maximum number of entries the store accepts.
    capacity: u64,

    /// Bucket padding in thousandths; zero selects 25, 1000 selects none.
    #[builder(default = "0")]
    density: u64,

    /// Slots per bucket; zero selects 3.
    #[builder(default = "0")]
    width: u64,

    /// Outer displacement rounds per insert; zero selects 500.
    #[builder(default = "0")]
    shuffler: u64,

    /// Cyclic-movement limit per round; zero derives from the width.
    #[builder(default = "0")]
    tracker: u64,

    #[builder(setter(skip))]
    depth: u64,

    #[builder(setter(skip))]
    count: u64,

    /// Flat bucket array of `depth * width` key slots; 0 marks empty.
    #[builder(setter(skip))]
    slots: Vec<u64>,

    /// Parallel values; `values[n]` is meaningful only when `slots[n] != 0`.
    #[builder(setter(skip))]
    values: Vec<u64>,

    #[builder(setter(skip))]
    _hasher: PhantomData<H>,
}

impl<H: Hasher + Default> KevaBuilder<H> {
    fn validate(&self) -> Result<(), String> {
        if self.capacity == Some(0) {
            return Err("capacity must be greater than zero".into());
        }
        Ok(())
    }

    /// Build a [`Keva`] with the configured tuning and derived geometry.
    pub fn build(self) -> Result<Keva<H>, KevaBuilderError> {
        let mut keva = self.base_build()?;
        (keva.density, keva.width, keva.shuffler, keva.tracker) =
            resolve_options(keva.density, keva.width, keva.shuffler, keva.tracker);

        keva.depth = keva.capacity / keva.width;
        if keva.depth * keva.width < keva.capacity {
            keva.depth += 1;
        }
        keva.depth += keva.depth * keva.density / 1000;
        keva.slots = vec![0u64; (keva.depth * keva.width) as usize];
        keva.values = vec![0u64; (keva.depth * keva.width) as usize];
        Ok(keva)
    }
}

impl Keva<XxHash64> {
    /// Create a new builder with default tuning.
    pub fn builder() -> KevaBuilder<XxHash64> {
        KevaBuilder::default()
    }

    /// Create a store for `capacity` entries with default tuning.
    pub fn with_capacity(capacity: u64) -> Result<Keva<XxHash64>, KevaBuilderError> {
        Self::builder().capacity(capacity).build()
    }
}

impl<H: Hasher + Default> Keva<H> {
    /// Number of stored entries.
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

    /// Order-independent checksum: XOR fold over every key slot.
    pub fn checksum(&self) -> u64 {
        self.slots.iter().fold(0, |acc, &slot| acc ^ slot)
    }

    /// Value stored under `key`, if present.
    pub fn lookup(&self, key: &[u8]) -> Option<u64> {
        let hash = fingerprint::<H>(key);
        for &base in &self.candidates(hash) {
            for slot in base..base + self.width {
                let n = slot as usize;
                if self.slots[n] == hash {
                    return Some(self.values[n]);
                }
            }
        }
        None
    }

    /// Insert `(key, value)`; an already-present fingerprint reports `exist`
    /// and keeps its stored value.
    pub fn insert(&mut self, key: &[u8], value: u64) -> InsertReport {
        self.place(fingerprint::<H>(key), value, false)
    }

    /// Insert `(key, value)`, overwriting the stored value (and reporting
    /// both `ok` and `exist`) when the fingerprint was already present.
    pub fn update(&mut self, key: &[u8], value: u64) -> InsertReport {
        self.place(fingerprint::<H>(key), value, true)
    }

    /// Insert a pre-computed fingerprint, bypassing the hasher.
    pub fn insert_raw(&mut self, hash: u64, value: u64) -> InsertReport {
        self.place(hash, value, false)
    }

    /// [`insert_raw`](Self::insert_raw) with update semantics.
    pub fn update_raw(&mut self, hash: u64, value: u64) -> InsertReport {
        self.place(hash, value, true)
    }

    /// Remove `key` and its value if present.
    pub fn remove(&mut self, key: &[u8]) -> RemoveReport {
        self.unplace(fingerprint::<H>(key))
    }

    /// Remove a pre-computed fingerprint, bypassing the hasher.
    pub fn remove_raw(&mut self, hash: u64) -> RemoveReport {
        self.unplace(hash)
    }

    /// Iterate stored entries in storage order as big-endian
    /// `(fingerprint, value)` byte pairs. Each call starts a fresh pass.
    pub fn export(&self) -> Entries<'_> {
        Entries {
            slots: &self.slots,
            values: &self.values,
            index: 0,
        }
    }

    fn candidates(&self, hash: u64) -> [u64; 3] {
        [
            self.width * (hash % self.depth),
            self.width * ((hash ^ MIX_PRIME_1) % self.depth),
            self.width * ((hash ^ MIX_PRIME_2) % self.depth),
        ]
    }

    /// Place `(hash, value)`; see `Keon::place` for the walk. The carried
    /// value shadows the carried fingerprint through every swap, and the
    /// unwind restores both arrays.
    fn place(&mut self, hash: u64, value: u64, update: bool) -> InsertReport {
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

        for &base in &index {
            for slot in base..base + self.width {
                let n = slot as usize;
                if self.slots[n] == hash {
                    report.exist = true;
                    if update {
                        self.values[n] = value;
                        report.ok = true;
                    }
                    return report;
                }
                if self.slots[n] == 0 && empty.is_none() {
                    empty = Some(n);
                }
            }
        }

        if let Some(n) = empty {
            self.slots[n] = hash;
            self.values[n] = value;
            self.count += 1;
            report.ok = true;
            return report;
        }

        let mut rng = rand::rng();
        let mut carried = hash;
        let mut carried_value = value;
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
                    break;
                }

                std::mem::swap(&mut self.slots[n], &mut carried);
                std::mem::swap(&mut self.values[n], &mut carried_value);
                journal.push(n);
                index = self.candidates(carried);

                for &alt in &index {
                    if alt == base {
                        continue;
                    }
                    for slot in alt..alt + self.width {
                        let m = slot as usize;
                        if self.slots[m] == 0 {
                            self.slots[m] = carried;
                            self.values[m] = carried_value;
                            self.count += 1;
                            report.ok = true;
                            return report;
                        }
                    }
                }
            }
        }

        while let Some(n) = journal.pop() {
            std::mem::swap(&mut self.slots[n], &mut carried);
            std::mem::swap(&mut self.values[n], &mut carried_value);
        }
        report.no_space = true;
        report
    }

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
                    let end = (base + self.width) as usize;
                    self.slots.copy_within(n + 1..end, n);
                    self.slots[end - 1] = 0;
                    self.values.copy_within(n + 1..end, n);
                    self.values[end - 1] = 0;
                    self.count -= 1;
                    report.exist = true;
                    return report;
                }
            }
        }
        report
    }

    /// Write the store to `path`, replacing any existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(&file);
        writer.write_all(&self.header().encode())?;
        for (&slot, &value) in self.slots.iter().zip(&self.values) {
            writer.write_all(&slot.to_be_bytes())?;
            writer.write_all(&value.to_be_bytes())?;
        }
        writer.flush()?;
        drop(writer);
        file.sync_all()?;
        Ok(())
    }

    /// Load a store from `path`, validating signature, length and checksum.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut raw = [0u8; HEADER_LEN];
        reader.read_exact(&mut raw).map_err(|_| Error::InvalidHeader)?;
        let header = Header::decode(&raw);
        if header.signature != SIGNATURE_KEVA {
            return Err(Error::Signature(header.signature));
        }
        let slots = header
            .depth
            .checked_mul(header.width)
            .filter(|&total| total > 0)
            .ok_or(Error::InvalidHeader)?;

        let mut keva = Keva {
            capacity: header.max,
            density: header.density,
            width: header.width,
            shuffler: header.shuffler,
            tracker: header.tracker,
            depth: header.depth,
            count: header.count,
            slots: vec![0u64; slots as usize],
            values: vec![0u64; slots as usize],
            _hasher: PhantomData,
        };

        let mut word = [0u8; 8];
        for n in 0..slots as usize {
            reader.read_exact(&mut word).map_err(|_| Error::Length)?;
            keva.slots[n] = u64::from_be_bytes(word);
            reader.read_exact(&mut word).map_err(|_| Error::Length)?;
            keva.values[n] = u64::from_be_bytes(word);
        }
        if reader.read(&mut word)? != 0 {
            return Err(Error::Length);
        }
        if keva.checksum() != header.checksum {
            return Err(Error::Checksum);
        }
        Ok(keva)
    }

    fn header(&self) -> Header {
        Header {
            signature: SIGNATURE_KEVA,
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

/// Iterator over stored entries in storage order; see [`Keva::export`].
pub struct Entries<'a> {
    slots: &'a [u64],
    values: &'a [u64],
    index: usize,
}

impl Iterator for Entries<'_> {
    type Item = ([u8; 8], [u8; 8]);

    fn next(&mut self) -> Option<([u8; 8], [u8; 8])> {
        while self.index < self.slots.len() {
            let slot = self.slots[self.index];
            let value = self.values[self.index];
            self.index += 1;
            if slot != 0 {
                return Some((slot.to_be_bytes(), value.to_be_bytes()));
            }
        }
        None
    }
}
