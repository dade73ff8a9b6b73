use ahash::AHasher;
use kvs::{Keon, KeonBuilder};

// Distinct fixed-width keys, cheap to regenerate in any order.
fn key(i: u64) -> [u8; 8] {
    i.to_be_bytes()
}

#[test]
fn builder_validation_zero_capacity() {
    let result = Keon::builder().capacity(0).build();
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("capacity must be greater than zero"));
}

#[test]
fn empty_store_operations() {
    let store = Keon::with_capacity(100).unwrap();
    assert_eq!(store.len(), 0);
    assert!(store.is_empty());
    assert_eq!(store.capacity(), 100);
    assert_eq!(store.ratio(), 0);
    assert_eq!(store.checksum(), 0);
    assert!(!store.lookup(b"nothing"));
    assert_eq!(store.export().count(), 0);
}

#[test]
fn insert_lookup_remove_cycle() {
    let size = 10_000u64;
    let mut store = Keon::with_capacity(size).unwrap();

    for i in 0..size {
        let report = store.insert(&key(i));
        assert!(report.ok && !report.exist && !report.no_space, "insert {i}");
    }
    assert_eq!(store.len(), size);
    assert_eq!(store.ratio(), 100);

    for i in 0..size {
        assert!(store.lookup(&key(i)), "lookup {i}");
    }
    assert!(!store.lookup(&key(size + 1)));

    for i in 0..size {
        assert!(store.remove(&key(i)).exist, "remove {i}");
    }
    assert_eq!(store.len(), 0);
    assert_eq!(store.checksum(), 0);
}

#[test]
fn insert_is_idempotent() {
    let mut store = Keon::with_capacity(10).unwrap();

    let first = store.insert(b"alpha");
    assert!(first.ok && !first.exist);

    let second = store.insert(b"alpha");
    assert!(!second.ok && second.exist && !second.no_space);
    assert_eq!(store.len(), 1);
}

#[test]
fn update_acknowledges_existing() {
    let mut store = Keon::with_capacity(10).unwrap();
    assert!(store.insert(b"alpha").ok);

    let report = store.update(b"alpha");
    assert!(report.ok && report.exist);
    assert_eq!(store.len(), 1);

    let report = store.update(b"beta");
    assert!(report.ok && !report.exist);
    assert_eq!(store.len(), 2);
}

#[test]
fn checksum_is_order_independent() {
    let mut forward = Keon::with_capacity(200).unwrap();
    let mut backward = Keon::with_capacity(200).unwrap();
    for i in 0..200u64 {
        assert!(forward.insert(&key(i)).ok);
        assert!(backward.insert(&key(199 - i)).ok);
    }
    assert_eq!(forward.checksum(), backward.checksum());
    assert_eq!(forward.len(), backward.len());
}

#[test]
fn export_covers_every_fingerprint() {
    let mut store = Keon::with_capacity(50).unwrap();
    for i in 0..50u64 {
        assert!(store.insert(&key(i)).ok);
    }

    let exported: Vec<[u8; 8]> = store.export().collect();
    assert_eq!(exported.len() as u64, store.len());

    let mut fold = 0u64;
    for bytes in &exported {
        let fingerprint = u64::from_be_bytes(*bytes);
        assert_ne!(fingerprint, 0);
        fold ^= fingerprint;
    }
    assert_eq!(fold, store.checksum());

    // Restartable: a second pass sees the same thing.
    let again: Vec<[u8; 8]> = store.export().collect();
    assert_eq!(exported, again);
}

#[test]
fn at_capacity_reports_no_space() {
    let mut store = Keon::with_capacity(10).unwrap();
    for i in 0..10u64 {
        assert!(store.insert(&key(i)).ok);
    }
    let report = store.insert(&key(10));
    assert!(report.no_space && !report.ok && !report.exist);
    assert_eq!(store.len(), 10);

    // Freeing one slot makes the same insert succeed.
    assert!(store.remove(&key(0)).exist);
    assert!(store.insert(&key(10)).ok);
}

#[test]
fn dense_build_completes_at_scale() {
    let size = 100_000u64;
    let mut store = Keon::builder()
        .capacity(size)
        .density(25)
        .width(3)
        .build()
        .unwrap();
    for i in 0..size {
        assert!(store.insert(&key(i)).ok, "insert {i}");
    }
    assert_eq!(store.len(), size);
    for i in 0..size {
        assert!(store.lookup(&key(i)), "lookup {i}");
    }
}

#[test]
fn wide_buckets_build_at_scale() {
    let size = 10_000u64;
    let mut store = Keon::builder()
        .capacity(size)
        .density(25)
        .width(5)
        .build()
        .unwrap();
    for i in 0..size {
        assert!(store.insert(&key(i)).ok, "insert {i}");
    }
    assert_eq!(store.len(), size);
}

#[test]
fn alternate_hasher_substitutes() {
    let mut store = KeonBuilder::<AHasher>::default()
        .capacity(1_000)
        .build()
        .unwrap();
    for i in 0..1_000u64 {
        assert!(store.insert(&key(i)).ok);
    }
    for i in 0..1_000u64 {
        assert!(store.lookup(&key(i)));
    }
    assert!(!store.lookup(&key(1_000)));
}
