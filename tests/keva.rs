use kvs::Keva;

fn key(i: u64) -> [u8; 8] {
    i.to_be_bytes()
}

#[test]
fn builder_validation_zero_capacity() {
    let result = Keva::builder().capacity(0).build();
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("capacity must be greater than zero"));
}

#[test]
fn insert_does_not_overwrite() {
    let mut store = Keva::with_capacity(10).unwrap();

    let report = store.insert(b"alpha", 1);
    assert!(report.ok && !report.exist);
    assert_eq!(store.lookup(b"alpha"), Some(1));

    let report = store.insert(b"alpha", 2);
    assert!(!report.ok && report.exist);
    assert_eq!(store.lookup(b"alpha"), Some(1));
    assert_eq!(store.len(), 1);
}

#[test]
fn update_overwrites_value() {
    let mut store = Keva::with_capacity(10).unwrap();
    assert!(store.insert(b"alpha", 1).ok);

    let report = store.update(b"alpha", 2);
    assert!(report.ok && report.exist);
    assert_eq!(store.lookup(b"alpha"), Some(2));
    assert_eq!(store.len(), 1);
}

#[test]
fn remove_clears_key_and_value() {
    let mut store = Keva::with_capacity(10).unwrap();
    for i in 0..5u64 {
        assert!(store.insert(&key(i), i * 10).ok);
    }
    assert!(store.remove(&key(2)).exist);
    assert_eq!(store.lookup(&key(2)), None);
    assert_eq!(store.len(), 4);

    // Neighbors keep their own values after the bucket compaction.
    for i in [0u64, 1, 3, 4] {
        assert_eq!(store.lookup(&key(i)), Some(i * 10), "value {i}");
    }
}

#[test]
fn million_entry_values_round_home() {
    let size = 1_000_000u64;
    let mut store = Keva::with_capacity(size).unwrap();
    for i in 0..size {
        let report = store.insert(&key(i), i);
        assert!(report.ok && !report.exist && !report.no_space, "insert {i}");
    }
    assert_eq!(store.len(), size);
    for i in 0..size {
        assert_eq!(store.lookup(&key(i)), Some(i), "lookup {i}");
    }
    assert_eq!(store.lookup(&key(size)), None);
}

#[test]
fn export_is_restartable() {
    let mut store = Keva::with_capacity(100).unwrap();
    for i in 0..100u64 {
        assert!(store.insert(&key(i), i + 1).ok);
    }

    let pairs: Vec<_> = store.export().collect();
    assert_eq!(pairs.len() as u64, store.len());

    let mut fold = 0u64;
    for (fingerprint, value) in &pairs {
        assert_ne!(u64::from_be_bytes(*fingerprint), 0);
        assert_ne!(u64::from_be_bytes(*value), 0);
        fold ^= u64::from_be_bytes(*fingerprint);
    }
    assert_eq!(fold, store.checksum());
    assert_eq!(store.export().count(), pairs.len());
}

#[test]
fn at_capacity_reports_no_space() {
    let mut store = Keva::with_capacity(10).unwrap();
    for i in 0..10u64 {
        assert!(store.insert(&key(i), i).ok);
    }
    let report = store.insert(&key(10), 10);
    assert!(report.no_space && !report.ok);
    assert_eq!(store.len(), 10);

    // The count == max gate fires before any probing, so even an update
    // of an existing key is refused at capacity.
    let report = store.update(&key(0), 99);
    assert!(report.no_space && !report.ok);
    assert_eq!(store.lookup(&key(0)), Some(0));
}
