use super::{build, build_added, scan, values};
use crate::format::{HEADER_BYTES, TABLE_COUNT};
use crate::hash::{hash, table_index};
use crate::*;
use anyhow::Result;
use std::sync::Arc;

// -------------------- Point and multi-value lookups --------------------

#[test]
fn multi_value_scenario() -> Result<()> {
    let store = build_added(&[("a", "1"), ("b", "2"), ("a", "3")])?;

    assert_eq!(store.find_first(b"a")?, Some(&b"1"[..]));
    assert_eq!(values(&store, b"a")?, vec![b"1".to_vec(), b"3".to_vec()]);
    assert_eq!(store.find_first(b"b")?, Some(&b"2"[..]));
    assert_eq!(store.find_first(b"c")?, None);
    assert!(values(&store, b"c")?.is_empty());

    assert_eq!(
        scan(&store)?,
        vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "3".to_string()),
        ]
    );
    Ok(())
}

#[test]
fn find_all_returns_every_value_in_insertion_order() -> Result<()> {
    let mut pairs = Vec::new();
    let expected: Vec<String> = (0..50).map(|i| format!("v{i}")).collect();
    for (i, v) in expected.iter().enumerate() {
        pairs.push(("multi", v.as_str()));
        // interleave unrelated keys so records are not contiguous
        if i % 3 == 0 {
            pairs.push(("other", "x"));
        }
    }
    let store = build_added(&pairs)?;

    let found: Vec<String> = values(&store, b"multi")?
        .into_iter()
        .map(|v| String::from_utf8(v).unwrap())
        .collect();
    assert_eq!(found, expected);
    assert_eq!(store.find_first(b"multi")?, Some(&b"v0"[..]));
    assert_eq!(values(&store, b"other")?.len(), 17);
    Ok(())
}

#[test]
fn empty_key_and_empty_value() -> Result<()> {
    let store = build_added(&[("", "empty key"), ("k", "")])?;
    assert_eq!(store.find_first(b"")?, Some(&b"empty key"[..]));
    assert_eq!(store.find_first(b"k")?, Some(&b""[..]));
    assert!(store.contains(b"k")?);
    assert!(!store.contains(b"nope")?);
    Ok(())
}

#[test]
fn large_value_roundtrip() -> Result<()> {
    let big = vec![b'x'; 500_000];
    let store = build(&[(&b"big"[..], big.as_slice(), PutMode::Add)])?;
    assert_eq!(store.find_first(b"big")?.map(<[u8]>::len), Some(500_000));
    Ok(())
}

#[test]
fn colliding_hashes_are_resolved_by_key_bytes() -> Result<()> {
    // "bC" and "cb" share the full 32-bit hash.
    assert_eq!(hash(b"bC"), hash(b"cb"));

    let store = build_added(&[("bC", "first"), ("cb", "second"), ("bC", "third")])?;
    assert_eq!(values(&store, b"bC")?, vec![b"first".to_vec(), b"third".to_vec()]);
    assert_eq!(values(&store, b"cb")?, vec![b"second".to_vec()]);
    assert_eq!(store.find_first(b"cb")?, Some(&b"second"[..]));
    Ok(())
}

#[test]
fn many_keys_all_found() -> Result<()> {
    let keys: Vec<String> = (0..5_000).map(|i| format!("key{i:05}")).collect();
    let vals: Vec<String> = (0..5_000).map(|i| format!("val{i}")).collect();
    let pairs: Vec<(&str, &str)> = keys
        .iter()
        .zip(&vals)
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let store = build_added(&pairs)?;

    for (k, v) in &pairs {
        assert_eq!(store.find_first(k.as_bytes())?, Some(v.as_bytes()), "{k}");
    }
    for i in 0..500 {
        assert_eq!(store.find_first(format!("missing{i}").as_bytes())?, None);
    }
    Ok(())
}

#[test]
#[should_panic]
fn table_index_past_header_panics() {
    let store = build(&[]).unwrap();
    let _ = store.table(TABLE_COUNT);
}

// -------------------- Sequential scan --------------------

#[test]
fn empty_database() -> Result<()> {
    let store = build(&[])?;
    assert_eq!(store.len_bytes(), HEADER_BYTES as u64);
    assert_eq!(store.records_end(), HEADER_BYTES as u64);
    assert_eq!(store.iter().count(), 0);
    assert_eq!(store.find_first(b"anything")?, None);
    for i in 0..TABLE_COUNT {
        let table = store.table(i);
        assert_eq!(table.slot_count, 0);
        assert_eq!(table.position, HEADER_BYTES as u32);
    }
    Ok(())
}

#[test]
fn scan_matches_lookups_for_distinct_keys() -> Result<()> {
    let pairs: Vec<(String, String)> = (0..300)
        .map(|i| (format!("k{i}"), format!("v{}", i * 7)))
        .collect();
    let borrowed: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    let store = build_added(&borrowed)?;

    let scanned = scan(&store)?;
    assert_eq!(scanned, pairs);
    for (k, v) in &scanned {
        assert_eq!(store.find_first(k.as_bytes())?, Some(v.as_bytes()));
    }
    Ok(())
}

#[test]
fn iteration_is_repeatable() -> Result<()> {
    let store = build_added(&[("x", "10"), ("y", "20"), ("z", "30")])?;
    let first = scan(&store)?;
    let second = scan(&store)?;
    assert_eq!(first, second);
    assert_eq!(store.iter().skip(1).take(1).count(), 1);
    Ok(())
}

// -------------------- Stats --------------------

#[test]
fn stats_describe_layout() -> Result<()> {
    let store = build_added(&[("a", "1"), ("b", "2"), ("a", "3")])?;
    let stats = store.stats()?;

    assert_eq!(stats.records, 3);
    assert_eq!(stats.indexed_records, 3);
    assert_eq!(stats.file_bytes, store.len_bytes());
    assert_eq!(stats.record_bytes, 3 * (8 + 2));
    // "a" and "b" hash to different tables
    assert_ne!(table_index(hash(b"a")), table_index(hash(b"b")));
    assert_eq!(stats.tables_used, 2);
    assert_eq!(stats.slots, 6);
    assert!(stats.max_probe >= 1);
    assert!(stats.direct_hits >= 2);
    Ok(())
}

// -------------------- Sharing --------------------

#[test]
fn clones_share_data_across_threads() -> Result<()> {
    let pairs: Vec<(String, String)> = (0..1_000).map(|i| (format!("k{i}"), format!("v{i}"))).collect();
    let borrowed: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    let store = build_added(&borrowed)?;
    let pairs = Arc::new(pairs);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = store.clone();
            let pairs = Arc::clone(&pairs);
            std::thread::spawn(move || {
                for (k, v) in pairs.iter().skip(t).step_by(4) {
                    assert_eq!(store.find_first(k.as_bytes()).unwrap(), Some(v.as_bytes()));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    Ok(())
}
