use super::{build, scan, values};
use crate::*;
use anyhow::Result;
use std::io::Cursor;

// -------------------- Insert --------------------

#[test]
fn insert_rejects_existing_key_and_writes_nothing() -> Result<()> {
    let mut builder = Builder::new(Cursor::new(Vec::new()))?;
    builder.put(b"k", b"first", PutMode::Insert)?;
    let before = builder.position();

    let err = builder.put(b"k", b"second", PutMode::Insert).unwrap_err();
    assert!(err.is_duplicate(), "{err:?}");
    assert_eq!(builder.position(), before);
    assert_eq!(builder.records(), 1);

    // a rejected insert does not poison the builder
    builder.put(b"other", b"v", PutMode::Insert)?;

    let (out, _) = builder.finish()?;
    let store = Store::from_bytes(out.into_inner())?;
    assert_eq!(store.iter().count(), 2);
    assert_eq!(values(&store, b"k")?, vec![b"first".to_vec()]);
    Ok(())
}

#[test]
fn insert_sees_keys_written_by_add() -> Result<()> {
    let mut builder = Builder::new(Cursor::new(Vec::new()))?;
    builder.add(b"k", b"v")?;
    assert!(builder.put(b"k", b"w", PutMode::Insert).unwrap_err().is_duplicate());
    Ok(())
}

#[test]
fn insert_distinguishes_colliding_keys() -> Result<()> {
    let store = build(&[
        (&b"bC"[..], &b"1"[..], PutMode::Insert),
        (&b"cb"[..], &b"2"[..], PutMode::Insert),
    ])?;
    assert_eq!(store.find_first(b"bC")?, Some(&b"1"[..]));
    assert_eq!(store.find_first(b"cb")?, Some(&b"2"[..]));
    Ok(())
}

#[test]
fn insert_after_replace_still_rejects() -> Result<()> {
    let mut builder = Builder::new(Cursor::new(Vec::new()))?;
    builder.add(b"k", b"old")?;
    builder.put(b"k", b"new", PutMode::Replace)?;
    assert!(builder.put(b"k", b"newer", PutMode::Insert).unwrap_err().is_duplicate());
    Ok(())
}

// -------------------- Replace --------------------

#[test]
fn replace_makes_new_value_authoritative() -> Result<()> {
    let store = build(&[
        (&b"k"[..], &b"old1"[..], PutMode::Add),
        (&b"other"[..], &b"x"[..], PutMode::Add),
        (&b"k"[..], &b"old2"[..], PutMode::Add),
        (&b"k"[..], &b"new"[..], PutMode::Replace),
    ])?;

    assert_eq!(store.find_first(b"k")?, Some(&b"new"[..]));
    assert_eq!(values(&store, b"k")?, vec![b"new".to_vec()]);
    assert_eq!(store.find_first(b"other")?, Some(&b"x"[..]));

    // Dead records remain in the record area.
    let all = scan(&store)?;
    assert_eq!(all.len(), 4);
    assert_eq!(all[0], ("k".to_string(), "old1".to_string()));
    assert_eq!(all[2], ("k".to_string(), "old2".to_string()));

    let stats = store.stats()?;
    assert_eq!(stats.records, 4);
    assert_eq!(stats.indexed_records, 2);
    Ok(())
}

#[test]
fn replace_without_previous_behaves_like_add() -> Result<()> {
    let store = build(&[(&b"k"[..], &b"v"[..], PutMode::Replace)])?;
    assert_eq!(values(&store, b"k")?, vec![b"v".to_vec()]);
    Ok(())
}

#[test]
fn replace_leaves_colliding_key_alone() -> Result<()> {
    let store = build(&[
        (&b"bC"[..], &b"keep"[..], PutMode::Add),
        (&b"cb"[..], &b"old"[..], PutMode::Add),
        (&b"cb"[..], &b"new"[..], PutMode::Replace),
    ])?;
    assert_eq!(values(&store, b"bC")?, vec![b"keep".to_vec()]);
    assert_eq!(values(&store, b"cb")?, vec![b"new".to_vec()]);
    Ok(())
}

#[test]
fn add_after_replace_accumulates_again() -> Result<()> {
    let store = build(&[
        (&b"k"[..], &b"a"[..], PutMode::Add),
        (&b"k"[..], &b"b"[..], PutMode::Replace),
        (&b"k"[..], &b"c"[..], PutMode::Add),
    ])?;
    assert_eq!(values(&store, b"k")?, vec![b"b".to_vec(), b"c".to_vec()]);
    Ok(())
}

// -------------------- Replace0 --------------------

#[test]
fn replace0_zero_fills_old_values_in_place() -> Result<()> {
    let store = build(&[
        (&b"k"[..], &b"abc"[..], PutMode::Add),
        (&b"j"[..], &b"untouched"[..], PutMode::Add),
        (&b"k"[..], &b"fresh"[..], PutMode::Replace0),
    ])?;

    // The old record keeps its length; its bytes are all zero.
    let records: Vec<(Vec<u8>, Vec<u8>)> = store
        .iter()
        .map(|r| r.map(|(k, v)| (k.to_vec(), v.to_vec())))
        .collect::<crate::Result<_>>()?;
    assert_eq!(
        records,
        vec![
            (b"k".to_vec(), vec![0u8; 3]),
            (b"j".to_vec(), b"untouched".to_vec()),
            (b"k".to_vec(), b"fresh".to_vec()),
        ]
    );

    // Old record stays reachable through lookups, zeroed.
    assert_eq!(values(&store, b"k")?, vec![vec![0u8; 3], b"fresh".to_vec()]);
    assert_eq!(store.find_first(b"k")?, Some(&[0u8, 0, 0][..]));
    Ok(())
}

#[test]
fn replace0_zeroes_every_previous_value() -> Result<()> {
    let store = build(&[
        (&b"k"[..], &b"one"[..], PutMode::Add),
        (&b"k"[..], &b"three"[..], PutMode::Add),
        (&b"k"[..], &b"last"[..], PutMode::Replace0),
    ])?;
    assert_eq!(
        values(&store, b"k")?,
        vec![vec![0u8; 3], vec![0u8; 5], b"last".to_vec()]
    );
    Ok(())
}

#[test]
fn replace0_does_not_zero_colliding_key() -> Result<()> {
    let store = build(&[
        (&b"bC"[..], &b"keep"[..], PutMode::Add),
        (&b"cb"[..], &b"old"[..], PutMode::Add),
        (&b"cb"[..], &b"new"[..], PutMode::Replace0),
    ])?;
    assert_eq!(store.find_first(b"bC")?, Some(&b"keep"[..]));
    assert_eq!(values(&store, b"cb")?, vec![vec![0u8; 3], b"new".to_vec()]);
    Ok(())
}
