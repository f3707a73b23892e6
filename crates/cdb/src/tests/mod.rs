mod policy_tests;
mod store_tests;

use crate::{Builder, PutMode, Store};
use std::io::Cursor;

/// Builds an in-memory database from `(key, value, mode)` puts.
pub(crate) fn build(puts: &[(&[u8], &[u8], PutMode)]) -> crate::Result<Store> {
    let mut builder = Builder::new(Cursor::new(Vec::new()))?;
    for (key, value, mode) in puts {
        builder.put(key, value, *mode)?;
    }
    let (out, _) = builder.finish()?;
    Store::from_bytes(out.into_inner())
}

/// Builds an in-memory database using `Add` for every pair.
pub(crate) fn build_added(pairs: &[(&str, &str)]) -> crate::Result<Store> {
    let puts: Vec<(&[u8], &[u8], PutMode)> = pairs
        .iter()
        .map(|(k, v)| (k.as_bytes(), v.as_bytes(), PutMode::Add))
        .collect();
    build(&puts)
}

/// Collects a full scan as owned strings (lossy) for easy comparison.
pub(crate) fn scan(store: &Store) -> crate::Result<Vec<(String, String)>> {
    store
        .iter()
        .map(|r| {
            r.map(|(k, v)| {
                (
                    String::from_utf8_lossy(k).into_owned(),
                    String::from_utf8_lossy(v).into_owned(),
                )
            })
        })
        .collect()
}

/// Collects every value for `key`.
pub(crate) fn values(store: &Store, key: &[u8]) -> crate::Result<Vec<Vec<u8>>> {
    store.find_all(key).map(|r| r.map(<[u8]>::to_vec)).collect()
}
