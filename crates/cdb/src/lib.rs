//! # cdb - constant database engine
//!
//! An immutable, disk-resident hash table mapping byte-string keys to one or
//! more byte-string values. A database is built once, in a single streaming
//! pass, and never modified afterwards: updating means building a new file
//! and atomically renaming it over the old one.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ HEADER (2048 bytes)                                           │
//! │                                                               │
//! │ position (u32) | slot_count (u32)          x 256 tables       │
//! ├───────────────────────────────────────────────────────────────┤
//! │ RECORDS (append order)                                        │
//! │                                                               │
//! │ key_len (u32) | value_len (u32) | key | value                 │
//! │                                                               │
//! │ ... repeated for each put ...                                 │
//! ├───────────────────────────────────────────────────────────────┤
//! │ HASH TABLES (table 0 .. table 255)                            │
//! │                                                               │
//! │ hash (u32) | record_position (u32)         x slot_count       │
//! │                                                               │
//! │ record_position 0 marks an empty slot.                        │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. A key with hash `h` lives in table
//! `h % 256`; its probe sequence starts at slot `(h >> 8) % slot_count` and
//! walks forward, wrapping, until an empty slot.
//!
//! ## Example
//!
//! ```rust,no_run
//! use cdb::{Maker, PutMode, Store};
//!
//! let mut maker = Maker::start("fruit.cdb", "fruit.cdb.tmp").unwrap();
//! maker.add(b"apple", b"red").unwrap();
//! maker.add(b"apple", b"green").unwrap();
//! maker.put(b"kiwi", b"brown", PutMode::Insert).unwrap();
//! maker.finish().unwrap();
//!
//! let store = Store::open("fruit.cdb").unwrap();
//! assert_eq!(store.find_first(b"apple").unwrap(), Some(&b"red"[..]));
//! let all: Vec<_> = store.find_all(b"apple").collect::<Result<_, _>>().unwrap();
//! assert_eq!(all, vec![&b"red"[..], &b"green"[..]]);
//! ```
//!
//! ## Duplicate handling
//!
//! | Mode       | Effect on earlier records with the same key                |
//! |------------|------------------------------------------------------------|
//! | `Add`      | none; all values are kept                                  |
//! | `Insert`   | put is rejected with `DuplicateRejected`                   |
//! | `Replace`  | unlinked from the index; bytes remain, visible to `iter`   |
//! | `Replace0` | value bytes zeroed in place; still visible to lookups      |

mod builder;
mod error;
pub mod format;
pub mod hash;
mod maker;
mod store;

pub use builder::{Builder, MakeStats, PutMode};
pub use config::{CdbConfig, LoadMode};
pub use error::{CdbError, Result};
pub use maker::Maker;
pub use store::{FindAll, Iter, Store, StoreStats};

#[cfg(test)]
mod tests;
