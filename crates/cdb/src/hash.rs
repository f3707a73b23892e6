//! The placement hash.
//!
//! Builder and store both derive table and slot placement from the functions
//! here; any change to them makes every existing file unreadable.

use crate::format::TABLE_COUNT;

/// Initial hash state.
const SEED: u32 = 5381;

/// Hashes `bytes` with the classic cdb function: `h = (h * 33) ^ c`,
/// wrapping at 32 bits, starting from 5381.
#[must_use]
pub fn hash(bytes: &[u8]) -> u32 {
    bytes.iter().fold(SEED, |h, &c| {
        h.wrapping_shl(5).wrapping_add(h) ^ u32::from(c)
    })
}

/// Header table that indexes keys with hash `h`.
#[inline]
#[must_use]
pub fn table_index(h: u32) -> usize {
    (h as usize) % TABLE_COUNT
}

/// First slot probed for hash `h` in a table of `slot_count` slots.
///
/// `slot_count` must be non-zero.
#[inline]
#[must_use]
pub fn start_slot(h: u32, slot_count: u32) -> u32 {
    (h >> 8) % slot_count
}
