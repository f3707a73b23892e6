use std::collections::HashMap;
use std::fmt;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::{CdbError, Result};
use crate::format::{
    Header, RecordHeader, Slot, TableDescriptor, HEADER_BYTES, MAX_FILE_BYTES,
    RECORD_HEADER_BYTES, SLOT_BYTES, TABLE_COUNT,
};
use crate::hash::{hash, start_slot, table_index};

/// Default capacity of the builder's write buffer.
const DEFAULT_BUFFER_BYTES: usize = config::DEFAULT_WRITE_BUFFER_BYTES;

/// How [`Builder::put`] treats records already written with the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PutMode {
    /// Append unconditionally; a key may have many values.
    #[default]
    Add,
    /// Unlink earlier records with the key from the index, then append.
    /// Their bytes stay in the record area and still show up in a full scan.
    Replace,
    /// Overwrite the value bytes of earlier records with the key with zeros,
    /// then append. Lengths are untouched, so old records stay reachable.
    Replace0,
    /// Fail with [`CdbError::DuplicateRejected`] if the key is present.
    Insert,
}

impl fmt::Display for PutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PutMode::Add => "add",
            PutMode::Replace => "replace",
            PutMode::Replace0 => "replace0",
            PutMode::Insert => "insert",
        })
    }
}

impl FromStr for PutMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "add" => Ok(PutMode::Add),
            "replace" => Ok(PutMode::Replace),
            "replace0" => Ok(PutMode::Replace0),
            "insert" => Ok(PutMode::Insert),
            other => Err(format!(
                "unknown put mode '{}' (expected add, replace, replace0 or insert)",
                other
            )),
        }
    }
}

/// Summary returned when a build completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MakeStats {
    /// Records physically present in the record area.
    pub records: u64,
    /// Records reachable through the hash tables.
    pub live_records: u64,
    /// Final size of the file in bytes.
    pub file_bytes: u64,
}

/// In-memory index entry for one written record.
#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    hash: u32,
    position: u32,
    live: bool,
}

/// A previously written record whose key matched a put.
struct KeyMatch {
    entry: usize,
    value_offset: u64,
    value_len: u32,
}

/// Streams a constant database into `W`.
///
/// Records are appended as they arrive; the hash tables and the header are
/// produced by [`finish`](Builder::finish), which consumes the builder so it
/// cannot be used afterwards.
///
/// `W` must also be readable: `Insert`, `Replace` and `Replace0` read the keys
/// of candidate records back from the output instead of keeping every key in
/// memory. Only records whose hash matches are read.
///
/// An I/O error from [`put`](Builder::put) poisons the builder; later calls
/// return [`CdbError::Poisoned`].
pub struct Builder<W: Read + Write + Seek> {
    out: BufWriter<W>,
    /// Absolute offset of the next record.
    cursor: u64,
    entries: Vec<IndexEntry>,
    /// Live entries, by hash, in insertion order.
    by_hash: HashMap<u32, Vec<usize>>,
    poisoned: bool,
}

impl<W: Read + Write + Seek> fmt::Debug for Builder<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("cursor", &self.cursor)
            .field("records", &self.entries.len())
            .field("live_records", &self.live_records())
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

impl<W: Read + Write + Seek> Builder<W> {
    /// Starts a build into `inner`, reserving the header at offset 0.
    pub fn new(inner: W) -> Result<Self> {
        Self::with_buffer_capacity(DEFAULT_BUFFER_BYTES, inner)
    }

    /// Like [`new`](Builder::new) with an explicit write buffer capacity.
    pub fn with_buffer_capacity(capacity: usize, mut inner: W) -> Result<Self> {
        inner.seek(SeekFrom::Start(0))?;
        let mut out = BufWriter::with_capacity(capacity.max(RECORD_HEADER_BYTES), inner);
        out.write_all(&[0u8; HEADER_BYTES])?;
        debug!(buffer = capacity, "cdb build started");
        Ok(Self {
            out,
            cursor: HEADER_BYTES as u64,
            entries: Vec::new(),
            by_hash: HashMap::new(),
            poisoned: false,
        })
    }

    /// Records written so far, including ones unlinked by `Replace`.
    #[must_use]
    pub fn records(&self) -> u64 {
        self.entries.len() as u64
    }

    /// Records that will be reachable through the finished hash tables.
    #[must_use]
    pub fn live_records(&self) -> u64 {
        self.entries.iter().filter(|e| e.live).count() as u64
    }

    /// Offset at which the next record will be written.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// Shorthand for `put(key, value, PutMode::Add)`.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.put(key, value, PutMode::Add)
    }

    /// Writes one record, applying `mode` to earlier records with the same key.
    ///
    /// # Errors
    ///
    /// - [`CdbError::DuplicateRejected`] under `Insert` when the key exists;
    ///   nothing is written and the builder stays usable.
    /// - [`CdbError::TooLarge`] when the record would push the file past the
    ///   32-bit limit; nothing is written.
    /// - [`CdbError::Io`] on write failure; the builder is poisoned.
    pub fn put(&mut self, key: &[u8], value: &[u8], mode: PutMode) -> Result<()> {
        if self.poisoned {
            return Err(CdbError::Poisoned);
        }
        let result = self.put_inner(key, value, mode);
        if let Err(CdbError::Io(_)) = &result {
            self.poisoned = true;
        }
        result
    }

    fn put_inner(&mut self, key: &[u8], value: &[u8], mode: PutMode) -> Result<()> {
        let record = RecordHeader {
            key_len: u32::try_from(key.len()).map_err(|_| CdbError::TooLarge)?,
            value_len: u32::try_from(value.len()).map_err(|_| CdbError::TooLarge)?,
        };
        let end = self.cursor + record.total_len();
        if end > MAX_FILE_BYTES {
            return Err(CdbError::TooLarge);
        }

        let h = hash(key);
        match mode {
            PutMode::Add => {}
            PutMode::Insert => {
                if !self.matching(key, h)?.is_empty() {
                    trace!(key_len = key.len(), "insert rejected duplicate");
                    return Err(CdbError::DuplicateRejected);
                }
            }
            PutMode::Replace => {
                let matches = self.matching(key, h)?;
                for m in &matches {
                    self.entries[m.entry].live = false;
                }
                if !matches.is_empty() {
                    let entries = &self.entries;
                    if let Some(list) = self.by_hash.get_mut(&h) {
                        list.retain(|&i| entries[i].live);
                    }
                }
            }
            PutMode::Replace0 => {
                let matches = self.matching(key, h)?;
                self.zero_values(&matches)?;
            }
        }

        let position = self.cursor as u32;
        record.write_to(&mut self.out)?;
        self.out.write_all(key)?;
        self.out.write_all(value)?;
        self.cursor = end;

        let index = self.entries.len();
        self.entries.push(IndexEntry {
            hash: h,
            position,
            live: true,
        });
        self.by_hash.entry(h).or_default().push(index);
        trace!(position, key_len = key.len(), value_len = value.len(), %mode, "record written");
        Ok(())
    }

    /// Finds live records whose key equals `key`, reading candidates back from
    /// the output.
    fn matching(&mut self, key: &[u8], h: u32) -> Result<Vec<KeyMatch>> {
        let candidates = match self.by_hash.get(&h) {
            Some(list) if !list.is_empty() => list.clone(),
            _ => return Ok(Vec::new()),
        };

        self.out.flush()?;
        let inner = self.out.get_mut();
        let mut found = Vec::new();
        let mut prefix = [0u8; RECORD_HEADER_BYTES];
        let mut stored_key = Vec::with_capacity(key.len());

        for entry in candidates {
            let position = u64::from(self.entries[entry].position);
            inner.seek(SeekFrom::Start(position))?;
            inner.read_exact(&mut prefix)?;
            let header = RecordHeader::read_at(&prefix, 0)?;
            if header.key_len as usize != key.len() {
                continue;
            }
            stored_key.resize(key.len(), 0);
            inner.read_exact(&mut stored_key)?;
            if stored_key == key {
                found.push(KeyMatch {
                    entry,
                    value_offset: position + RECORD_HEADER_BYTES as u64 + u64::from(header.key_len),
                    value_len: header.value_len,
                });
            }
        }

        inner.seek(SeekFrom::Start(self.cursor))?;
        Ok(found)
    }

    /// Overwrites the value bytes of each match with zeros, in place.
    fn zero_values(&mut self, matches: &[KeyMatch]) -> Result<()> {
        if matches.is_empty() {
            return Ok(());
        }
        // `matching` already flushed, so the buffer is empty here.
        let inner = self.out.get_mut();
        for m in matches {
            inner.seek(SeekFrom::Start(m.value_offset))?;
            let copied = io::copy(&mut io::repeat(0).take(u64::from(m.value_len)), inner)?;
            debug_assert_eq!(copied, u64::from(m.value_len));
        }
        inner.seek(SeekFrom::Start(self.cursor))?;
        Ok(())
    }

    /// Writes the hash tables and the header, returning the inner stream.
    ///
    /// Each of the 256 tables gets twice as many slots as it has live records.
    /// Records are placed by linear probing from `(hash >> 8) % slots` in
    /// insertion order, so lookups see earlier records first.
    ///
    /// The stream is flushed but not synced; [`Maker`](crate::Maker) handles
    /// durability and publication.
    pub fn finish(mut self) -> Result<(W, MakeStats)> {
        if self.poisoned {
            return Err(CdbError::Poisoned);
        }

        let mut tables: Vec<Vec<Slot>> = vec![Vec::new(); TABLE_COUNT];
        for entry in self.entries.iter().filter(|e| e.live) {
            tables[table_index(entry.hash)].push(Slot {
                hash: entry.hash,
                position: entry.position,
            });
        }

        let live = tables.iter().map(Vec::len).sum::<usize>() as u64;
        let table_bytes = live * 2 * SLOT_BYTES as u64;
        if self.cursor + table_bytes > MAX_FILE_BYTES {
            return Err(CdbError::TooLarge);
        }

        let mut descriptors = [TableDescriptor::default(); TABLE_COUNT];
        let mut slots: Vec<Slot> = Vec::new();
        for (i, records) in tables.iter().enumerate() {
            let slot_count = (records.len() * 2) as u32;
            descriptors[i] = TableDescriptor {
                position: self.cursor as u32,
                slot_count,
            };
            if slot_count == 0 {
                continue;
            }

            slots.clear();
            slots.resize(slot_count as usize, Slot::default());
            for record in records {
                let mut at = start_slot(record.hash, slot_count) as usize;
                while !slots[at].is_empty() {
                    at = (at + 1) % slots.len();
                }
                slots[at] = *record;
            }
            for slot in &slots {
                slot.write_to(&mut self.out)?;
            }
            self.cursor += u64::from(slot_count) * SLOT_BYTES as u64;
        }

        let mut inner = self.out.into_inner().map_err(|e| e.into_error())?;
        inner.seek(SeekFrom::Start(0))?;
        inner.write_all(&Header::new(descriptors).encode())?;
        inner.flush()?;

        let stats = MakeStats {
            records: self.entries.len() as u64,
            live_records: live,
            file_bytes: self.cursor,
        };
        debug!(?stats, "cdb build finished");
        Ok((inner, stats))
    }
}
