use std::fmt;
use std::fs::{self, File};
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use config::LoadMode;
use memmap2::Mmap;
use tracing::{debug, warn};

use crate::error::{CdbError, Result};
use crate::format::{read_record, Header, Slot, TableDescriptor, HEADER_BYTES, SLOT_BYTES};
use crate::hash::{hash, start_slot, table_index};

/// The bytes of an opened store.
enum Backing {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl Deref for Backing {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Backing::Mmap(m) => &m[..],
            Backing::Owned(v) => v.as_slice(),
        }
    }
}

struct Inner {
    data: Backing,
    header: Header,
    /// End of the record area: the lowest table position, clamped to the data.
    records_end: u64,
}

/// A read-only view of a finished constant database.
///
/// Only the header is parsed on open. Lookups and scans decode records
/// lazily and report [`CdbError::Corrupt`] when a length field, slot or probe
/// chain points outside the data; they never read out of bounds.
///
/// Cloning is cheap and shares the backing bytes. A store is `Send + Sync`
/// and needs no locking, since nothing in it changes after open.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backing = match self.inner.data {
            Backing::Mmap(_) => "mmap",
            Backing::Owned(_) => "owned",
        };
        f.debug_struct("Store")
            .field("backing", &backing)
            .field("len_bytes", &self.len_bytes())
            .field("records_end", &self.inner.records_end)
            .finish()
    }
}

impl Store {
    /// Opens the database at `path` using a memory map.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, LoadMode::Mmap)
    }

    /// Opens the database at `path` with an explicit [`LoadMode`].
    ///
    /// # Errors
    ///
    /// [`CdbError::Io`] if the file cannot be opened or read, and
    /// [`CdbError::Corrupt`] if it is shorter than the header.
    pub fn open_with<P: AsRef<Path>>(path: P, mode: LoadMode) -> Result<Self> {
        let path = path.as_ref();
        let backing = match mode {
            LoadMode::Mmap => {
                let file = File::open(path)?;
                let len = file.metadata()?.len();
                if len < HEADER_BYTES as u64 {
                    // Mapping a zero-length file fails on some platforms;
                    // report it the same way as any other short file.
                    return Err(short_file(len));
                }
                // SAFETY: published databases are never written in place;
                // replacement happens by rename, which leaves this mapping
                // pointing at the old inode.
                #[allow(unsafe_code)]
                let map = unsafe { Mmap::map(&file)? };
                Backing::Mmap(map)
            }
            LoadMode::Read => Backing::Owned(fs::read(path)?),
        };
        debug!(path = %path.display(), %mode, len = backing.len(), "opening cdb");
        Self::from_backing(backing)
    }

    /// Wraps an in-memory database image.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_backing(Backing::Owned(data))
    }

    fn from_backing(data: Backing) -> Result<Self> {
        let header = Header::decode(&data)?;
        let len = data.len() as u64;
        let records_end = header
            .tables()
            .iter()
            .map(|t| u64::from(t.position))
            .min()
            .unwrap_or(len)
            .clamp(HEADER_BYTES as u64, len);
        Ok(Self {
            inner: Arc::new(Inner {
                data,
                header,
                records_end,
            }),
        })
    }

    fn data(&self) -> &[u8] {
        &self.inner.data
    }

    /// Size of the backing data in bytes.
    #[must_use]
    pub fn len_bytes(&self) -> u64 {
        self.inner.data.len() as u64
    }

    /// Offset one past the last record.
    #[must_use]
    pub fn records_end(&self) -> u64 {
        self.inner.records_end
    }

    /// Header descriptor for table `index` (`0..256`).
    ///
    /// # Panics
    ///
    /// If `index >= 256`.
    #[must_use]
    pub fn table(&self, index: usize) -> TableDescriptor {
        self.inner.header.table(index)
    }

    /// Returns the first value stored under `key`, in insertion order.
    pub fn find_first(&self, key: &[u8]) -> Result<Option<&[u8]>> {
        self.find_all(key).next().transpose()
    }

    /// Returns `true` if at least one value is stored under `key`.
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.find_first(key)?.is_some())
    }

    /// Iterates every value stored under `key`, in insertion order.
    ///
    /// The iterator stops at the first empty slot of the probe chain. After
    /// yielding an error it yields nothing more.
    pub fn find_all<'a, 'k>(&'a self, key: &'k [u8]) -> FindAll<'a, 'k> {
        let h = hash(key);
        let table = self.table(table_index(h));
        let next_slot = if table.slot_count == 0 {
            0
        } else {
            start_slot(h, table.slot_count)
        };
        FindAll {
            data: self.data(),
            key,
            hash: h,
            table,
            next_slot,
            probes: 0,
            done: table.slot_count == 0,
        }
    }

    /// Scans every record in file order, including records unlinked by
    /// `Replace` and values zeroed by `Replace0`.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            data: &self.data()[..self.inner.records_end as usize],
            pos: HEADER_BYTES as u64,
            done: false,
        }
    }

    /// Walks the record area and every hash table once and summarizes them.
    ///
    /// # Errors
    ///
    /// [`CdbError::Corrupt`] if any record or slot is out of bounds.
    pub fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats {
            file_bytes: self.len_bytes(),
            record_bytes: self.inner.records_end - HEADER_BYTES as u64,
            ..StoreStats::default()
        };
        for record in self.iter() {
            record?;
            stats.records += 1;
        }

        let data = self.data();
        for table in self.inner.header.tables() {
            if table.slot_count == 0 {
                continue;
            }
            stats.tables_used += 1;
            stats.slots += u64::from(table.slot_count);
            for index in 0..table.slot_count {
                let offset = u64::from(table.position) + u64::from(index) * SLOT_BYTES as u64;
                let slot = Slot::read_at(data, offset)?;
                if slot.is_empty() {
                    continue;
                }
                stats.indexed_records += 1;
                let count = u64::from(table.slot_count);
                let home = u64::from(start_slot(slot.hash, table.slot_count));
                let distance = (u64::from(index) + count - home) % count;
                stats.max_probe = stats.max_probe.max(distance as u32 + 1);
                if distance == 0 {
                    stats.direct_hits += 1;
                }
            }
        }
        Ok(stats)
    }
}

fn short_file(len: u64) -> CdbError {
    CdbError::corrupt(
        len,
        format!(
            "file is {} bytes, shorter than the {} byte header",
            len, HEADER_BYTES
        ),
    )
}

/// Summary produced by [`Store::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Total size of the file.
    pub file_bytes: u64,
    /// Bytes between the header and the first hash table.
    pub record_bytes: u64,
    /// Records found by a sequential scan.
    pub records: u64,
    /// Records reachable through a hash table slot.
    pub indexed_records: u64,
    /// Tables with at least one slot (out of 256).
    pub tables_used: usize,
    /// Total slots across all tables.
    pub slots: u64,
    /// Indexed records sitting in their home slot.
    pub direct_hits: u64,
    /// Longest probe sequence needed to reach any indexed record.
    pub max_probe: u32,
}

/// Iterator returned by [`Store::find_all`].
pub struct FindAll<'a, 'k> {
    data: &'a [u8],
    key: &'k [u8],
    hash: u32,
    table: TableDescriptor,
    next_slot: u32,
    probes: u32,
    done: bool,
}

impl<'a> FindAll<'a, '_> {
    fn fail(&mut self, err: CdbError) -> Option<Result<&'a [u8]>> {
        warn!(error = %err, "corruption detected during lookup");
        self.done = true;
        Some(Err(err))
    }
}

impl<'a> Iterator for FindAll<'a, '_> {
    type Item = Result<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if self.probes >= self.table.slot_count {
                let offset = u64::from(self.table.position);
                return self.fail(CdbError::corrupt(
                    offset,
                    format!("probe chain of {} slots has no empty slot", self.table.slot_count),
                ));
            }

            let offset =
                u64::from(self.table.position) + u64::from(self.next_slot) * SLOT_BYTES as u64;
            let slot = match Slot::read_at(self.data, offset) {
                Ok(slot) => slot,
                Err(e) => return self.fail(e),
            };
            self.probes += 1;
            self.next_slot = (self.next_slot + 1) % self.table.slot_count;

            if slot.is_empty() {
                self.done = true;
                return None;
            }
            if slot.hash != self.hash {
                continue;
            }
            if (slot.position as usize) < HEADER_BYTES {
                return self.fail(CdbError::corrupt(
                    offset,
                    format!("slot points into the header ({})", slot.position),
                ));
            }

            match read_record(self.data, u64::from(slot.position)) {
                Ok((_, key, value)) if key == self.key => return Some(Ok(value)),
                Ok(_) => continue,
                Err(e) => return self.fail(e),
            }
        }
        None
    }
}

impl std::iter::FusedIterator for FindAll<'_, '_> {}

/// Iterator returned by [`Store::iter`].
pub struct Iter<'a> {
    /// Record area only; tables are excluded.
    data: &'a [u8],
    pos: u64,
    done: bool,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Result<(&'a [u8], &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.data.len() as u64 {
            return None;
        }
        match read_record(self.data, self.pos) {
            Ok((header, key, value)) => {
                self.pos += header.total_len();
                Some(Ok((key, value)))
            }
            Err(e) => {
                warn!(error = %e, "corruption detected during scan");
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for Iter<'_> {}
