//! On-disk layout constants and bounds-checked codec helpers.
//!
//! ## Header (2048 bytes)
//!
//! ```text
//! [position: u32 LE][slot_count: u32 LE] x 256
//! ```
//!
//! ## Record
//!
//! ```text
//! [key_len: u32 LE][value_len: u32 LE][key][value]
//! ```
//!
//! ## Slot
//!
//! ```text
//! [hash: u32 LE][record_position: u32 LE]     position 0 = empty
//! ```
//!
//! Every decoder here takes the whole backing slice and an absolute offset,
//! and reports [`CdbError::Corrupt`] instead of slicing out of bounds.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::io::{self, Write};

use crate::error::{CdbError, Result};

/// Number of hash tables indexed by the header.
pub const TABLE_COUNT: usize = 256;

/// Size of one header descriptor or one slot: two `u32`s.
pub const SLOT_BYTES: usize = 8;

/// Size of the fixed header: 256 descriptors.
pub const HEADER_BYTES: usize = TABLE_COUNT * SLOT_BYTES;

/// Size of the `[key_len][value_len]` prefix of every record.
pub const RECORD_HEADER_BYTES: usize = 8;

/// Largest file size addressable by 32-bit positions.
pub const MAX_FILE_BYTES: u64 = u32::MAX as u64;

/// One header entry: where a table starts and how many slots it has.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Absolute offset of the first slot.
    pub position: u32,
    /// Number of slots; zero for a table with no keys.
    pub slot_count: u32,
}

impl TableDescriptor {
    /// Byte length of the table's slots.
    #[must_use]
    pub fn byte_len(&self) -> u64 {
        u64::from(self.slot_count) * SLOT_BYTES as u64
    }
}

/// The parsed 256-entry header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    tables: [TableDescriptor; TABLE_COUNT],
}

impl Header {
    /// Builds a header from per-table descriptors, in table order.
    #[must_use]
    pub fn new(tables: [TableDescriptor; TABLE_COUNT]) -> Self {
        Self { tables }
    }

    /// Descriptor of table `index`.
    ///
    /// # Panics
    ///
    /// If `index >= 256`.
    #[must_use]
    pub fn table(&self, index: usize) -> TableDescriptor {
        self.tables[index]
    }

    /// All descriptors in table order.
    #[must_use]
    pub fn tables(&self) -> &[TableDescriptor; TABLE_COUNT] {
        &self.tables
    }

    /// Parses the header from the start of `data`.
    ///
    /// # Errors
    ///
    /// [`CdbError::Corrupt`] if `data` is shorter than [`HEADER_BYTES`].
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_BYTES {
            return Err(CdbError::corrupt(
                data.len() as u64,
                format!(
                    "file is {} bytes, shorter than the {} byte header",
                    data.len(),
                    HEADER_BYTES
                ),
            ));
        }
        let mut tables = [TableDescriptor::default(); TABLE_COUNT];
        for (i, chunk) in data[..HEADER_BYTES].chunks_exact(SLOT_BYTES).enumerate() {
            tables[i] = TableDescriptor {
                position: LittleEndian::read_u32(&chunk[0..4]),
                slot_count: LittleEndian::read_u32(&chunk[4..8]),
            };
        }
        Ok(Self { tables })
    }

    /// Serializes the header to its fixed 2048-byte form.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_BYTES] {
        let mut buf = [0u8; HEADER_BYTES];
        for (table, chunk) in self.tables.iter().zip(buf.chunks_exact_mut(SLOT_BYTES)) {
            LittleEndian::write_u32(&mut chunk[0..4], table.position);
            LittleEndian::write_u32(&mut chunk[4..8], table.slot_count);
        }
        buf
    }
}

/// A hash-table slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slot {
    pub hash: u32,
    pub position: u32,
}

impl Slot {
    /// Empty slots carry position 0, which the header always occupies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.position == 0
    }

    /// Decodes the slot stored at absolute `offset`.
    pub fn read_at(data: &[u8], offset: u64) -> Result<Self> {
        let bytes = slice_at(data, offset, SLOT_BYTES as u64, "hash slot")?;
        Ok(Self {
            hash: LittleEndian::read_u32(&bytes[0..4]),
            position: LittleEndian::read_u32(&bytes[4..8]),
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.hash)?;
        w.write_u32::<LittleEndian>(self.position)
    }
}

/// The length prefix of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub key_len: u32,
    pub value_len: u32,
}

impl RecordHeader {
    /// Full on-disk size of the record, prefix included.
    ///
    /// Computed in `u64` so that hostile length fields cannot wrap.
    #[must_use]
    pub fn total_len(&self) -> u64 {
        RECORD_HEADER_BYTES as u64 + u64::from(self.key_len) + u64::from(self.value_len)
    }

    /// Decodes the prefix of the record at absolute `offset`.
    pub fn read_at(data: &[u8], offset: u64) -> Result<Self> {
        let bytes = slice_at(data, offset, RECORD_HEADER_BYTES as u64, "record header")?;
        Ok(Self {
            key_len: LittleEndian::read_u32(&bytes[0..4]),
            value_len: LittleEndian::read_u32(&bytes[4..8]),
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.key_len)?;
        w.write_u32::<LittleEndian>(self.value_len)
    }
}

/// Decodes the record at absolute `offset` into `(key, value)` slices.
///
/// Also returns the record header so callers can advance past it.
pub fn read_record(data: &[u8], offset: u64) -> Result<(RecordHeader, &[u8], &[u8])> {
    let header = RecordHeader::read_at(data, offset)?;
    let key_start = offset + RECORD_HEADER_BYTES as u64;
    let key = slice_at(data, key_start, u64::from(header.key_len), "record key")?;
    let value_start = key_start + u64::from(header.key_len);
    let value = slice_at(data, value_start, u64::from(header.value_len), "record value")?;
    Ok((header, key, value))
}

/// Returns `data[offset..offset + len]`, or `Corrupt` if that overruns `data`.
pub(crate) fn slice_at<'a>(data: &'a [u8], offset: u64, len: u64, what: &str) -> Result<&'a [u8]> {
    let end = offset.checked_add(len);
    match end {
        Some(end) if end <= data.len() as u64 => Ok(&data[offset as usize..end as usize]),
        _ => Err(CdbError::corrupt(
            offset,
            format!(
                "{} of {} bytes runs past end of data ({} bytes)",
                what,
                len,
                data.len()
            ),
        )),
    }
}
