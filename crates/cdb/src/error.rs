//! Error taxonomy shared by the builder and the store.

use std::io;

use thiserror::Error;

/// Errors that can occur while building or reading a constant database.
#[derive(Debug, Error)]
pub enum CdbError {
    /// An underlying read, write, sync or rename failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The file violates the format: short header, length fields or slot
    /// positions pointing past the end of the data, or a probe chain that
    /// never terminates.
    #[error("corrupt store at offset {offset}: {reason}")]
    Corrupt {
        /// Byte offset at which the violation was detected.
        offset: u64,
        /// Human-readable description of the violation.
        reason: String,
    },

    /// An `Insert` put found the key already present.
    #[error("duplicate key rejected")]
    DuplicateRejected,

    /// The maker failed earlier with an I/O error and cannot be reused.
    #[error("maker is unusable after a previous failure")]
    Poisoned,

    /// The database would not fit the 32-bit position space.
    #[error("database exceeds the 4 GiB format limit")]
    TooLarge,
}

impl CdbError {
    pub(crate) fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        CdbError::Corrupt {
            offset,
            reason: reason.into(),
        }
    }

    /// Returns `true` for [`CdbError::Corrupt`].
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        matches!(self, CdbError::Corrupt { .. })
    }

    /// Returns `true` for [`CdbError::DuplicateRejected`].
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, CdbError::DuplicateRejected)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CdbError>;
