//! # Config - tunables for the constant database
//!
//! Settings shared by the `cdb` engine and the `cdb` shell. The engine only
//! ever receives a [`CdbConfig`] value; reading the environment is left to
//! the binary via [`CdbConfig::from_env`].
//!
//! ## Environment
//!
//! ```text
//! CDB_LOAD_MODE        "mmap" or "read"              (default: "mmap")
//! CDB_WRITE_BUFFER_KB  maker write buffer in KiB      (default: 64)
//! CDB_SYNC_DIR         fsync parent dir after publish (default: "true")
//! ```
//!
//! Unset or unparsable values fall back to the defaults. The write buffer is
//! capped at [`MAX_WRITE_BUFFER_BYTES`].

use std::fmt;
use std::str::FromStr;

/// Default capacity of the buffered writer used while building (64 KiB).
pub const DEFAULT_WRITE_BUFFER_BYTES: usize = 64 * 1024;

/// Largest write buffer accepted from the environment (64 MiB).
pub const MAX_WRITE_BUFFER_BYTES: usize = 64 * 1024 * 1024;

/// How a store's bytes are brought into memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Read-only shared memory mapping of the file.
    #[default]
    Mmap,
    /// Read the whole file into a private buffer.
    Read,
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadMode::Mmap => f.write_str("mmap"),
            LoadMode::Read => f.write_str("read"),
        }
    }
}

/// Returned when a string names no known [`LoadMode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLoadMode(pub String);

impl fmt::Display for UnknownLoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown load mode '{}' (expected mmap or read)", self.0)
    }
}

impl std::error::Error for UnknownLoadMode {}

impl FromStr for LoadMode {
    type Err = UnknownLoadMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mmap" => Ok(LoadMode::Mmap),
            "read" => Ok(LoadMode::Read),
            _ => Err(UnknownLoadMode(s.to_string())),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdbConfig {
    /// How a store brings files opened by path into memory.
    pub load_mode: LoadMode,
    /// Capacity of the buffered writer wrapped around a maker's temp file.
    pub write_buffer_bytes: usize,
    /// If `true`, the parent directory is fsynced after the publish rename.
    pub sync_dir: bool,
}

impl Default for CdbConfig {
    fn default() -> Self {
        Self {
            load_mode: LoadMode::Mmap,
            write_buffer_bytes: DEFAULT_WRITE_BUFFER_BYTES,
            sync_dir: true,
        }
    }
}

impl CdbConfig {
    /// Builds a configuration from `CDB_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// `from_env` is this function over `std::env::var`; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let load_mode = lookup("CDB_LOAD_MODE")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.load_mode);
        let write_buffer_bytes = lookup("CDB_WRITE_BUFFER_KB")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|kb| *kb > 0)
            .map(|kb| kb.saturating_mul(1024).min(MAX_WRITE_BUFFER_BYTES))
            .unwrap_or(defaults.write_buffer_bytes);
        let sync_dir = lookup("CDB_SYNC_DIR")
            .and_then(|v| v.trim().parse::<bool>().ok())
            .unwrap_or(defaults.sync_dir);

        Self {
            load_mode,
            write_buffer_bytes,
            sync_dir,
        }
    }
}
