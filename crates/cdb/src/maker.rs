use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use config::CdbConfig;
use tracing::{debug, info};

use crate::builder::{Builder, MakeStats, PutMode};
use crate::error::Result;

/// Builds a constant database in a temporary file and publishes it by rename.
///
/// # Crash Safety
///
/// Nothing touches `dest` until [`finish`](Maker::finish): the database is
/// written to `tmp`, flushed, fsynced, closed, and then atomically renamed
/// over `dest`. Readers that already opened `dest` keep seeing the old file.
///
/// # Exclusivity
///
/// `tmp` is created with exclusive-create semantics, so a second maker using
/// the same temporary path fails in [`start`](Maker::start) while the first
/// is still running (or after it was abandoned).
///
/// # Abandonment
///
/// Dropping a maker without finishing leaves `tmp` on disk with whatever was
/// flushed. Removing it is the caller's job.
#[derive(Debug)]
pub struct Maker {
    builder: Builder<File>,
    dest: PathBuf,
    tmp: PathBuf,
    sync_dir: bool,
}

impl Maker {
    /// Starts a maker with the default configuration.
    pub fn start<P1: AsRef<Path>, P2: AsRef<Path>>(dest: P1, tmp: P2) -> Result<Self> {
        Self::start_with(dest, tmp, &CdbConfig::default())
    }

    /// Starts a maker that will publish `tmp` as `dest`.
    ///
    /// # Errors
    ///
    /// [`CdbError::Io`](crate::CdbError::Io) if `tmp` already exists or cannot
    /// be created, or the header reservation cannot be written.
    pub fn start_with<P1: AsRef<Path>, P2: AsRef<Path>>(
        dest: P1,
        tmp: P2,
        config: &CdbConfig,
    ) -> Result<Self> {
        let dest = dest.as_ref().to_path_buf();
        let tmp = tmp.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&tmp)?;
        let builder = Builder::with_buffer_capacity(config.write_buffer_bytes, file)?;

        debug!(dest = %dest.display(), tmp = %tmp.display(), "maker started");
        Ok(Self {
            builder,
            dest,
            tmp,
            sync_dir: config.sync_dir,
        })
    }

    /// Path the finished database will be published to.
    #[must_use]
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Path of the temporary file being written.
    #[must_use]
    pub fn tmp(&self) -> &Path {
        &self.tmp
    }

    /// Records written so far, including ones unlinked by `Replace`.
    #[must_use]
    pub fn records(&self) -> u64 {
        self.builder.records()
    }

    /// See [`Builder::put`].
    pub fn put(&mut self, key: &[u8], value: &[u8], mode: PutMode) -> Result<()> {
        self.builder.put(key, value, mode)
    }

    /// Shorthand for `put(key, value, PutMode::Add)`.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.builder.add(key, value)
    }

    /// Finishes the database and atomically publishes it at `dest`.
    ///
    /// Steps: write tables and header, flush, `sync_all`, close, rename
    /// `tmp` to `dest`, then (if configured) fsync the parent directory so
    /// the rename itself survives a crash.
    ///
    /// # Errors
    ///
    /// Any I/O failure is returned. If the failure happens before the rename,
    /// `dest` is untouched and `tmp` is left behind.
    pub fn finish(self) -> Result<MakeStats> {
        let (file, stats) = self.builder.finish()?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.tmp, &self.dest)?;

        if self.sync_dir {
            if let Some(parent) = self.dest.parent() {
                let parent = if parent.as_os_str().is_empty() {
                    Path::new(".")
                } else {
                    parent
                };
                // Directory handles cannot be fsynced on every platform.
                if let Ok(dir) = File::open(parent) {
                    let _ = dir.sync_all();
                }
            }
        }

        info!(
            dest = %self.dest.display(),
            records = stats.records,
            live = stats.live_records,
            bytes = stats.file_bytes,
            "cdb published"
        );
        Ok(stats)
    }

    /// Stops building and returns the path of the abandoned temporary file.
    ///
    /// Equivalent to dropping the maker; the file is not removed.
    pub fn abandon(self) -> PathBuf {
        debug!(tmp = %self.tmp.display(), "maker abandoned");
        self.tmp
    }
}
