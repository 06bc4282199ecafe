//! Session Module
//!
//! Binds the data, index and metadata stores of one database directory and
//! guards all three with a single read/write lock.
//!
//! ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
//!
//! - **Reads** take the shared side of the lock; any number run together.
//! - **Writes** take the exclusive side; one writer excludes every reader and
//!   every other writer for the whole multi-file mutation.
//! - Acquisition blocks indefinitely unless `Config::lock_timeout` is set.
//!
//! There is no crash recovery: a writer interrupted between the data, index
//! and metadata updates leaves the three files mutually inconsistent.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::{Config, SyncStrategy};
use crate::error::{FlatDbError, Result};
use crate::storage::{DataFile, MetadataStore, PrimaryIndex, DATA_FILE, INDEX_FILE, META_FILE};

/// Shared access to the open stores; dropping it ends the read
pub type ReadGuard<'a> = MappedRwLockReadGuard<'a, Stores>;

/// Exclusive access to the open stores; dropping it ends the write
pub type WriteGuard<'a> = MappedRwLockWriteGuard<'a, Stores>;

/// The three open stores of a database
pub struct Stores {
    pub data: DataFile,
    pub index: PrimaryIndex,
    pub meta: MetadataStore,
}

impl Stores {
    /// Open all three stores of `dir`
    ///
    /// If a later store fails, the earlier ones are dropped on the `?` and
    /// their files closed before the error reaches the caller.
    pub fn open(dir: &Path, create_if_missing: bool, config: &Config) -> Result<Self> {
        if create_if_missing {
            fs::create_dir_all(dir).map_err(|source| FlatDbError::FileAccess {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let block_size = config.cache_block_size;

        let data = DataFile::open(&dir.join(DATA_FILE), create_if_missing, block_size)?;
        let index = PrimaryIndex::open(
            &dir.join(INDEX_FILE),
            create_if_missing,
            block_size,
            config.index_initial_capacity,
            config.index_load_factor,
        )?;
        let meta = MetadataStore::open(&dir.join(META_FILE), create_if_missing, block_size)?;

        Ok(Self { data, index, meta })
    }

    /// fsync every store
    pub fn sync(&self) -> Result<()> {
        self.data.flush()?;
        self.index.flush()?;
        self.meta.flush()
    }

    /// Flush and close every store, reporting the first failure
    pub fn close(self) -> Result<()> {
        let results = [self.data.close(), self.index.close(), self.meta.close()];
        results.into_iter().collect()
    }
}

/// One open (or openable) database directory
pub struct Session {
    path: PathBuf,
    config: Config,
    stores: RwLock<Option<Stores>>,
}

impl Session {
    /// Create a closed session for `path`
    pub fn new(path: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            path: path.into(),
            config,
            stores: RwLock::new(None),
        }
    }

    /// Open all three stores; a no-op if already open
    pub fn open(&self, create_if_missing: bool) -> Result<()> {
        let mut stores = self.lock_exclusive()?;
        if stores.is_some() {
            return Ok(());
        }

        *stores = Some(Stores::open(&self.path, create_if_missing, &self.config)?);
        tracing::debug!("Session opened at {}", self.path.display());
        Ok(())
    }

    /// Close all three stores; closing a closed session is a no-op
    pub fn close(&self) -> Result<()> {
        let stores = self.lock_exclusive()?.take();
        if let Some(stores) = stores {
            stores.close()?;
            tracing::debug!("Session closed at {}", self.path.display());
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.stores.read().is_some()
    }

    /// Begin a shared (read) section
    pub fn begin_read(&self) -> Result<ReadGuard<'_>> {
        let guard = match self.config.lock_timeout {
            Some(timeout) => self
                .stores
                .try_read_for(timeout)
                .ok_or(FlatDbError::LockTimeout { mode: "read", timeout })?,
            None => self.stores.read(),
        };
        RwLockReadGuard::try_map(guard, Option::as_ref).map_err(|_| FlatDbError::NotOpen)
    }

    /// Begin an exclusive (write) section
    pub fn begin_write(&self) -> Result<WriteGuard<'_>> {
        let guard = self.lock_exclusive()?;
        RwLockWriteGuard::try_map(guard, Option::as_mut).map_err(|_| FlatDbError::NotOpen)
    }

    /// fsync the stores if the sync strategy asks for it after each write
    pub fn sync_after_write(&self, stores: &Stores) -> Result<()> {
        match self.config.sync_strategy {
            SyncStrategy::EveryWrite => stores.sync(),
            SyncStrategy::OnClose => Ok(()),
        }
    }

    /// Database directory of this session
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_exclusive(&self) -> Result<RwLockWriteGuard<'_, Option<Stores>>> {
        match self.config.lock_timeout {
            Some(timeout) => self
                .stores
                .try_write_for(timeout)
                .ok_or(FlatDbError::LockTimeout { mode: "write", timeout }),
            None => Ok(self.stores.write()),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(stores) = self.stores.get_mut().take() {
            if let Err(e) = stores.close() {
                tracing::warn!("Error closing session at {}: {}", self.path.display(), e);
            }
        }
    }
}
