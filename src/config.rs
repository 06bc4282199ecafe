//! Configuration for flatdb
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{FlatDbError, Result};

/// Main configuration for a flatdb instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Database directory holding the three database files
    /// Internal structure:
    ///   {db_dir}/
    ///     ├── meta.db   (22-byte header)
    ///     ├── data.db   (256-byte record slots)
    ///     └── index.db  (open-addressing hash table)
    pub db_dir: PathBuf,

    /// Create missing files on open instead of failing
    pub create_if_missing: bool,

    /// Size of the single read-through block cache in each byte store
    pub cache_block_size: usize,

    /// When to fsync the database files
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Index Configuration
    // -------------------------------------------------------------------------
    /// Slot count of a freshly created index
    pub index_initial_capacity: u32,

    /// Live/capacity ratio that triggers a rehash
    pub index_load_factor: f32,

    // -------------------------------------------------------------------------
    // Concurrency Configuration
    // -------------------------------------------------------------------------
    /// Maximum wait for the session lock; `None` blocks indefinitely
    pub lock_timeout: Option<Duration>,
}

/// Sync strategy: how often to fsync the database files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync only when the database is closed
    OnClose,

    /// fsync every touched file at the end of each mutation (safest, slowest)
    EveryWrite,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_dir: PathBuf::from("./flatdb_data"),
            create_if_missing: true,
            cache_block_size: 8 * 1024, // 8 KiB
            sync_strategy: SyncStrategy::OnClose,
            index_initial_capacity: 16,
            index_load_factor: 0.75,
            lock_timeout: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that the tunables are usable
    pub fn validate(&self) -> Result<()> {
        if self.cache_block_size == 0 {
            return Err(FlatDbError::Config(
                "cache_block_size must be greater than zero".to_string(),
            ));
        }
        if self.index_initial_capacity == 0 {
            return Err(FlatDbError::Config(
                "index_initial_capacity must be greater than zero".to_string(),
            ));
        }
        if !(self.index_load_factor > 0.0 && self.index_load_factor < 1.0) {
            return Err(FlatDbError::Config(format!(
                "index_load_factor must be in (0, 1), got {}",
                self.index_load_factor
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the database directory
    pub fn db_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.db_dir = path.into();
        self
    }

    /// Create missing database files on open
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.config.create_if_missing = create;
        self
    }

    /// Set the read cache block size (in bytes)
    pub fn cache_block_size(mut self, size: usize) -> Self {
        self.config.cache_block_size = size;
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the initial index capacity (in slots)
    pub fn index_initial_capacity(mut self, capacity: u32) -> Self {
        self.config.index_initial_capacity = capacity;
        self
    }

    /// Set the index load factor threshold
    pub fn index_load_factor(mut self, load_factor: f32) -> Self {
        self.config.index_load_factor = load_factor;
        self
    }

    /// Bound the wait for the session lock
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
