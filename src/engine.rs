//! Engine Module
//!
//! The public CRUD surface over one database directory.
//!
//! ## Responsibilities
//! - Open/close lifecycle (`Closed → Open → Closed`)
//! - Validate records before any file is touched
//! - Compose data, index and metadata updates under one write-lock section
//! - Predicate scans over the data file

use std::path::Path;

use crate::config::Config;
use crate::error::{FlatDbError, Result};
use crate::record::Employee;
use crate::session::{Session, Stores};

/// The flat-file record database
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (add/update/delete): exclusive session lock for the whole
///   data → index → meta sequence
/// - **Reads** (find/scan/count): shared session lock; readers run together
///
/// Share an `Engine` across threads with `Arc<Engine>`; every method takes
/// `&self`.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// The three stores and their lock
    session: Session,
}

impl Engine {
    /// Create a closed engine for `config.db_dir`
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let session = Session::new(config.db_dir.clone(), config.clone());
        Ok(Self { config, session })
    }

    /// Create an engine and open it
    pub fn open_with(config: Config) -> Result<Self> {
        let engine = Self::new(config)?;
        engine.open()?;
        Ok(engine)
    }

    /// Open the database at `path` with default settings
    pub fn open_path(path: &Path, create_if_missing: bool) -> Result<Self> {
        let config = Config::builder()
            .db_dir(path)
            .create_if_missing(create_if_missing)
            .build();
        Self::open_with(config)
    }

    /// Open the database files; a no-op if already open
    pub fn open(&self) -> Result<()> {
        self.session.open(self.config.create_if_missing)?;
        tracing::info!("Database opened at {}", self.database_path().display());
        Ok(())
    }

    /// Close the database files; a no-op if already closed
    pub fn close(&self) -> Result<()> {
        self.session.close()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_open()
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Add a new record
    ///
    /// Fails with `Validation` or `DuplicateKey` before anything is written.
    pub fn add(&self, employee: &Employee) -> Result<()> {
        let mut guard = self.session.begin_write()?;
        let stores = &mut *guard;

        employee.validate()?;

        if stores.index.contains(employee.id) {
            return Err(FlatDbError::DuplicateKey { key: employee.id });
        }

        let record = Employee {
            deleted: false,
            ..employee.clone()
        };

        let offset = stores.data.append(&record)?;
        stores.index.add(record.id, offset)?;
        stores.meta.increment_count()?;
        self.session.sync_after_write(stores)?;

        tracing::trace!("Added record {} at offset {}", record.id, offset);
        Ok(())
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Look a record up by primary key
    pub fn find_by_id(&self, id: i32) -> Result<Option<Employee>> {
        let stores = self.session.begin_read()?;

        let Some(offset) = stores.index.find(id) else {
            return Ok(None);
        };

        let employee = stores.data.read(offset)?;
        Ok((!employee.deleted).then_some(employee))
    }

    /// Records whose department equals `department`
    pub fn find_by_department(&self, department: &str) -> Result<Vec<Employee>> {
        self.scan(|e| e.department == department)
    }

    /// Records whose position equals `position`
    pub fn find_by_position(&self, position: &str) -> Result<Vec<Employee>> {
        self.scan(|e| e.position == position)
    }

    /// Records whose name contains `fragment`, ignoring case
    pub fn find_by_name(&self, fragment: &str) -> Result<Vec<Employee>> {
        let needle = fragment.to_lowercase();
        self.scan(|e| e.name.to_lowercase().contains(&needle))
    }

    /// Every live record in slot order
    pub fn get_all(&self) -> Result<Vec<Employee>> {
        self.scan(|_| true)
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Overwrite an existing record in place
    pub fn update(&self, employee: &Employee) -> Result<()> {
        let mut guard = self.session.begin_write()?;
        let stores = &mut *guard;

        employee.validate()?;

        let offset = stores
            .index
            .find(employee.id)
            .ok_or(FlatDbError::RecordNotFound { id: employee.id })?;

        let record = Employee {
            deleted: false,
            ..employee.clone()
        };
        stores.data.overwrite(offset, &record)?;
        self.session.sync_after_write(stores)?;

        tracing::trace!("Updated record {} at offset {}", record.id, offset);
        Ok(())
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Logically delete a record; false if `id` is not indexed
    pub fn delete_by_id(&self, id: i32) -> Result<bool> {
        let mut guard = self.session.begin_write()?;
        let stores = &mut *guard;

        let deleted = Self::delete_locked(stores, id)?;
        if deleted {
            self.session.sync_after_write(stores)?;
        }
        Ok(deleted)
    }

    /// Delete every record in `department`; returns how many were deleted
    ///
    /// Matching and deleting happen under one write-lock section.
    pub fn delete_by_department(&self, department: &str) -> Result<usize> {
        let mut guard = self.session.begin_write()?;
        let stores = &mut *guard;

        let matches = stores.data.scan(|e| e.department == department)?;

        let mut deleted = 0;
        for employee in &matches {
            if Self::delete_locked(stores, employee.id)? {
                deleted += 1;
            }
        }
        if deleted > 0 {
            self.session.sync_after_write(stores)?;
        }

        tracing::debug!("Deleted {} records from department {:?}", deleted, department);
        Ok(deleted)
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Number of live records
    pub fn count(&self) -> Result<u32> {
        let stores = self.session.begin_read()?;
        Ok(stores.meta.record_count())
    }

    /// Length of the data file, deleted slots included
    pub fn size_in_bytes(&self) -> Result<u64> {
        let stores = self.session.begin_read()?;
        stores.data.size()
    }

    /// Directory this engine reads and writes
    pub fn database_path(&self) -> &Path {
        self.session.path()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn scan<F>(&self, filter: F) -> Result<Vec<Employee>>
    where
        F: Fn(&Employee) -> bool,
    {
        let stores = self.session.begin_read()?;
        stores.data.scan(filter)
    }

    /// Tombstone the slot, drop the index entry, decrement the count
    ///
    /// Caller holds the write lock.
    fn delete_locked(stores: &mut Stores, id: i32) -> Result<bool> {
        let Some(offset) = stores.index.find(id) else {
            return Ok(false);
        };

        let mut employee = stores.data.read(offset)?;
        employee.deleted = true;
        stores.data.overwrite(offset, &employee)?;

        stores.index.remove(id)?;
        stores.meta.decrement_count()?;

        tracing::trace!("Deleted record {} at offset {}", id, offset);
        Ok(true)
    }
}
