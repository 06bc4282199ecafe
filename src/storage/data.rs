//! Data File
//!
//! Append-only array of fixed 256-byte record slots.

use std::path::Path;

use crate::error::{FlatDbError, Result};
use crate::record::{self, Employee, RECORD_SIZE};

use super::ByteStore;

/// Record slots in `data.db`
pub struct DataFile {
    store: ByteStore,
}

impl DataFile {
    /// Open or create the data file
    pub fn open(path: &Path, create_if_missing: bool, block_size: usize) -> Result<Self> {
        let store = ByteStore::open(path, create_if_missing, block_size)?;
        Ok(Self { store })
    }

    /// Append a record at end-of-file and return its slot offset
    ///
    /// Slots are never reused, so the offset stays valid for the life of
    /// the file.
    pub fn append(&self, employee: &Employee) -> Result<u64> {
        let offset = self.store.size()?;
        self.store.write(offset, &record::encode(employee))?;
        Ok(offset)
    }

    /// Read and decode the slot at `offset`
    pub fn read(&self, offset: u64) -> Result<Employee> {
        let block = self.store.read(offset, RECORD_SIZE)?;
        record::decode(&block).map_err(|e| match e {
            FlatDbError::CorruptRecord { reason, .. } => FlatDbError::CorruptRecord {
                offset: Some(offset),
                reason,
            },
            other => other,
        })
    }

    /// Overwrite the slot at `offset` in place
    pub fn overwrite(&self, offset: u64, employee: &Employee) -> Result<()> {
        self.store.write(offset, &record::encode(employee))
    }

    /// Collect every live record accepted by `filter`
    ///
    /// Deleted slots are skipped. A slot that fails to decode is logged and
    /// skipped; I/O errors abort the scan.
    pub fn scan<F>(&self, filter: F) -> Result<Vec<Employee>>
    where
        F: Fn(&Employee) -> bool,
    {
        let size = self.store.size()?;
        let slot_size = RECORD_SIZE as u64;

        if size % slot_size != 0 {
            tracing::warn!(
                "Data file {} has a trailing partial slot ({} stray bytes)",
                self.store.path().display(),
                size % slot_size
            );
        }

        let mut results = Vec::new();
        let mut offset = 0;
        while offset + slot_size <= size {
            match self.read(offset) {
                Ok(employee) => {
                    if !employee.deleted && filter(&employee) {
                        results.push(employee);
                    }
                }
                Err(FlatDbError::CorruptRecord { reason, .. }) => {
                    tracing::warn!("Skipping corrupted record at offset {}: {}", offset, reason);
                }
                Err(e) => return Err(e),
            }
            offset += slot_size;
        }

        Ok(results)
    }

    /// Data file length in bytes
    pub fn size(&self) -> Result<u64> {
        self.store.size()
    }

    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    pub fn close(self) -> Result<()> {
        self.store.close()
    }
}
