//! Metadata Store
//!
//! The 22-byte `meta.db` header: signature, version, live-record count,
//! reserved free-slot offset and record size.

use std::path::Path;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FlatDbError, Result};
use crate::record::RECORD_SIZE;

use super::ByteStore;

/// Signature identifying a flatdb database
pub const META_SIGNATURE: &[u8; 4] = b"MFDB";

/// Current metadata format version
pub const META_VERSION: u16 = 1;

/// Header size: Signature (4) + Version (2) + Count (4) + FreeOffset (8) + RecordSize (4) = 22 bytes
pub const META_SIZE: usize = 22;

/// Decoded contents of `meta.db`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseMeta {
    pub version: u16,
    /// Live (not deleted) records
    pub record_count: u32,
    /// Reserved for a free-slot list; always 0 because slots are never reused
    pub first_free_offset: u64,
    pub record_size: u32,
}

impl Default for DatabaseMeta {
    fn default() -> Self {
        Self {
            version: META_VERSION,
            record_count: 0,
            first_free_offset: 0,
            record_size: RECORD_SIZE as u32,
        }
    }
}

impl DatabaseMeta {
    fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(META_SIZE);
        buf.put_slice(META_SIGNATURE);
        buf.put_u16(self.version);
        buf.put_u32(self.record_count);
        buf.put_u64(self.first_free_offset);
        buf.put_u32(self.record_size);
        buf.to_vec()
    }

    fn decode(mut bytes: &[u8], path: &Path) -> Result<Self> {
        if &bytes[..4] != META_SIGNATURE {
            return Err(FlatDbError::invalid_format(
                path,
                format!("invalid database signature {:?}", &bytes[..4]),
            ));
        }
        bytes.advance(4);

        let meta = Self {
            version: bytes.get_u16(),
            record_count: bytes.get_u32(),
            first_free_offset: bytes.get_u64(),
            record_size: bytes.get_u32(),
        };

        if meta.version != META_VERSION {
            return Err(FlatDbError::invalid_format(
                path,
                format!("unsupported version {}", meta.version),
            ));
        }
        if meta.record_size != RECORD_SIZE as u32 {
            return Err(FlatDbError::invalid_format(
                path,
                format!(
                    "record size {} does not match {}",
                    meta.record_size, RECORD_SIZE
                ),
            ));
        }
        Ok(meta)
    }
}

/// Owner of `meta.db`
///
/// Every mutation is written through immediately; callers hold the session
/// write lock.
pub struct MetadataStore {
    store: ByteStore,
    meta: DatabaseMeta,
}

impl MetadataStore {
    /// Open `meta.db`, writing a fresh header if the file is empty
    pub fn open(path: &Path, create_if_missing: bool, block_size: usize) -> Result<Self> {
        let store = ByteStore::open(path, create_if_missing, block_size)?;
        let size = store.size()?;

        let meta = if size == 0 {
            let meta = DatabaseMeta::default();
            store.write(0, &meta.encode())?;
            tracing::debug!("Initialized metadata {}", path.display());
            meta
        } else if size < META_SIZE as u64 {
            return Err(FlatDbError::invalid_format(
                path,
                format!("header truncated: {} of {} bytes", size, META_SIZE),
            ));
        } else {
            DatabaseMeta::decode(&store.read(0, META_SIZE)?, path)?
        };

        Ok(Self { store, meta })
    }

    /// Check an existing `meta.db` without modifying it
    ///
    /// Unlike `open`, an empty file is `InvalidFormat` rather than a fresh
    /// database.
    pub fn verify(path: &Path, block_size: usize) -> Result<DatabaseMeta> {
        let store = ByteStore::open(path, false, block_size)?;
        let size = store.size()?;
        if size < META_SIZE as u64 {
            return Err(FlatDbError::invalid_format(
                path,
                format!("header truncated: {} of {} bytes", size, META_SIZE),
            ));
        }
        DatabaseMeta::decode(&store.read(0, META_SIZE)?, path)
    }

    pub fn meta(&self) -> &DatabaseMeta {
        &self.meta
    }

    pub fn record_count(&self) -> u32 {
        self.meta.record_count
    }

    pub fn increment_count(&mut self) -> Result<()> {
        self.meta.record_count = self.meta.record_count.saturating_add(1);
        self.persist()
    }

    pub fn decrement_count(&mut self) -> Result<()> {
        if self.meta.record_count == 0 {
            tracing::warn!(
                "Record count underflow in {}; keeping 0",
                self.store.path().display()
            );
            return Ok(());
        }
        self.meta.record_count -= 1;
        self.persist()
    }

    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    pub fn close(self) -> Result<()> {
        self.store.close()
    }

    fn persist(&self) -> Result<()> {
        self.store.write(0, &self.meta.encode())
    }
}
