//! Primary Index
//!
//! Open-addressing hash table mapping record id → data-file offset.
//!
//! The table lives in `index.db` and is mirrored in a `HashMap` for O(1)
//! lookups. Collisions are resolved by linear probing (step +1, wrapping).
//!
//! ## Deletion
//! Removing an entry empties its slot and then back-shifts the rest of the
//! cluster: each following entry whose home slot is not cyclically within
//! `(hole, current]` moves into the hole. Every probe chain therefore stays
//! unbroken without a tombstone marker, and `-1` remains the only "empty"
//! key on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FlatDbError, Result};

use super::ByteStore;

/// Header size: Version (2) + Reserved (2) + Capacity (4) + Size (4) + LoadFactor (4) = 16 bytes
pub const INDEX_HEADER_SIZE: u64 = 16;

/// Slot size: Key (4) + Offset (8) = 12 bytes
pub const INDEX_SLOT_SIZE: u64 = 12;

/// Current index format version
pub const INDEX_VERSION: u16 = 1;

/// Key marking a slot that holds no entry
pub const EMPTY_KEY: i32 = -1;

/// Knuth's multiplicative constant (2^32 / golden ratio)
const HASH_MULTIPLIER: u32 = 0x9E37_79B1;

/// Persisted open-addressing index with an in-memory mirror
pub struct PrimaryIndex {
    store: ByteStore,
    path: PathBuf,
    capacity: u32,
    /// Live entries
    size: u32,
    load_factor: f32,
    /// key → record offset; the read path never touches disk
    mirror: HashMap<i32, u64>,
}

impl PrimaryIndex {
    /// Open `index.db`, initializing an empty table if the file is empty
    pub fn open(
        path: &Path,
        create_if_missing: bool,
        block_size: usize,
        initial_capacity: u32,
        load_factor: f32,
    ) -> Result<Self> {
        let store = ByteStore::open(path, create_if_missing, block_size)?;

        let mut index = Self {
            store,
            path: path.to_path_buf(),
            capacity: initial_capacity.max(1),
            size: 0,
            load_factor,
            mirror: HashMap::new(),
        };

        if index.store.size()? == 0 {
            index.write_table(&vec![(EMPTY_KEY, 0); index.capacity as usize])?;
            tracing::debug!(
                "Initialized index {} with capacity {}",
                path.display(),
                index.capacity
            );
        } else {
            index.load()?;
        }

        Ok(index)
    }

    /// Check an existing `index.db` without modifying it
    ///
    /// Fails with `InvalidFormat` on an empty or short file, a bad header or
    /// a key stored twice. Returns the number of occupied slots.
    pub fn verify(path: &Path, block_size: usize) -> Result<usize> {
        let store = ByteStore::open(path, false, block_size)?;
        let table = read_table(&store, path)?;
        Ok(table.mirror.len())
    }

    /// Insert `key → offset`
    ///
    /// `EMPTY_KEY` is rejected with a `Validation` error. Rehashes first when the live/capacity ratio has reached the
    /// load-factor threshold.
    pub fn add(&mut self, key: i32, offset: u64) -> Result<()> {
        if key == EMPTY_KEY {
            return Err(FlatDbError::validation(
                "key",
                "reserved",
                format!("{} marks an empty slot and cannot be indexed", EMPTY_KEY),
            ));
        }
        if self.mirror.contains_key(&key) {
            return Err(FlatDbError::DuplicateKey { key });
        }

        if self.size as f32 / self.capacity as f32 >= self.load_factor {
            self.rehash()?;
        }

        let slot = self.find_empty_slot(key)?;
        self.write_slot(slot, key, offset)?;
        self.mirror.insert(key, offset);
        self.size += 1;
        self.write_header()?;

        tracing::trace!("Indexed key {} at slot {} -> offset {}", key, slot, offset);
        Ok(())
    }

    /// Record offset for `key`, from the in-memory mirror
    pub fn find(&self, key: i32) -> Option<u64> {
        self.mirror.get(&key).copied()
    }

    pub fn contains(&self, key: i32) -> bool {
        self.mirror.contains_key(&key)
    }

    /// Remove `key`; returns false if it was not indexed
    pub fn remove(&mut self, key: i32) -> Result<bool> {
        if !self.mirror.contains_key(&key) {
            return Ok(false);
        }

        let slot = self
            .probe_slot(key)?
            .ok_or(FlatDbError::KeyNotFound { key })?;

        self.back_shift(slot)?;
        self.mirror.remove(&key);
        self.size -= 1;
        self.write_header()?;

        tracing::trace!("Removed key {} from slot {}", key, slot);
        Ok(true)
    }

    /// Point an existing key at a new record offset
    pub fn update(&mut self, key: i32, new_offset: u64) -> Result<()> {
        if !self.mirror.contains_key(&key) {
            return Err(FlatDbError::KeyNotFound { key });
        }

        let slot = self
            .probe_slot(key)?
            .ok_or(FlatDbError::KeyNotFound { key })?;

        self.write_slot(slot, key, new_offset)?;
        self.mirror.insert(key, new_offset);
        Ok(())
    }

    /// Locate `key` by probing the on-disk table from its home slot
    ///
    /// Stops at the first empty slot, exactly as every insert, update and
    /// remove does. Returns the slot number holding `key`.
    pub fn probe_slot(&self, key: i32) -> Result<Option<u32>> {
        let mut slot = self.home_slot(key);
        for _ in 0..self.capacity {
            let (slot_key, _) = self.read_slot(slot)?;
            if slot_key == key {
                return Ok(Some(slot));
            }
            if slot_key == EMPTY_KEY {
                return Ok(None);
            }
            slot = (slot + 1) % self.capacity;
        }
        Ok(None)
    }

    /// Double the capacity and rebuild the whole table from the mirror
    pub fn rehash(&mut self) -> Result<()> {
        let new_capacity = self.capacity.checked_mul(2).ok_or(FlatDbError::IndexFull {
            key: EMPTY_KEY,
            capacity: self.capacity,
        })?;

        let mut entries: Vec<(i32, u64)> = self.mirror.iter().map(|(&k, &o)| (k, o)).collect();
        entries.sort_unstable_by_key(|&(k, _)| k);

        let mut table = vec![(EMPTY_KEY, 0u64); new_capacity as usize];
        for (key, offset) in entries {
            let mut slot = hash(key, new_capacity);
            let mut placed = false;
            for _ in 0..new_capacity {
                if table[slot as usize].0 == EMPTY_KEY {
                    table[slot as usize] = (key, offset);
                    placed = true;
                    break;
                }
                slot = (slot + 1) % new_capacity;
            }
            if !placed {
                return Err(FlatDbError::IndexFull {
                    key,
                    capacity: new_capacity,
                });
            }
        }

        let old_capacity = self.capacity;
        self.capacity = new_capacity;
        self.write_table(&table)?;

        tracing::debug!(
            "Rehashed index {}: capacity {} -> {}, {} entries",
            self.path.display(),
            old_capacity,
            new_capacity,
            self.size
        );
        Ok(())
    }

    /// Home slot of `key` under the current capacity
    pub fn home_slot(&self, key: i32) -> u32 {
        hash(key, self.capacity)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.size as usize
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Configured rehash threshold
    pub fn load_factor(&self) -> f32 {
        self.load_factor
    }

    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    pub fn close(self) -> Result<()> {
        self.store.close()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Read header and table from disk into the mirror
    fn load(&mut self) -> Result<()> {
        let table = read_table(&self.store, &self.path)?;

        self.capacity = table.capacity;
        self.load_factor = table.load_factor;
        self.size = table.mirror.len() as u32;
        self.mirror = table.mirror;

        if table.stored_size != self.size {
            tracing::warn!(
                "Index {} header size {} disagrees with {} occupied slots; correcting",
                self.path.display(),
                table.stored_size,
                self.size
            );
            self.write_header()?;
        }

        tracing::debug!(
            "Loaded index {}: {} entries, capacity {}",
            self.path.display(),
            self.size,
            self.capacity
        );
        Ok(())
    }

    fn find_empty_slot(&self, key: i32) -> Result<u32> {
        let mut slot = self.home_slot(key);
        for _ in 0..self.capacity {
            let (slot_key, _) = self.read_slot(slot)?;
            if slot_key == EMPTY_KEY {
                return Ok(slot);
            }
            slot = (slot + 1) % self.capacity;
        }
        Err(FlatDbError::IndexFull {
            key,
            capacity: self.capacity,
        })
    }

    /// Empty `hole` and close the gap it leaves in its cluster
    fn back_shift(&mut self, mut hole: u32) -> Result<()> {
        let mut current = hole;
        for _ in 1..self.capacity {
            current = (current + 1) % self.capacity;

            let (key, offset) = self.read_slot(current)?;
            if key == EMPTY_KEY {
                break;
            }

            let home = self.home_slot(key);
            let stays = if hole <= current {
                hole < home && home <= current
            } else {
                hole < home || home <= current
            };
            if !stays {
                self.write_slot(hole, key, offset)?;
                hole = current;
            }
        }
        self.write_slot(hole, EMPTY_KEY, 0)
    }

    fn read_slot(&self, slot: u32) -> Result<(i32, u64)> {
        let bytes = self.store.read(slot_offset(slot), INDEX_SLOT_SIZE as usize)?;
        let mut buf = &bytes[..];
        Ok((buf.get_i32(), buf.get_u64()))
    }

    fn write_slot(&self, slot: u32, key: i32, offset: u64) -> Result<()> {
        let mut buf = BytesMut::with_capacity(INDEX_SLOT_SIZE as usize);
        buf.put_i32(key);
        buf.put_u64(offset);
        self.store.write(slot_offset(slot), &buf)
    }

    fn encode_header(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(INDEX_HEADER_SIZE as usize);
        buf.put_u16(INDEX_VERSION);
        buf.put_u16(0); // reserved
        buf.put_u32(self.capacity);
        buf.put_u32(self.size);
        buf.put_f32(self.load_factor);
        buf
    }

    fn write_header(&self) -> Result<()> {
        self.store.write(0, &self.encode_header())
    }

    /// Rewrite header and every slot in one write, sized to `table.len()`
    fn write_table(&self, table: &[(i32, u64)]) -> Result<()> {
        let mut buf = self.encode_header();
        buf.reserve(table.len() * INDEX_SLOT_SIZE as usize);
        for &(key, offset) in table {
            buf.put_i32(key);
            buf.put_u64(offset);
        }

        self.store.write(0, &buf)?;
        self.store.set_size(buf.len() as u64)
    }
}

/// Decoded contents of `index.db`
struct LoadedTable {
    capacity: u32,
    stored_size: u32,
    load_factor: f32,
    mirror: HashMap<i32, u64>,
}

/// Parse and validate header and slots; never writes
fn read_table(store: &ByteStore, path: &Path) -> Result<LoadedTable> {
    let file_size = store.size()?;
    if file_size < INDEX_HEADER_SIZE {
        return Err(FlatDbError::invalid_format(
            path,
            format!("header truncated: {} of {} bytes", file_size, INDEX_HEADER_SIZE),
        ));
    }

    let header_bytes = store.read(0, INDEX_HEADER_SIZE as usize)?;
    let mut header = &header_bytes[..];

    let version = header.get_u16();
    let _reserved = header.get_u16();
    let capacity = header.get_u32();
    let stored_size = header.get_u32();
    let load_factor = header.get_f32();

    if version != INDEX_VERSION {
        return Err(FlatDbError::invalid_format(
            path,
            format!("unsupported index version {}", version),
        ));
    }
    if capacity == 0 {
        return Err(FlatDbError::invalid_format(path, "index capacity is zero"));
    }
    if !(load_factor > 0.0 && load_factor < 1.0) {
        return Err(FlatDbError::invalid_format(
            path,
            format!("invalid load factor {}", load_factor),
        ));
    }

    let table_len = u64::from(capacity) * INDEX_SLOT_SIZE;
    if file_size < INDEX_HEADER_SIZE + table_len {
        return Err(FlatDbError::invalid_format(
            path,
            format!(
                "table truncated: {} bytes for capacity {}",
                file_size, capacity
            ),
        ));
    }

    let table_bytes = store.read(INDEX_HEADER_SIZE, table_len as usize)?;
    let mut table = &table_bytes[..];
    let mut mirror = HashMap::new();
    for slot in 0..capacity {
        let key = table.get_i32();
        let offset = table.get_u64();
        if key == EMPTY_KEY {
            continue;
        }
        if mirror.insert(key, offset).is_some() {
            return Err(FlatDbError::invalid_format(
                path,
                format!("key {} stored twice (second at slot {})", key, slot),
            ));
        }
    }

    Ok(LoadedTable {
        capacity,
        stored_size,
        load_factor,
        mirror,
    })
}

/// Multiplicative hash of `key`, reduced modulo `capacity`
fn hash(key: i32, capacity: u32) -> u32 {
    (key as u32).wrapping_mul(HASH_MULTIPLIER) % capacity
}

fn slot_offset(slot: u32) -> u64 {
    INDEX_HEADER_SIZE + u64::from(slot) * INDEX_SLOT_SIZE
}
