//! Byte Store
//!
//! Offset-addressed reads and writes over a single file, with one
//! read-through block cache.
//!
//! Writes past the end of the file grow it; reads past the end fail with
//! `OutOfRange`. The asymmetry is what lets the data file append by writing
//! at `size()`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{FlatDbError, Result};

/// Positioned file I/O with a single-block read cache
///
/// ## Concurrency:
/// - File handle and cache live behind one `Mutex`, so reads take `&self`
///   and readers holding the session's shared lock can use the store together
pub struct ByteStore {
    /// Path of the underlying file (for error context)
    path: PathBuf,

    /// File handle + cache, serialized per store
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    file: File,
    cache: BlockCache,
}

/// One cached, block-aligned window of the file
struct BlockCache {
    block_size: usize,
    /// Block-aligned file offset of `data[0]`
    block_offset: u64,
    /// Bytes actually present in the file (shorter than a block at EOF)
    data: Vec<u8>,
    valid: bool,
}

impl BlockCache {
    fn new(block_size: usize) -> Self {
        Self {
            block_size,
            block_offset: 0,
            data: Vec::with_capacity(block_size),
            valid: false,
        }
    }

    fn align(&self, offset: u64) -> u64 {
        offset - offset % self.block_size as u64
    }

    /// True if `[offset, offset + len)` fits inside one block
    fn fits_in_block(&self, offset: u64, len: usize) -> bool {
        len <= self.block_size
            && offset + len as u64 <= self.align(offset) + self.block_size as u64
    }

    fn holds(&self, block_offset: u64) -> bool {
        self.valid && self.block_offset == block_offset
    }

    /// Drop the cached block if a write to `[offset, offset + len)` changes
    /// what it should hold
    ///
    /// A short EOF block is also stale once a write ends past its last byte:
    /// the file has grown and the gap now reads as zeros.
    fn invalidate_range(&mut self, offset: u64, len: usize) {
        if !self.valid {
            return;
        }
        let end = offset + len as u64;
        let block_end = self.block_offset + self.block_size as u64;
        let cached_end = self.block_offset + self.data.len() as u64;

        let overlaps = offset < block_end && end > self.block_offset;
        let grows_short_block = self.data.len() < self.block_size && end > cached_end;
        if overlaps || grows_short_block {
            self.valid = false;
        }
    }

    fn invalidate(&mut self) {
        self.valid = false;
    }
}

impl ByteStore {
    /// Open a file for reading and writing
    ///
    /// A missing file is created (with its parent directories) only when
    /// `create_if_missing` is set; otherwise it is a `FileAccess` error.
    pub fn open(path: &Path, create_if_missing: bool, block_size: usize) -> Result<Self> {
        if !path.exists() {
            if !create_if_missing {
                return Err(FlatDbError::FileAccess {
                    path: path.to_path_buf(),
                    source: io::Error::new(io::ErrorKind::NotFound, "file not found"),
                });
            }
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| Self::access_error(path, e))?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create_if_missing)
            .open(path)
            .map_err(|e| Self::access_error(path, e))?;

        tracing::trace!("Opened byte store {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(StoreInner {
                file,
                cache: BlockCache::new(block_size.max(1)),
            }),
        })
    }

    /// Read exactly `len` bytes at `offset`
    pub fn read(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }

        let mut inner = self.inner.lock();
        let StoreInner { file, cache } = &mut *inner;

        if cache.fits_in_block(offset, len) {
            let block_offset = cache.align(offset);
            if !cache.holds(block_offset) {
                self.load_block(file, cache, block_offset)?;
            }

            let start = (offset - block_offset) as usize;
            if start + len > cache.data.len() {
                let available = (cache.data.len() as u64).saturating_sub(start as u64);
                return Err(self.out_of_range(offset, len, available));
            }
            return Ok(cache.data[start..start + len].to_vec());
        }

        // Large or block-straddling read: go to the file directly
        let size = file.metadata().map_err(|e| self.io_error(e))?.len();
        if offset + len as u64 > size {
            return Err(self.out_of_range(offset, len, size.saturating_sub(offset)));
        }

        let mut buf = vec![0u8; len];
        file.seek(SeekFrom::Start(offset)).map_err(|e| self.io_error(e))?;
        file.read_exact(&mut buf).map_err(|e| self.io_error(e))?;
        Ok(buf)
    }

    /// Write `bytes` at `offset`, growing the file if needed
    pub fn write(&self, offset: u64, bytes: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();

        // Before the write, so a failed partial write leaves nothing stale
        inner.cache.invalidate_range(offset, bytes.len());

        inner
            .file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| self.io_error(e))?;
        inner.file.write_all(bytes).map_err(|e| self.io_error(e))?;
        Ok(())
    }

    /// Current file length in bytes
    pub fn size(&self) -> Result<u64> {
        let inner = self.inner.lock();
        let metadata = inner.file.metadata().map_err(|e| self.io_error(e))?;
        Ok(metadata.len())
    }

    /// Truncate or extend (zero-filled) the file to `size` bytes
    pub fn set_size(&self, size: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.file.set_len(size).map_err(|e| self.io_error(e))?;
        inner.cache.invalidate();
        Ok(())
    }

    /// Force written data to disk
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.file.flush().map_err(|e| self.io_error(e))?;
        inner.file.sync_all().map_err(|e| self.io_error(e))
    }

    /// Flush and release the file handle
    pub fn close(self) -> Result<()> {
        self.flush()?;
        tracing::trace!("Closed byte store {}", self.path.display());
        Ok(())
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn load_block(&self, file: &mut File, cache: &mut BlockCache, block_offset: u64) -> Result<()> {
        cache.invalidate();
        cache.data.clear();

        file.seek(SeekFrom::Start(block_offset))
            .map_err(|e| self.io_error(e))?;
        Read::by_ref(file)
            .take(cache.block_size as u64)
            .read_to_end(&mut cache.data)
            .map_err(|e| self.io_error(e))?;

        cache.block_offset = block_offset;
        cache.valid = true;
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> FlatDbError {
        Self::access_error(&self.path, source)
    }

    fn access_error(path: &Path, source: io::Error) -> FlatDbError {
        FlatDbError::FileAccess {
            path: path.to_path_buf(),
            source,
        }
    }

    fn out_of_range(&self, offset: u64, requested: usize, available: u64) -> FlatDbError {
        FlatDbError::OutOfRange {
            path: self.path.clone(),
            offset,
            requested,
            available,
        }
    }
}
