//! Error types for flatdb
//!
//! Provides a unified error type for all operations. Every variant carries
//! the structured context (field, key, offset, path) needed to act on it.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using FlatDbError
pub type Result<T> = std::result::Result<T, FlatDbError>;

/// Unified error type for flatdb operations
#[derive(Debug, Error)]
pub enum FlatDbError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File access error on {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Read out of range in {path}: {requested} bytes at offset {offset}, {available} available")]
    OutOfRange {
        path: PathBuf,
        offset: u64,
        requested: usize,
        available: u64,
    },

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    #[error("Invalid format in {path}: {reason}")]
    InvalidFormat { path: PathBuf, reason: String },

    #[error("Corrupt record{}: {reason}", offset.map(|o| format!(" at offset {}", o)).unwrap_or_default())]
    CorruptRecord { offset: Option<u64>, reason: String },

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Validation failed for {field} ({constraint}): {message}")]
    Validation {
        field: &'static str,
        constraint: &'static str,
        message: String,
    },

    #[error("Duplicate key: {key}")]
    DuplicateKey { key: i32 },

    #[error("Record not found: {id}")]
    RecordNotFound { id: i32 },

    // -------------------------------------------------------------------------
    // Index Errors
    // -------------------------------------------------------------------------
    #[error("Key not found in index: {key}")]
    KeyNotFound { key: i32 },

    #[error("Index full: no empty slot for key {key} (capacity {capacity})")]
    IndexFull { key: i32, capacity: u32 },

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Database is not open")]
    NotOpen,

    #[error("Database already exists at {path}")]
    DatabaseExists { path: PathBuf },

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Timed out after {timeout:?} waiting for {mode} lock")]
    LockTimeout {
        mode: &'static str,
        timeout: Duration,
    },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FlatDbError {
    pub(crate) fn validation(
        field: &'static str,
        constraint: &'static str,
        message: impl Into<String>,
    ) -> Self {
        FlatDbError::Validation {
            field,
            constraint,
            message: message.into(),
        }
    }

    pub(crate) fn corrupt(offset: Option<u64>, reason: impl Into<String>) -> Self {
        FlatDbError::CorruptRecord {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        FlatDbError::InvalidFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
