//! # flatdb
//!
//! A minimal flat-file record database with:
//! - Fixed-width 256-byte record slots, append-only
//! - A persisted open-addressing hash index on the integer primary key
//! - Logical deletion and predicate-based full scans
//! - Single-writer/multi-reader concurrency model
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                              │
//! │             (validation, CRUD, predicate scans)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Session                              │
//! │            (Single Writer / Multi Reader lock)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!        ┌──────────────┼───────────────┐
//!        │              │               │
//!        ▼              ▼               ▼
//!  ┌───────────┐  ┌────────────┐  ┌────────────┐
//!  │ DataFile  │  │PrimaryIndex│  │ Metadata   │
//!  │ (data.db) │  │ (index.db) │  │ (meta.db)  │
//!  └─────┬─────┘  └─────┬──────┘  └─────┬──────┘
//!        │              │               │
//!        └──────────────┼───────────────┘
//!                       ▼
//!               ┌───────────────┐
//!               │   ByteStore   │
//!               │ (block cache) │
//!               └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod storage;
pub mod session;
pub mod engine;
pub mod database;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{FlatDbError, Result};
pub use config::{Config, SyncStrategy};
pub use engine::Engine;
pub use record::Employee;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of flatdb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
