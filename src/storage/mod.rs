//! Storage Module
//!
//! The three files of a database and the byte-level I/O beneath them.
//!
//! ## Responsibilities
//! - Offset-addressed file I/O with a block read cache
//! - Fixed-slot record file (append, overwrite, scan)
//! - Metadata header (signature, count, record size)
//! - Persisted open-addressing primary index
//!
//! ## Directory Layout
//! ```text
//! {db_dir}/
//! ├── meta.db   Signature "MFDB" (4) | Version (2) | Count (4) | FreeOffset (8) | RecordSize (4)
//! ├── data.db   [256-byte record] [256-byte record] ... (append order)
//! └── index.db  Header (16) | Slot 0 [Key (4) | Offset (8)] | ... | Slot capacity-1
//! ```
//! All multi-byte values are big-endian.

mod byte_store;
mod data;
mod index;
mod meta;

pub use byte_store::ByteStore;
pub use data::DataFile;
pub use index::{PrimaryIndex, EMPTY_KEY, INDEX_HEADER_SIZE, INDEX_SLOT_SIZE, INDEX_VERSION};
pub use meta::{DatabaseMeta, MetadataStore, META_SIGNATURE, META_SIZE, META_VERSION};

/// File name of the metadata header
pub const META_FILE: &str = "meta.db";

/// File name of the record slots
pub const DATA_FILE: &str = "data.db";

/// File name of the primary index
pub const INDEX_FILE: &str = "index.db";
