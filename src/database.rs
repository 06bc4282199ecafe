//! Database lifecycle
//!
//! Create, validate and delete a database directory as a whole.

use std::fs;
use std::io;
use std::path::Path;

use crate::config::Config;
use crate::error::{FlatDbError, Result};
use crate::record::RECORD_SIZE;
use crate::session::Stores;
use crate::storage::{MetadataStore, PrimaryIndex, DATA_FILE, INDEX_FILE, META_FILE};

const DATABASE_FILES: [&str; 3] = [META_FILE, DATA_FILE, INDEX_FILE];

/// Create `path` and all three files with fresh headers
///
/// Fails with `DatabaseExists` if any of the three files is already there.
pub fn create_database(path: &Path) -> Result<()> {
    if DATABASE_FILES.iter().any(|name| path.join(name).exists()) {
        return Err(FlatDbError::DatabaseExists {
            path: path.to_path_buf(),
        });
    }

    let stores = Stores::open(path, true, &Config::default())?;
    stores.close()?;

    tracing::info!("Created database at {}", path.display());
    Ok(())
}

/// Check that all three files are present and well-formed
///
/// Never writes to the files it checks.
pub fn validate_database(path: &Path) -> Result<()> {
    for name in DATABASE_FILES {
        let file = path.join(name);
        if !file.is_file() {
            return Err(FlatDbError::FileAccess {
                path: file,
                source: io::Error::new(io::ErrorKind::NotFound, "database file missing"),
            });
        }
    }

    // Read-only checks: nothing here initializes or repairs a header
    let block_size = Config::default().cache_block_size;
    MetadataStore::verify(&path.join(META_FILE), block_size)?;
    PrimaryIndex::verify(&path.join(INDEX_FILE), block_size)?;

    let data_path = path.join(DATA_FILE);
    let data_size = fs::metadata(&data_path)
        .map_err(|source| FlatDbError::FileAccess {
            path: data_path.clone(),
            source,
        })?
        .len();

    if data_size % RECORD_SIZE as u64 != 0 {
        return Err(FlatDbError::invalid_format(
            data_path,
            format!(
                "length {} is not a multiple of the {}-byte record size",
                data_size, RECORD_SIZE
            ),
        ));
    }
    Ok(())
}

/// True if `path` holds a complete, well-formed database
pub fn is_valid_database(path: &Path) -> bool {
    match validate_database(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!("{} is not a valid database: {}", path.display(), e);
            false
        }
    }
}

/// Delete all three files, then the directory if nothing else is in it
pub fn delete_database(path: &Path) -> Result<()> {
    for name in DATABASE_FILES {
        let file = path.join(name);
        match fs::remove_file(&file) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(FlatDbError::FileAccess { path: file, source }),
        }
    }

    if let Err(e) = fs::remove_dir(path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::debug!("Leaving directory {} in place: {}", path.display(), e);
        }
    }

    tracing::info!("Deleted database at {}", path.display());
    Ok(())
}
