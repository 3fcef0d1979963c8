//! Store file probing and schema bootstrap.
//!
//! A file counts as a tile store when SQLite can open it and it has a table
//! named `cache`, whatever that table's columns. Existing stores are opened
//! as they are; nothing is migrated.

use std::path::Path;

use tokio_rusqlite::rusqlite::{Connection, OpenFlags};

use crate::Error;

/// Name of the single table holding cached blobs.
pub const TABLE: &str = "cache";

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS cache (
    request TEXT UNIQUE,
    data BLOB,
    create_time TEXT
)";

/// Whether a tile store already exists at `path`.
///
/// Never fails: a missing, unreadable or non-SQLite file, or one without
/// the `cache` table, all report `false`.
pub fn exists(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }

    let conn = match Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::debug!(path = %path.display(), "cannot open as SQLite: {e}");
            return false;
        }
    };

    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
        [TABLE],
        |row| row.get::<_, bool>(0),
    )
    .unwrap_or(false)
}

/// Create the `cache` table at `path`, creating the file if needed.
///
/// # Errors
///
/// Returns `Error::CorruptStore` if a file is already there but SQLite
/// cannot use it, and `Error::Database` for other failures.
pub fn bootstrap(path: &Path) -> Result<(), Error> {
    let preexisting = path.exists();
    let conn = Connection::open(path)?;

    match conn.execute_batch(CREATE_TABLE) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "created tile cache");
            Ok(())
        }
        Err(e) if preexisting => Err(Error::CorruptStore(format!("{}: {e}", path.display()))),
        Err(e) => Err(e.into()),
    }
}
