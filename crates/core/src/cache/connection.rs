//! Database handle with one SQLite connection per thread.
//!
//! SQLite connections are not shared between threads. Each thread touching
//! a [`CacheDb`] lazily opens its own connection to the same file through a
//! [`PerThreadResource`]; SQLite's file locking arbitrates between them.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_rusqlite::rusqlite::Connection;

use super::clock::{Clock, LocalClock};
use super::schema;
use crate::Error;
use crate::per_thread::PerThreadResource;

/// How long a connection waits on another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Tile cache database handle.
///
/// Safe to share between threads (typically behind an `Arc`).
pub struct CacheDb {
    path: PathBuf,
    connections: PerThreadResource<Connection>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl CacheDb {
    /// Open the store at `path`, creating the file and table if no store
    /// exists there yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::open_with_clock(path, Arc::new(LocalClock))
    }

    /// Like [`open`](Self::open), stamping writes with `clock`.
    pub fn open_with_clock(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if !schema::exists(&path) {
            schema::bootstrap(&path)?;
        }

        let connect_path = path.clone();
        let connections = PerThreadResource::new(move || connect(&connect_path));
        connections.set_destructor(|conn: &mut Connection| {
            conn.flush_prepared_statement_cache();
            tracing::debug!("dropping connection of exited thread");
        });

        let db = Self { path, connections, clock };

        // Fail here rather than on first use if the file is unusable.
        db.connections.get()?;

        Ok(db)
    }

    /// Whether a store already exists at `path`. See [`schema::exists`].
    pub fn exists(path: impl AsRef<Path>) -> bool {
        schema::exists(path.as_ref())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the calling thread's connection.
    ///
    /// Other threads keep theirs. The next operation on this thread opens a
    /// fresh connection.
    pub fn close(&self) {
        if self.connections.release() {
            tracing::debug!(path = %self.path.display(), "closed connection");
        }
    }

    /// Number of threads currently holding a connection.
    pub fn open_connections(&self) -> usize {
        self.connections.len()
    }

    /// Run `f` on the calling thread's connection.
    pub(crate) fn with_conn<R>(&self, f: impl FnOnce(&mut Connection) -> Result<R, Error>) -> Result<R, Error> {
        let handle = self.connections.get()?;
        let mut conn = handle.lock();
        f(&mut conn)
    }
}

impl fmt::Debug for CacheDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheDb")
            .field("path", &self.path)
            .field("connections", &self.connections)
            .finish_non_exhaustive()
    }
}

/// Open a connection and apply the pragmas every connection needs.
fn connect(path: &Path) -> Result<Connection, Error> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         PRAGMA temp_store=MEMORY;",
    )?;
    Ok(conn)
}
