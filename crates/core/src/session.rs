//! Explicitly initialised, process-lifetime handle onto the tile store.
//!
//! Create one [`CacheSession`] at startup and hand it, or the store it owns,
//! to whatever needs the cache.

use std::path::Path;
use std::sync::Arc;

use crate::Error;
use crate::cache::{CacheDb, FetchCache, Fetcher};
use crate::config::AppConfig;

/// An open tile store plus the cache policy applied to it.
#[derive(Debug, Clone)]
pub struct CacheSession {
    store: Arc<CacheDb>,
    expire_time: Option<chrono::TimeDelta>,
}

impl CacheSession {
    /// Open the store at `path`.
    ///
    /// A missing store is only created when `create` is set, so a wrong
    /// path is reported instead of silently starting an empty cache.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if no store exists at `path` and
    /// `create` is false.
    pub fn init(path: impl AsRef<Path>, create: bool) -> Result<Self, Error> {
        let path = path.as_ref();
        if !create && !CacheDb::exists(path) {
            return Err(Error::Configuration(format!(
                "the tile cache {} does not exist and creating it was not requested. \
                 If this is the first run, initialise it with create enabled; \
                 otherwise check the path.",
                path.display()
            )));
        }

        let store = CacheDb::open(path)?;
        tracing::info!(path = %path.display(), "opened tile cache");
        Ok(Self { store: Arc::new(store), expire_time: None })
    }

    /// Open the store described by `config`, applying its expiry.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let mut session = Self::init(&config.db_path, config.create)?;
        session.expire_time = config.expire_time();
        Ok(session)
    }

    pub fn store(&self) -> Arc<CacheDb> {
        Arc::clone(&self.store)
    }

    pub fn expire_time(&self) -> Option<chrono::TimeDelta> {
        self.expire_time
    }

    pub fn set_expire_time(&mut self, expire_time: Option<chrono::TimeDelta>) {
        self.expire_time = expire_time;
    }

    /// A read-through cache over this session's store.
    pub fn fetch_cache<F: Fetcher>(&self, fetcher: F) -> FetchCache<F, Arc<CacheDb>> {
        let mut cache = FetchCache::new(fetcher, self.store());
        cache.set_expire_time(self.expire_time);
        cache
    }

    /// Release the calling thread's connection.
    pub fn close(self) {
        self.store.close();
    }
}
