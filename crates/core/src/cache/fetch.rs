//! Read-through cache in front of a fallible fetcher.
//!
//! [`FetchCache::fetch`] answers from the [`Store`] when it holds a fresh
//! copy and otherwise asks the [`Fetcher`], writing successful results back.
//! Failed fetches are never stored, so every call after a failure retries.
//!
//! There is no single-flight: two threads missing on the same key at the
//! same time both fetch, and the second upsert wins.

use std::sync::Arc;

use bytes::Bytes;
use chrono::TimeDelta;

use super::clock::{Clock, LocalClock};
use super::key::CacheRequest;
use super::store::Store;
use crate::Error;

/// Source of truth consulted on a cache miss.
pub trait Fetcher: Send + Sync {
    type Request: CacheRequest + ?Sized;
    type Output: Into<Bytes>;

    /// Fetch `request`. `Ok(None)` means the source has nothing for it.
    fn fetch(&self, request: &Self::Request) -> Result<Option<Self::Output>, Error>;
}

/// Persistent read-through cache.
pub struct FetchCache<F, S> {
    fetcher: F,
    store: S,
    expire_time: Option<TimeDelta>,
    clock: Arc<dyn Clock>,
}

impl<F, S> FetchCache<F, S>
where
    F: Fetcher,
    S: Store,
{
    /// A cache whose entries never expire.
    pub fn new(fetcher: F, store: S) -> Self {
        Self { fetcher, store, expire_time: None, clock: Arc::new(LocalClock) }
    }

    /// Judge expiry against `clock` instead of local time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// How long a stored entry is served before it is fetched again.
    pub fn expire_time(&self) -> Option<TimeDelta> {
        self.expire_time
    }

    pub fn set_expire_time(&mut self, expire_time: Option<TimeDelta>) {
        self.expire_time = expire_time;
    }

    /// Serve stored entries forever.
    pub fn no_timeout(&mut self) {
        self.expire_time = None;
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Bytes for `request`, from the store when fresh, else from the fetcher.
    ///
    /// A freshly fetched value is returned as the `Bytes` it was stored as,
    /// not as the fetcher's own output type, so hits and misses look alike.
    ///
    /// `Ok(None)` when the fetcher has nothing; fetcher errors propagate
    /// unchanged. Neither outcome is stored.
    pub fn fetch(&self, request: &F::Request) -> Result<Option<Bytes>, Error> {
        let key = request.cache_key();

        if let Some(stored) = self.store.get(&key)? {
            let age = self.clock.now() - stored.last_update;
            match self.expire_time {
                Some(expire) if age > expire => {
                    tracing::debug!(%key, age_secs = age.num_seconds(), "stored entry expired");
                }
                _ => {
                    tracing::debug!(%key, "cache hit");
                    return Ok(Some(Bytes::from(stored.data)));
                }
            }
        } else {
            tracing::debug!(%key, "cache miss");
        }

        let Some(output) = self.fetcher.fetch(request)? else {
            tracing::debug!(%key, "fetcher returned nothing");
            return Ok(None);
        };

        let data: Bytes = output.into();
        self.store.put(&key, &data)?;
        Ok(Some(data))
    }
}
