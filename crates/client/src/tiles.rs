//! Decoded tiles of one source, through both cache levels.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use tilecache_core::{CacheDb, CacheSession, CompressingImageCache, Error, FetchCache, Fetcher, MapTile, TileKey};

use crate::fetch::{FetchConfig, HttpFetcher};
use crate::source::TileSource;

/// Tile provider for one [`TileSource`].
///
/// Lookups go to the in-memory cache of decoded tiles first, then to the
/// persistent store, and only then to the network.
///
/// Tiles are decoded with `image`, which keeps grey, grey-alpha, RGB and
/// RGBA tiles in their own mode but expands palette PNGs to RGB(A). Tiles
/// from this provider are therefore always [`MapTile::Image`];
/// [`MapTile::Indexed`] only appears when callers build it themselves.
pub struct Tiles<F = HttpFetcher> {
    source: TileSource,
    cache: FetchCache<F, Arc<CacheDb>>,
    memory: Mutex<CompressingImageCache<TileKey, MapTile>>,
}

impl Tiles<HttpFetcher> {
    /// Tiles of `source` downloaded over HTTP and stored in `session`.
    pub fn new(
        source: TileSource, session: &CacheSession, config: FetchConfig, memory_capacity: usize,
    ) -> Result<Self, Error> {
        let fetcher = HttpFetcher::new(source.clone(), config)?;
        Self::with_fetcher(source, session, fetcher, memory_capacity)
    }
}

impl<F> Tiles<F>
where
    F: Fetcher<Request = TileKey>,
{
    /// Tiles of `source` produced by an arbitrary fetcher.
    pub fn with_fetcher(
        source: TileSource, session: &CacheSession, fetcher: F, memory_capacity: usize,
    ) -> Result<Self, Error> {
        let memory = CompressingImageCache::new(memory_capacity)?;
        Ok(Self { source, cache: session.fetch_cache(fetcher), memory: Mutex::new(memory) })
    }

    pub fn source(&self) -> &TileSource {
        &self.source
    }

    pub fn fetch_cache(&self) -> &FetchCache<F, Arc<CacheDb>> {
        &self.cache
    }

    /// Number of decoded tiles held in memory.
    pub fn in_memory(&self) -> usize {
        self.memory.lock().len()
    }

    /// Decoded tile at `(x, y)` on `zoom`.
    ///
    /// `Ok(None)` when the source has no tile there.
    ///
    /// # Errors
    ///
    /// `Error::InvalidKey` for coordinates outside the source's grid,
    /// `Error::Transport` when the download fails, `Error::Image` when the
    /// bytes do not decode.
    pub fn get_tile(&self, x: u32, y: u32, zoom: u8) -> Result<Option<MapTile>, Error> {
        let key = self.source.key(x, y, zoom)?;

        if let Some(tile) = self.memory.lock().get(&key)? {
            tracing::trace!(%key, "memory hit");
            return Ok(Some(tile));
        }

        let Some(bytes) = self.cache.fetch(&key)? else {
            return Ok(None);
        };

        let tile = MapTile::Image(image::load_from_memory(&bytes)?);
        self.memory.lock().set(key, tile.clone())?;
        Ok(Some(tile))
    }

    /// Encoded tile bytes at `(x, y)` on `zoom`, skipping the memory cache.
    pub fn get_bytes(&self, x: u32, y: u32, zoom: u8) -> Result<Option<Bytes>, Error> {
        let key = self.source.key(x, y, zoom)?;
        self.cache.fetch(&key)
    }
}
