//! Client side of the tile cache.
//!
//! This crate provides tile source descriptions, the blocking HTTP fetcher
//! and the [`Tiles`] provider that decodes tiles through the memory cache
//! and the persistent store.

pub mod fetch;
pub mod source;
pub mod tiles;

pub use fetch::{FetchConfig, HttpFetcher, UrlError};
pub use source::{TileSource, preset, presets};
pub use tiles::Tiles;
