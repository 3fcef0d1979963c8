//! Core of the tile cache.
//!
//! This crate provides:
//! - Persistent tile cache with a SQLite backend and per-thread connections
//! - Read-through fetch cache with optional expiry
//! - Bounded in-memory caches for decoded tiles
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod memory;
pub mod per_thread;
pub mod session;

pub use cache::{CacheDb, CacheRequest, FetchCache, Fetcher, Store, TileKey};
pub use error::Error;
pub use memory::{BoundedCache, CompressingImageCache, MapTile};
pub use per_thread::PerThreadResource;
pub use session::CacheSession;
