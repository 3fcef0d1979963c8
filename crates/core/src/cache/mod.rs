//! SQLite-backed tile cache.
//!
//! - [`CacheDb`]: durable key -> (blob, timestamp) store, one connection per thread
//! - [`FetchCache`]: read-through cache consulting a [`Fetcher`] on a miss
//! - [`TileKey`]: `name#x#y#zoom` keys
//! - [`dump`](dump::dump): export stored tiles as image files

pub mod clock;
pub mod connection;
pub mod dump;
pub mod entries;
pub mod fetch;
pub mod key;
pub mod schema;
pub mod store;

pub use crate::Error;

pub use clock::{Clock, LocalClock, ManualClock};
pub use connection::CacheDb;
pub use fetch::{FetchCache, Fetcher};
pub use key::{CacheRequest, TileKey};
pub use store::{Store, StoredBlob, TIMESTAMP_FORMAT};
