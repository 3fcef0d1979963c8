//! Unified error types for the tile cache.
//!
//! "Not present" is not an error: stores and memory caches report it with
//! `Option`. Everything here is something the caller has to react to.

use std::path::PathBuf;
use tokio_rusqlite::rusqlite;

/// Unified error type for the tile cache crates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The key is not held by the cache.
    #[error("KEY_NOT_FOUND: {0}")]
    KeyNotFound(String),

    /// The fetcher failed to produce the requested artifact.
    #[error("TRANSPORT_FAILURE: {0}")]
    Transport(String),

    /// Stored data could not be interpreted.
    #[error("CORRUPT_STORE: {0}")]
    CorruptStore(String),

    /// The cache was used before it was set up.
    #[error("CONFIGURATION_ERROR: {0}")]
    Configuration(String),

    /// A bounded cache was asked for an unusable capacity.
    #[error("CAPACITY_ERROR: capacity must be at least 1, got {0}")]
    Capacity(usize),

    /// A key could not be built or decomposed.
    #[error("INVALID_KEY: {0}")]
    InvalidKey(String),

    /// The dump target already holds files.
    #[error("DUMP_TARGET_NOT_EMPTY: {}", .0.display())]
    DumpTargetNotEmpty(PathBuf),

    /// Database operation failed.
    #[error("DATABASE_ERROR: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO_ERROR: {0}")]
    Io(#[from] std::io::Error),

    #[error("IMAGE_ERROR: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Whether this error only reports that nothing was cached under a key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::KeyNotFound(_))
    }
}
