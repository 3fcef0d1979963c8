//! Persistent key -> (blob, timestamp) storage.

use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::Error;

/// Text form of stored timestamps: second resolution, no timezone.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A stored blob with the time it was last written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub data: Vec<u8>,
    pub last_update: NaiveDateTime,
}

/// Durable storage behind a [`FetchCache`](super::FetchCache).
///
/// Absence is `Ok(None)`; `Err` always means something is broken.
pub trait Store: Send + Sync {
    /// The blob stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<StoredBlob>, Error>;

    /// Insert or overwrite `key`, stamping it with the current time.
    fn put(&self, key: &str, data: &[u8]) -> Result<(), Error>;

    /// Every stored key with its last update time, in no particular order.
    fn query(&self) -> Result<Vec<(String, NaiveDateTime)>, Error>;

    /// Delete `key`; a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), Error>;
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<StoredBlob>, Error> {
        (**self).get(key)
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<(), Error> {
        (**self).put(key, data)
    }

    fn query(&self) -> Result<Vec<(String, NaiveDateTime)>, Error> {
        (**self).query()
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        (**self).remove(key)
    }
}

/// Format a timestamp the way the store writes it.
pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp.
///
/// # Errors
///
/// Returns `Error::CorruptStore` if `text` is not in [`TIMESTAMP_FORMAT`].
pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime, Error> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .map_err(|e| Error::CorruptStore(format!("bad timestamp '{text}': {e}")))
}
