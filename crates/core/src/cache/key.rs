//! Tile cache keys.
//!
//! A tile is stored under `name#x#y#zoom`. The source name must not contain
//! the delimiter, so every key splits back into the parts it was built from.

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Separator between key components.
pub const DELIMITER: char = '#';

/// Anything that renders to a string uniquely identifying one request.
///
/// The rendered string is the row key in the persistent store.
pub trait CacheRequest {
    fn cache_key(&self) -> String;
}

impl CacheRequest for str {
    fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl CacheRequest for String {
    fn cache_key(&self) -> String {
        self.clone()
    }
}

impl<T: CacheRequest + ?Sized> CacheRequest for &T {
    fn cache_key(&self) -> String {
        (**self).cache_key()
    }
}

/// Key of one tile of a named tile source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileKey {
    name: String,
    x: u32,
    y: u32,
    zoom: u8,
}

impl TileKey {
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` if `name` is empty or contains the delimiter.
    pub fn new(name: impl Into<String>, x: u32, y: u32, zoom: u8) -> Result<Self, Error> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidKey("tile source name must not be empty".into()));
        }
        if name.contains(DELIMITER) {
            return Err(Error::InvalidKey(format!("tile source name '{name}' contains '{DELIMITER}'")));
        }
        Ok(Self { name, x, y, zoom })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = DELIMITER;
        write!(f, "{}{d}{}{d}{}{d}{}", self.name, self.x, self.y, self.zoom)
    }
}

impl FromStr for TileKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(DELIMITER).collect();
        let [name, x, y, zoom] = parts.as_slice() else {
            return Err(Error::InvalidKey(format!("'{s}' does not have four '{DELIMITER}'-separated parts")));
        };
        let coord = |part: &str| {
            part.parse::<u32>()
                .map_err(|e| Error::InvalidKey(format!("'{s}': bad coordinate '{part}': {e}")))
        };
        let zoom = zoom
            .parse::<u8>()
            .map_err(|e| Error::InvalidKey(format!("'{s}': bad zoom '{zoom}': {e}")))?;
        TileKey::new(*name, coord(*x)?, coord(*y)?, zoom)
    }
}

impl CacheRequest for TileKey {
    fn cache_key(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_key_format() {
        let key = TileKey::new("OSM", 5, 10, 20).unwrap();
        assert_eq!(key.to_string(), "OSM#5#10#20");
        assert_eq!(key.cache_key(), "OSM#5#10#20");
    }

    #[test]
    fn test_key_parse() {
        let key: TileKey = "CARTO_DARK#1#2#3".parse().unwrap();
        assert_eq!(key.name(), "CARTO_DARK");
        assert_eq!((key.x(), key.y(), key.zoom()), (1, 2, 3));
    }

    #[test]
    fn test_name_with_delimiter_rejected() {
        assert!(matches!(TileKey::new("a#b", 0, 0, 0), Err(Error::InvalidKey(_))));
        assert!(matches!(TileKey::new("", 0, 0, 0), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_malformed_keys_rejected() {
        for bad in ["OSM#1#2", "OSM#1#2#3#4", "OSM#x#2#3", "OSM#1#2#300", "#1#2#3", "spam"] {
            assert!(bad.parse::<TileKey>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_str_requests() {
        assert_eq!("spam".cache_key(), "spam");
        assert_eq!(String::from("eggs").cache_key(), "eggs");
    }

    proptest! {
        #[test]
        fn prop_key_round_trip(name in "[A-Za-z0-9_ .-]{1,24}", x: u32, y: u32, zoom: u8) {
            let key = TileKey::new(name.clone(), x, y, zoom).unwrap();
            let parsed: TileKey = key.to_string().parse().unwrap();
            prop_assert_eq!(parsed.name(), name.as_str());
            prop_assert_eq!((parsed.x(), parsed.y(), parsed.zoom()), (x, y, zoom));
            prop_assert_eq!(parsed, key);
        }
    }
}
