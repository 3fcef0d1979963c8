//! Tile source descriptions and the built-in presets.
//!
//! Tile usage policies differ per provider. OpenStreetMap tiles are
//! "© OpenStreetMap contributors" and subject to
//! <https://operations.osmfoundation.org/policies/tiles/>; Carto basemaps are
//! free for non-commercial use only. Check the terms of any other provider.

use url::Url;

use tilecache_core::{Error, TileKey};

use crate::fetch::url::render;

/// Default edge length of a square tile, in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Default deepest zoom level.
pub const DEFAULT_MAX_ZOOM: u8 = 19;

/// (name, URL template) of the built-in sources.
const PRESETS: &[(&str, &str)] = &[
    ("OSM", "https://a.tile.openstreetmap.org/{zoom}/{x}/{y}.png"),
    ("STAMEN_TONER", "http://tile.stamen.com/toner/{zoom}/{x}/{y}.png"),
    ("STAMEN_TONER_HYBRID", "http://tile.stamen.com/toner-hybrid/{zoom}/{x}/{y}.png"),
    ("STAMEN_TONER_LABELS", "http://tile.stamen.com/toner-labels/{zoom}/{x}/{y}.png"),
    ("STAMEN_TONER_LINES", "http://tile.stamen.com/toner-lines/{zoom}/{x}/{y}.png"),
    ("STAMEN_TONER_BACKGROUND", "http://tile.stamen.com/toner-background/{zoom}/{x}/{y}.png"),
    ("STAMEN_TONER_LITE", "http://tile.stamen.com/toner-lite/{zoom}/{x}/{y}.png"),
    ("STAMEN_TERRAIN", "http://tile.stamen.com/terrain/{zoom}/{x}/{y}.jpg"),
    ("STAMEN_TERRAIN_LABELS", "http://tile.stamen.com/terrain-labels/{zoom}/{x}/{y}.jpg"),
    ("STAMEN_TERRAIN_LINES", "http://tile.stamen.com/terrain-lines/{zoom}/{x}/{y}.jpg"),
    ("STAMEN_TERRAIN_BACKGROUND", "http://tile.stamen.com/terrain-background/{zoom}/{x}/{y}.jpg"),
    ("STAMEN_WATERCOLOUR", "http://tile.stamen.com/watercolor/{zoom}/{x}/{y}.jpg"),
    ("CARTO_LIGHT", "https://a.basemaps.cartocdn.com/light_all/{zoom}/{x}/{y}.png"),
    ("CARTO_LIGHT_LABELS", "https://a.basemaps.cartocdn.com/light_only_labels/{zoom}/{x}/{y}.png"),
    ("CARTO_LIGHT_NOLABELS", "https://a.basemaps.cartocdn.com/light_nolabels/{zoom}/{x}/{y}.png"),
    ("CARTO_DARK", "https://a.basemaps.cartocdn.com/dark_all/{zoom}/{x}/{y}.png"),
    ("CARTO_DARK_LABELS", "https://a.basemaps.cartocdn.com/dark_only_labels/{zoom}/{x}/{y}.png"),
    ("CARTO_DARK_NOLABELS", "https://a.basemaps.cartocdn.com/dark_nolabels/{zoom}/{x}/{y}.png"),
];

/// A named tile server.
///
/// The name doubles as the namespace of the source's tiles in the cache, so
/// it must be unique among the sources sharing a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSource {
    name: String,
    url_template: String,
    tile_size: u32,
    max_zoom: u8,
}

impl TileSource {
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` if `name` cannot be used in a tile key.
    pub fn new(name: impl Into<String>, url_template: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        // Validate the name once, up front.
        TileKey::new(name.clone(), 0, 0, 0)?;
        Ok(Self { name, url_template: url_template.into(), tile_size: DEFAULT_TILE_SIZE, max_zoom: DEFAULT_MAX_ZOOM })
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_max_zoom(mut self, max_zoom: u8) -> Self {
        self.max_zoom = max_zoom;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url_template(&self) -> &str {
        &self.url_template
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    /// Key of the tile at (`x`, `y`) on `zoom`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` if `zoom` exceeds the source's maximum or
    /// a coordinate is outside `0..2^zoom`.
    pub fn key(&self, x: u32, y: u32, zoom: u8) -> Result<TileKey, Error> {
        if zoom > self.max_zoom {
            return Err(Error::InvalidKey(format!(
                "zoom {zoom} exceeds maximum {} of {}",
                self.max_zoom, self.name
            )));
        }
        let tiles = 1u64.checked_shl(u32::from(zoom)).unwrap_or(u64::MAX);
        if u64::from(x) >= tiles || u64::from(y) >= tiles {
            return Err(Error::InvalidKey(format!("tile ({x}, {y}) outside zoom level {zoom}")));
        }
        TileKey::new(self.name.clone(), x, y, zoom)
    }

    /// URL of the tile identified by `key`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` if `key` belongs to another source, and
    /// `Error::Configuration` if the template does not yield a usable URL.
    pub fn url_for(&self, key: &TileKey) -> Result<Url, Error> {
        if key.name() != self.name {
            return Err(Error::InvalidKey(format!(
                "source '{}' asked for a tile of '{}'",
                self.name,
                key.name()
            )));
        }
        render(&self.url_template, key.x(), key.y(), key.zoom())
            .map_err(|e| Error::Configuration(format!("{}: {e}", self.name)))
    }
}

/// The built-in tile sources.
pub fn presets() -> Vec<TileSource> {
    PRESETS
        .iter()
        .map(|(name, template)| TileSource {
            name: (*name).to_string(),
            url_template: (*template).to_string(),
            tile_size: DEFAULT_TILE_SIZE,
            max_zoom: DEFAULT_MAX_ZOOM,
        })
        .collect()
}

/// Built-in source by name, ignoring case.
pub fn preset(name: &str) -> Option<TileSource> {
    presets().into_iter().find(|source| source.name.eq_ignore_ascii_case(name))
}
