//! LRU cache of decoded tiles, kept zlib-compressed in memory.
//!
//! Decoded tiles are large (256x256 RGB is 192KiB) and compress well, so
//! the cache trades a little CPU on every access for a much smaller
//! footprint. Values that cannot expose their raw pixels are stored as-is.

use std::hash::Hash;
use std::io::{Read, Write};

use bytes::Bytes;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};

use super::BoundedCache;
use crate::Error;

/// Pixel layout of a raw image buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// 8-bit grey.
    L,
    /// 8-bit grey with alpha.
    La,
    Rgb,
    Rgba,
    /// 8-bit indices into an RGB palette.
    P,
}

impl ColorMode {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ColorMode::L | ColorMode::P => 1,
            ColorMode::La => 2,
            ColorMode::Rgb => 3,
            ColorMode::Rgba => 4,
        }
    }
}

/// Uncompressed pixels plus everything needed to rebuild the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub mode: ColorMode,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    /// RGB triplets, only for [`ColorMode::P`].
    pub palette: Option<Vec<u8>>,
}

/// Values whose pixels can be taken out and put back losslessly.
pub trait RawPixels: Sized {
    /// The raw pixels, or `None` if this value has no pixel form.
    fn to_raw(&self) -> Option<RawImage>;

    /// Rebuild a value from pixels previously produced by [`to_raw`](Self::to_raw).
    fn from_raw(raw: RawImage) -> Result<Self, Error>;
}

/// Palette-indexed image: one byte per pixel, indexing RGB triplets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteImage {
    width: u32,
    height: u32,
    indices: Vec<u8>,
    palette: Vec<u8>,
}

impl PaletteImage {
    /// # Errors
    ///
    /// Returns `Error::CorruptStore` if `indices` does not hold exactly one
    /// byte per pixel or `palette` is not a whole number of RGB triplets
    /// (at most 256).
    pub fn new(width: u32, height: u32, indices: Vec<u8>, palette: Vec<u8>) -> Result<Self, Error> {
        if indices.len() != width as usize * height as usize {
            return Err(Error::CorruptStore(format!(
                "palette image {width}x{height} needs {} indices, got {}",
                width as usize * height as usize,
                indices.len()
            )));
        }
        if palette.len() % 3 != 0 || palette.len() > 256 * 3 {
            return Err(Error::CorruptStore(format!("bad palette length {}", palette.len())));
        }
        Ok(Self { width, height, indices, palette })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    pub fn palette(&self) -> &[u8] {
        &self.palette
    }

    /// Expand to RGB. Indices beyond the palette map to black.
    pub fn to_rgb(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let index = self.indices[(y * self.width + x) as usize] as usize * 3;
            match self.palette.get(index..index + 3) {
                Some(rgb) => image::Rgb([rgb[0], rgb[1], rgb[2]]),
                None => image::Rgb([0, 0, 0]),
            }
        })
    }
}

/// A map tile as held in memory.
#[derive(Debug, Clone, PartialEq)]
pub enum MapTile {
    /// Decoded image.
    Image(DynamicImage),
    /// Decoded palette-indexed image.
    Indexed(PaletteImage),
    /// Still-encoded bytes, e.g. PNG as served.
    Encoded(Bytes),
}

impl MapTile {
    /// Width and height, `None` for encoded tiles.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self {
            MapTile::Image(image) => Some((image.width(), image.height())),
            MapTile::Indexed(image) => Some((image.width(), image.height())),
            MapTile::Encoded(_) => None,
        }
    }
}

impl RawPixels for MapTile {
    fn to_raw(&self) -> Option<RawImage> {
        let (mode, width, height, pixels, palette) = match self {
            MapTile::Image(DynamicImage::ImageLuma8(img)) => {
                (ColorMode::L, img.width(), img.height(), img.as_raw().clone(), None)
            }
            MapTile::Image(DynamicImage::ImageLumaA8(img)) => {
                (ColorMode::La, img.width(), img.height(), img.as_raw().clone(), None)
            }
            MapTile::Image(DynamicImage::ImageRgb8(img)) => {
                (ColorMode::Rgb, img.width(), img.height(), img.as_raw().clone(), None)
            }
            MapTile::Image(DynamicImage::ImageRgba8(img)) => {
                (ColorMode::Rgba, img.width(), img.height(), img.as_raw().clone(), None)
            }
            MapTile::Indexed(img) => {
                (ColorMode::P, img.width, img.height, img.indices.clone(), Some(img.palette.clone()))
            }
            // 16-bit and float images, and encoded tiles, are kept as they are.
            MapTile::Image(_) | MapTile::Encoded(_) => return None,
        };
        Some(RawImage { mode, width, height, pixels, palette })
    }

    fn from_raw(raw: RawImage) -> Result<Self, Error> {
        let RawImage { mode, width, height, pixels, palette } = raw;
        let mismatch = || Error::CorruptStore(format!("pixel buffer does not fit a {width}x{height} {mode:?} image"));

        let tile = match mode {
            ColorMode::L => {
                MapTile::Image(DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, pixels).ok_or_else(mismatch)?))
            }
            ColorMode::La => MapTile::Image(DynamicImage::ImageLumaA8(
                GrayAlphaImage::from_raw(width, height, pixels).ok_or_else(mismatch)?,
            )),
            ColorMode::Rgb => {
                MapTile::Image(DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, pixels).ok_or_else(mismatch)?))
            }
            ColorMode::Rgba => MapTile::Image(DynamicImage::ImageRgba8(
                RgbaImage::from_raw(width, height, pixels).ok_or_else(mismatch)?,
            )),
            ColorMode::P => MapTile::Indexed(PaletteImage::new(width, height, pixels, palette.unwrap_or_default())?),
        };
        Ok(tile)
    }
}

/// Compressed form of a [`RawImage`]: pixels then palette, zlib'd together.
struct PackedImage {
    mode: ColorMode,
    width: u32,
    height: u32,
    blob: Vec<u8>,
}

impl PackedImage {
    fn pack(raw: RawImage) -> Result<Self, Error> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.pixels.len() / 4), Compression::fast());
        encoder.write_all(&raw.pixels)?;
        if let Some(palette) = &raw.palette {
            encoder.write_all(palette)?;
        }
        let blob = encoder.finish()?;
        Ok(Self { mode: raw.mode, width: raw.width, height: raw.height, blob })
    }

    fn unpack(&self) -> Result<RawImage, Error> {
        let mut data = Vec::new();
        ZlibDecoder::new(self.blob.as_slice())
            .read_to_end(&mut data)
            .map_err(|e| Error::CorruptStore(format!("compressed image: {e}")))?;

        let pixel_len = self.width as usize * self.height as usize * self.mode.bytes_per_pixel();
        if data.len() < pixel_len {
            return Err(Error::CorruptStore(format!(
                "compressed image holds {} bytes, expected at least {pixel_len}",
                data.len()
            )));
        }

        let palette = data.split_off(pixel_len);
        let palette = match self.mode {
            ColorMode::P => Some(palette),
            _ => None,
        };
        Ok(RawImage { mode: self.mode, width: self.width, height: self.height, pixels: data, palette })
    }
}

enum Stored<V> {
    Packed(PackedImage),
    Plain(V),
}

/// [`BoundedCache`] that stores images compressed.
///
/// `get` after `set` hands back a value with the same mode, size, pixels
/// and palette as the one stored.
pub struct CompressingImageCache<K, V> {
    inner: BoundedCache<K, Stored<V>>,
}

impl<K, V> CompressingImageCache<K, V>
where
    K: Eq + Hash + Clone,
    V: RawPixels + Clone,
{
    /// # Errors
    ///
    /// Returns `Error::Capacity` if `capacity` is 0.
    pub fn new(capacity: usize) -> Result<Self, Error> {
        Ok(Self { inner: BoundedCache::new(capacity)? })
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Insert or overwrite, compressing the value if it exposes raw pixels.
    pub fn set(&mut self, key: K, value: V) -> Result<(), Error> {
        let stored = match value.to_raw() {
            Some(raw) => Stored::Packed(PackedImage::pack(raw)?),
            None => Stored::Plain(value),
        };
        self.inner.set(key, stored);
        Ok(())
    }

    /// Look up and rebuild a value, marking it most recently used.
    ///
    /// # Errors
    ///
    /// Returns `Error::CorruptStore` if a compressed entry fails to unpack.
    pub fn get(&mut self, key: &K) -> Result<Option<V>, Error> {
        match self.inner.get(key) {
            None => Ok(None),
            Some(Stored::Plain(value)) => Ok(Some(value.clone())),
            Some(Stored::Packed(packed)) => V::from_raw(packed.unpack()?).map(Some),
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.contains(key)
    }

    pub fn delete(&mut self, key: &K) -> bool {
        self.inner.delete(key).is_some()
    }

    /// Keys currently held, least recently used first.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.inner.keys()
    }
}

impl<K, V> Default for CompressingImageCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self { inner: BoundedCache::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic noise so the tests do not depend on a RNG crate.
    fn noise(len: usize, mut state: u32) -> Vec<u8> {
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 24) as u8
            })
            .collect()
    }

    fn random_rgb() -> MapTile {
        let pixels = noise(200 * 100 * 3, 0x9E37_79B9);
        MapTile::Image(DynamicImage::ImageRgb8(RgbImage::from_raw(200, 100, pixels).unwrap()))
    }

    fn random_palette() -> MapTile {
        let indices = noise(200 * 100, 0x1234_5678);
        let palette = noise(3 * 256, 0xDEAD_BEEF);
        MapTile::Indexed(PaletteImage::new(200, 100, indices, palette).unwrap())
    }

    #[test]
    fn test_rgb_round_trip() {
        let mut cache = CompressingImageCache::default();
        let original = random_rgb();
        cache.set(5, original.clone()).unwrap();
        cache.set(7, MapTile::Encoded(Bytes::from_static(b"spam"))).unwrap();

        assert_eq!(cache.get(&7).unwrap(), Some(MapTile::Encoded(Bytes::from_static(b"spam"))));

        let restored = cache.get(&5).unwrap().unwrap();
        assert_eq!(restored.to_raw(), original.to_raw());
        assert_eq!(restored.dimensions(), Some((200, 100)));
        assert_eq!(restored, original);
    }

    #[test]
    fn test_palette_round_trip() {
        let mut cache = CompressingImageCache::default();
        let original = random_palette();
        cache.set(5, original.clone()).unwrap();

        let restored = cache.get(&5).unwrap().unwrap();
        let MapTile::Indexed(restored) = restored else { panic!("expected a palette image") };
        let MapTile::Indexed(original) = original else { unreachable!() };
        assert_eq!(restored.width(), original.width());
        assert_eq!(restored.height(), original.height());
        assert_eq!(restored.indices(), original.indices());
        assert_eq!(restored.palette(), original.palette());
    }

    #[test]
    fn test_short_palette_round_trip() {
        let mut cache = CompressingImageCache::new(4).unwrap();
        let original = MapTile::Indexed(PaletteImage::new(2, 2, vec![0, 1, 1, 0], vec![0, 0, 0, 255, 255, 255]).unwrap());
        cache.set("tile", original.clone()).unwrap();
        assert_eq!(cache.get(&"tile").unwrap(), Some(original));
    }

    #[test]
    fn test_other_modes_round_trip() {
        let mut cache = CompressingImageCache::new(4).unwrap();
        let gray = MapTile::Image(DynamicImage::ImageLuma8(GrayImage::from_raw(4, 2, noise(8, 7)).unwrap()));
        let gray_alpha =
            MapTile::Image(DynamicImage::ImageLumaA8(GrayAlphaImage::from_raw(4, 2, noise(16, 9)).unwrap()));
        let rgba = MapTile::Image(DynamicImage::ImageRgba8(RgbaImage::from_raw(4, 2, noise(32, 11)).unwrap()));
        let wide = MapTile::Image(DynamicImage::new_rgb16(3, 3));

        for (key, tile) in [(1, &gray), (2, &gray_alpha), (3, &rgba), (4, &wide)] {
            cache.set(key, tile.clone()).unwrap();
        }
        assert_eq!(cache.get(&1).unwrap().as_ref(), Some(&gray));
        assert_eq!(cache.get(&2).unwrap().as_ref(), Some(&gray_alpha));
        assert_eq!(cache.get(&3).unwrap().as_ref(), Some(&rgba));
        assert_eq!(cache.get(&4).unwrap().as_ref(), Some(&wide));
    }

    #[test]
    fn test_flat_image_is_stored_small() {
        let mut cache = CompressingImageCache::new(1).unwrap();
        cache.set(1, MapTile::Image(DynamicImage::new_rgb8(256, 256))).unwrap();
        let Some(Stored::Packed(packed)) = cache.inner.get(&1) else { panic!("expected packed entry") };
        assert!(packed.blob.len() < 256 * 256 * 3 / 10);
    }

    #[test]
    fn test_evicts_like_bounded_cache() {
        let mut cache = CompressingImageCache::new(2).unwrap();
        cache.set(5, random_rgb()).unwrap();
        cache.set(6, random_palette()).unwrap();
        cache.set(7, MapTile::Encoded(Bytes::new())).unwrap();

        assert!(!cache.contains(&5));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&5).unwrap(), None);
        assert!(cache.delete(&6));
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec![&7]);
    }

    #[test]
    fn test_corrupt_blob_is_reported() {
        let packed = PackedImage { mode: ColorMode::Rgb, width: 4, height: 4, blob: vec![1, 2, 3] };
        assert!(matches!(packed.unpack(), Err(Error::CorruptStore(_))));
    }

    #[test]
    fn test_palette_image_validation() {
        assert!(PaletteImage::new(2, 2, vec![0; 3], vec![]).is_err());
        assert!(PaletteImage::new(1, 1, vec![0], vec![0; 4]).is_err());

        let image = PaletteImage::new(2, 1, vec![0, 5], vec![10, 20, 30]).unwrap();
        let rgb = image.to_rgb();
        assert_eq!(rgb.get_pixel(0, 0), &image::Rgb([10, 20, 30]));
        assert_eq!(rgb.get_pixel(1, 0), &image::Rgb([0, 0, 0]));
    }
}
