//! Export of cached tiles to a directory tree.
//!
//! Tiles land at `<dir>/<source>/<zoom>/<x>_<y>[.png|.jpg]`, the extension
//! sniffed from the blob's magic bytes.

use std::fs;
use std::path::{Component, Path, PathBuf};

use super::key::TileKey;
use super::store::Store;
use crate::Error;

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];

/// File extension for an image blob, if its format is recognisable.
pub fn sniff_extension(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(PNG_MAGIC) {
        Some("png")
    } else if data.starts_with(JPEG_MAGIC) {
        Some("jpg")
    } else {
        None
    }
}

/// Path a tile is written to beneath `dir`.
///
/// # Errors
///
/// Returns `Error::InvalidKey` if the source name is not a single plain
/// path component (absolute, `..`, or containing a separator), since the
/// file would land outside `dir`.
pub fn tile_path(dir: &Path, key: &TileKey, data: &[u8]) -> Result<PathBuf, Error> {
    let mut components = Path::new(key.name()).components();
    let name = match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if name == key.name() => name,
        _ => return Err(Error::InvalidKey(format!("source name '{}' is not a plain directory name", key.name()))),
    };

    let leaf = format!("{}_{}", key.x(), key.y());
    let mut path = dir.join(name).join(key.zoom().to_string()).join(leaf);
    if let Some(ext) = sniff_extension(data) {
        path.set_extension(ext);
    }
    Ok(path)
}

/// Write every stored tile beneath `dir`.
///
/// `dir` is created if missing. Entries whose key is not a tile key, or
/// whose source name would leave `dir`, are skipped with a warning.
/// Returns the number of files written.
///
/// # Errors
///
/// Returns `Error::DumpTargetNotEmpty` before writing anything if `dir`
/// already has entries.
pub fn dump<S: Store + ?Sized>(store: &S, dir: &Path) -> Result<usize, Error> {
    fs::create_dir_all(dir)?;
    if fs::read_dir(dir)?.next().is_some() {
        return Err(Error::DumpTargetNotEmpty(dir.to_path_buf()));
    }

    let mut written = 0;
    for (raw_key, _) in store.query()? {
        let key: TileKey = match raw_key.parse() {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(key = %raw_key, "skipping entry: {e}");
                continue;
            }
        };

        // Removed by someone else since the listing.
        let Some(blob) = store.get(&raw_key)? else { continue };

        let path = match tile_path(dir, &key, &blob.data) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(key = %raw_key, "skipping entry: {e}");
                continue;
            }
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &blob.data)?;
        written += 1;
    }

    tracing::info!(written, dir = %dir.display(), "dumped tiles");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CacheDb;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nrest-of-png";
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00];

    #[test]
    fn test_sniff_extension() {
        assert_eq!(sniff_extension(PNG), Some("png"));
        assert_eq!(sniff_extension(JPEG), Some("jpg"));
        assert_eq!(sniff_extension(b"GIF89a"), None);
        assert_eq!(sniff_extension(b""), None);
    }

    #[test]
    fn test_dump_layout() {
        let dir = tempfile::tempdir().unwrap();
        let db = CacheDb::open(dir.path().join("tiles.db")).unwrap();
        db.put("OSM#1#2#3", PNG).unwrap();
        db.put("STAMEN_TERRAIN#4#5#6", JPEG).unwrap();
        db.put("OSM#7#8#3", b"mystery").unwrap();
        db.put("not a tile key", b"skipped").unwrap();

        let out = dir.path().join("dump");
        assert_eq!(dump(&db, &out).unwrap(), 3);

        assert_eq!(fs::read(out.join("OSM/3/1_2.png")).unwrap(), PNG);
        assert_eq!(fs::read(out.join("STAMEN_TERRAIN/6/4_5.jpg")).unwrap(), JPEG);
        assert_eq!(fs::read(out.join("OSM/3/7_8")).unwrap(), b"mystery");
    }

    #[test]
    fn test_tile_path_rejects_escaping_names() {
        let dir = Path::new("/srv/dump");
        for name in ["..", ".", "/etc", "a/b", "a/..", "./a"] {
            let key = TileKey::new(name, 1, 2, 3).unwrap();
            assert!(matches!(tile_path(dir, &key, PNG), Err(Error::InvalidKey(_))), "{name} accepted");
        }
        let key = TileKey::new("OSM", 1, 2, 3).unwrap();
        assert_eq!(tile_path(dir, &key, PNG).unwrap(), dir.join("OSM/3/1_2.png"));
    }

    #[test]
    fn test_dump_stays_inside_target() {
        let dir = tempfile::tempdir().unwrap();
        let db = CacheDb::open(dir.path().join("tiles.db")).unwrap();
        let outside = dir.path().join("outside");
        db.put(&format!("{}#1#2#3", outside.display()), PNG).unwrap();
        db.put("..#4#5#6", PNG).unwrap();
        db.put("OSM#7#8#9", PNG).unwrap();

        let target = dir.path().join("a").join("dump");
        assert_eq!(dump(&db, &target).unwrap(), 1);

        assert!(target.join("OSM/9/7_8.png").is_file());
        assert!(!outside.exists());
        assert!(!dir.path().join("a/6").exists());
    }

    #[test]
    fn test_dump_refuses_non_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let db = CacheDb::open(dir.path().join("tiles.db")).unwrap();
        db.put("OSM#1#2#3", PNG).unwrap();

        let result = dump(&db, dir.path());
        assert!(matches!(result, Err(Error::DumpTargetNotEmpty(_))));
    }
}
