//! Subcommand implementations.
//!
//! Each command writes its report to `out` and leaves logging to tracing.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{NaiveDateTime, TimeDelta};

use tilecache_client::{FetchConfig, Tiles, preset, presets};
use tilecache_core::cache::clock::{Clock, LocalClock};
use tilecache_core::cache::dump::dump as dump_store;
use tilecache_core::cache::store::{format_timestamp, parse_timestamp};
use tilecache_core::config::AppConfig;
use tilecache_core::{CacheSession, Error, Store};

fn open(config: &AppConfig) -> Result<CacheSession> {
    CacheSession::from_config(config).with_context(|| format!("opening {}", config.db_path.display()))
}

pub fn init(config: &AppConfig, out: &mut impl Write) -> Result<()> {
    let session = CacheSession::init(&config.db_path, true)?;
    writeln!(out, "tile cache ready at {}", session.store().path().display())?;
    session.close();
    Ok(())
}

pub fn list(config: &AppConfig, json: bool, out: &mut impl Write) -> Result<()> {
    let session = open(config)?;
    let mut entries = session.store().query()?;
    entries.sort();

    if json {
        let items: Vec<serde_json::Value> = entries
            .iter()
            .map(|(key, at)| serde_json::json!({ "key": key, "last_update": format_timestamp(*at) }))
            .collect();
        writeln!(out, "{}", serde_json::to_string_pretty(&items)?)?;
    } else {
        for (key, at) in &entries {
            writeln!(out, "{key}\t{}", format_timestamp(*at))?;
        }
    }
    Ok(())
}

pub fn fetch(
    config: &AppConfig, source: &str, (x, y, zoom): (u32, u32, u8), file: Option<&Path>, out: &mut impl Write,
) -> Result<()> {
    let source = preset(source).ok_or_else(|| anyhow!("unknown tile source '{source}', see `tilecache sources`"))?;
    let session = open(config)?;
    let tiles = Tiles::new(source, &session, FetchConfig::from_app(config), config.memory_capacity)?;

    let Some(bytes) = tiles.get_bytes(x, y, zoom)? else {
        let key = tiles.source().key(x, y, zoom)?;
        return Err(Error::KeyNotFound(format!("{key}: source has no tile here")).into());
    };

    match file {
        Some(path) => {
            std::fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))?;
            writeln!(out, "wrote {} bytes to {}", bytes.len(), path.display())?;
        }
        None => writeln!(out, "{} bytes", bytes.len())?,
    }
    Ok(())
}

pub fn remove(config: &AppConfig, key: &str, out: &mut impl Write) -> Result<()> {
    let session = open(config)?;
    let store = session.store();
    if store.get(key)?.is_none() {
        writeln!(out, "{key} not stored")?;
        return Ok(());
    }
    store.remove(key)?;
    writeln!(out, "removed {key}")?;
    Ok(())
}

/// Resolve the `clean` cutoff from exactly one of its two forms.
pub fn cutoff(older_than_days: Option<u32>, before: Option<&str>) -> Result<NaiveDateTime> {
    match (older_than_days, before) {
        (Some(days), None) => TimeDelta::try_days(i64::from(days))
            .and_then(|age| LocalClock.now().checked_sub_signed(age))
            .ok_or_else(|| anyhow!("--older-than-days {days} reaches before the earliest representable date")),
        (None, Some(text)) => Ok(parse_timestamp(text)?),
        _ => bail!("give exactly one of --older-than-days and --before"),
    }
}

pub fn clean(config: &AppConfig, cutoff: NaiveDateTime, out: &mut impl Write) -> Result<()> {
    let session = open(config)?;
    let removed = session.store().clean_older_than(cutoff)?;
    writeln!(out, "removed {removed} entries last updated before {}", format_timestamp(cutoff))?;
    Ok(())
}

pub fn prune(config: &AppConfig, max_entries: usize, out: &mut impl Write) -> Result<()> {
    let session = open(config)?;
    let removed = session.store().prune_oldest(max_entries)?;
    writeln!(out, "removed {removed} entries")?;
    Ok(())
}

pub fn dump(config: &AppConfig, dir: &Path, out: &mut impl Write) -> Result<()> {
    let session = open(config)?;
    let written = dump_store(&session.store(), dir)?;
    writeln!(out, "wrote {written} tiles to {}", dir.display())?;
    Ok(())
}

pub fn sources(out: &mut impl Write) -> Result<()> {
    for source in presets() {
        writeln!(out, "{:<26} {}", source.name(), source.url_template())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn config(dir: &Path) -> AppConfig {
        AppConfig { db_path: dir.join("tiles.db"), ..Default::default() }
    }

    fn output(run: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut buf = Vec::new();
        run(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_commands_need_init() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let err = list(&config, false, &mut Vec::new()).unwrap_err();
        assert!(format!("{err:#}").contains("CONFIGURATION_ERROR"));
    }

    #[test]
    fn test_init_list_remove() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        output(|out| init(&config, out));

        let session = CacheSession::init(&config.db_path, false).unwrap();
        session.store().put("OSM#1#2#3", b"png").unwrap();
        session.store().put("OSM#0#0#0", b"png").unwrap();

        let text = output(|out| list(&config, false, out));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("OSM#0#0#0\t"));

        let json = output(|out| list(&config, true, out));
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[1]["key"], "OSM#1#2#3");

        assert_eq!(output(|out| remove(&config, "OSM#1#2#3", out)), "removed OSM#1#2#3\n");
        assert_eq!(output(|out| remove(&config, "OSM#1#2#3", out)), "OSM#1#2#3 not stored\n");
    }

    #[test]
    fn test_prune_and_clean() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig { create: true, ..config(dir.path()) };
        let session = CacheSession::from_config(&config).unwrap();
        for key in ["a", "b", "c"] {
            session.store().put(key, b"x").unwrap();
        }

        assert_eq!(output(|out| prune(&config, 2, out)), "removed 1 entries\n");

        let far_future = NaiveDate::from_ymd_opt(2999, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let text = output(|out| clean(&config, far_future, out));
        assert!(text.starts_with("removed 2 entries"));
        assert!(session.store().is_empty().unwrap());
    }

    #[test]
    fn test_cutoff_forms() {
        let at = cutoff(None, Some("2020-05-01T10:00:00")).unwrap();
        assert_eq!(at, NaiveDate::from_ymd_opt(2020, 5, 1).unwrap().and_hms_opt(10, 0, 0).unwrap());

        let days = cutoff(Some(2), None).unwrap();
        assert!(days < LocalClock.now() - TimeDelta::days(1));

        let err = cutoff(Some(u32::MAX), None).unwrap_err();
        assert!(err.to_string().contains("earliest representable date"));
        assert!(cutoff(Some(100_000), None).is_ok());

        assert!(cutoff(None, Some("yesterday")).is_err());
        assert!(cutoff(None, None).is_err());
    }

    #[test]
    fn test_fetch_unknown_source() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig { create: true, ..config(dir.path()) };
        let err = fetch(&config, "NOPE", (0, 0, 0), None, &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("unknown tile source"));
    }

    #[test]
    fn test_dump_writes_tiles() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig { create: true, ..config(dir.path()) };
        let session = CacheSession::from_config(&config).unwrap();
        session.store().put("OSM#1#2#3", b"\x89PNG\r\n\x1a\nrest").unwrap();

        let target = dir.path().join("out");
        let text = output(|out| dump(&config, &target, out));
        assert!(text.starts_with("wrote 1 tiles"));
    }

    #[test]
    fn test_sources_lists_presets() {
        let text = output(|out| sources(out));
        assert!(text.lines().any(|line| line.starts_with("OSM ")));
        assert_eq!(text.lines().count(), presets().len());
    }
}
