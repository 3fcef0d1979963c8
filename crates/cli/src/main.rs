//! tilecache command-line entry point.
//!
//! Manages the persistent tile cache: create it, inspect and sweep entries,
//! fetch tiles through it and dump its contents as image files.
//! Logging goes to stderr so command output on stdout stays pipeable.

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgGroup, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tilecache_core::config::AppConfig;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "tilecache", version, about = "Persistent cache for map tiles")]
struct Cli {
    /// Path of the tile cache, overriding configuration
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Create the tile cache if it does not exist
    #[arg(long, global = true)]
    create: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the tile cache at the configured path
    Init,
    /// List stored keys with their last update time
    List {
        /// Print a JSON array instead of one line per key
        #[arg(long)]
        json: bool,
    },
    /// Fetch one tile through the cache
    Fetch {
        /// Tile source preset, e.g. OSM
        source: String,
        x: u32,
        y: u32,
        zoom: u8,
        /// Write the tile to this file instead of printing its size
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Remove one stored key
    Remove { key: String },
    /// Remove entries last updated before a cutoff
    #[command(group(ArgGroup::new("cutoff").required(true).args(["older_than_days", "before"])))]
    Clean {
        /// Cutoff as a number of days before now
        #[arg(long)]
        older_than_days: Option<u32>,
        /// Cutoff as a timestamp, YYYY-MM-DDTHH:MM:SS
        #[arg(long)]
        before: Option<String>,
    },
    /// Keep only the most recently updated entries
    Prune { max_entries: usize },
    /// Write every stored tile to an empty directory
    Dump { dir: PathBuf },
    /// List the built-in tile sources
    Sources,
}

/// Log filter used when `RUST_LOG` is unset or unparsable.
const DEFAULT_LOG_FILTER: &str = "info";

fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn init_logging(json: bool) {
    let filter = log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok());
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Configuration from file and environment, with command-line overrides.
fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load()?;
    if let Some(db) = &cli.db {
        config.db_path.clone_from(db);
    }
    if cli.create {
        config.create = true;
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let config = load_config(&cli)?;
    tracing::debug!(db = %config.db_path.display(), "loaded configuration");

    let mut out = std::io::stdout().lock();
    match cli.command {
        Command::Init => commands::init(&config, &mut out),
        Command::List { json } => commands::list(&config, json, &mut out),
        Command::Fetch { source, x, y, zoom, out: file } => {
            commands::fetch(&config, &source, (x, y, zoom), file.as_deref(), &mut out)
        }
        Command::Remove { key } => commands::remove(&config, &key, &mut out),
        Command::Clean { older_than_days, before } => {
            let cutoff = commands::cutoff(older_than_days, before.as_deref())?;
            commands::clean(&config, cutoff, &mut out)
        }
        Command::Prune { max_entries } => commands::prune(&config, max_entries, &mut out),
        Command::Dump { dir } => commands::dump(&config, &dir, &mut out),
        Command::Sources => commands::sources(&mut out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::try_parse_from(["tilecache", "--db", "/tmp/t.db", "fetch", "OSM", "1", "2", "3"]).unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/t.db")));
        match cli.command {
            Command::Fetch { source, x, y, zoom, out } => {
                assert_eq!(source, "OSM");
                assert_eq!((x, y, zoom), (1, 2, 3));
                assert!(out.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tilecache", "list", "--json", "--create"]).unwrap();
        assert!(cli.create);
        assert!(matches!(cli.command, Command::List { json: true }));
    }

    #[test]
    fn test_clean_requires_one_cutoff() {
        assert!(Cli::try_parse_from(["tilecache", "clean"]).is_err());
        assert!(
            Cli::try_parse_from(["tilecache", "clean", "--older-than-days", "3", "--before", "2020-01-01T00:00:00"])
                .is_err()
        );
        let cli = Cli::try_parse_from(["tilecache", "clean", "--older-than-days", "3"]).unwrap();
        assert!(matches!(cli.command, Command::Clean { older_than_days: Some(3), before: None }));
    }

    #[test]
    fn test_log_filter_defaults_to_info() {
        assert_eq!(log_filter(None).to_string(), "info");
        assert_eq!(log_filter(Some("tilecache_core=debug".into())).to_string(), "tilecache_core=debug");
    }

    #[test]
    fn test_zoom_must_fit_u8() {
        assert!(Cli::try_parse_from(["tilecache", "fetch", "OSM", "0", "0", "300"]).is_err());
    }
}
