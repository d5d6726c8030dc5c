//! nhaystack
//!
//! Loads a station snapshot, builds the index cache and answers navigation
//! queries as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use haystack_cache::station::{self, ComponentTree};
use haystack_cache::{Cache, Collaborators};
use haystack_types::NavId;

use nhaystack::report;
use nhaystack::settings::{DEFAULT_SETTINGS_FILE, Settings};

/// Haystack navigation over a station snapshot
#[derive(Parser, Debug)]
#[command(name = "nhaystack")]
#[command(about = "Haystack navigation index over a station snapshot", long_about = None)]
struct Args {
    /// Settings file
    #[arg(short, long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,

    /// Station snapshot document (overrides settings)
    #[arg(short, long)]
    snapshot: Option<PathBuf>,

    /// Local station name (overrides the snapshot's)
    #[arg(long)]
    station_name: Option<String>,

    /// Slot ord the tree walk starts from
    #[arg(long)]
    root: Option<String>,

    /// Rebuild timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Counters and table sizes
    Stats,
    /// All sites
    Sites,
    /// Equips of a site (`sep:/Site`)
    Equips { nav: NavId },
    /// Points of an equip (`sep:/Site/Equip`)
    Points { nav: NavId },
    /// One point of an equip by nav name
    Point { nav: NavId, name: String },
    /// Stations with nav histories, or the histories of one station
    Histories {
        station: Option<String>,
        /// Wildcard filter on history names (`*`, `?`)
        #[arg(short, long)]
        pattern: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut settings = Settings::load(&args.config)
        .with_context(|| format!("loading settings from {}", args.config.display()))?;
    apply_overrides(&mut settings, &args);

    info!("Loading station snapshot from {}", settings.snapshot.display());
    let station = Arc::new(
        station::load_toml_file(&settings.snapshot)
            .with_context(|| format!("loading snapshot {}", settings.snapshot.display()))?,
    );

    let cache = Arc::new(Cache::new(
        settings.cache.clone(),
        Collaborators::for_snapshot(station.clone()),
    ));
    nhaystack::rebuild_with_timeout(cache.clone(), settings.rebuild_timeout()).await?;

    run_command(&args.command, &cache, station.as_ref())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("nhaystack=info,haystack_cache=info"));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries query results
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn apply_overrides(settings: &mut Settings, args: &Args) {
    if let Some(snapshot) = &args.snapshot {
        settings.snapshot = snapshot.clone();
    }
    if let Some(name) = &args.station_name {
        settings.cache.station_name = Some(name.clone());
    }
    if let Some(root) = &args.root {
        settings.cache.root = root.clone();
    }
    if let Some(secs) = args.timeout {
        settings.rebuild_timeout_secs = secs.max(1);
    }
}

fn run_command(command: &Command, cache: &Cache, tree: &dyn ComponentTree) -> Result<()> {
    match command {
        Command::Stats => print(&cache.stats()?),
        Command::Sites => print(&report::components(tree, &cache.all_sites()?)),
        Command::Equips { nav } => print(&report::components(tree, &cache.nav_site_equips(nav)?)),
        Command::Points { nav } => print(&report::components(tree, &cache.nav_equip_points(nav)?)),
        Command::Point { nav, name } => {
            let found: Vec<_> = cache.nav_point(nav, name)?.into_iter().collect();
            print(&report::components(tree, &found))
        }
        Command::Histories { station: None, .. } => print(&cache.nav_history_station_names()?),
        Command::Histories {
            station: Some(station),
            pattern,
        } => {
            let configs = cache.nav_histories(station)?;
            print(&report::histories(
                configs.iter().map(|c| &**c),
                pattern.as_deref(),
            ))
        }
    }
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
