//! Index cache over a tagged station
//!
//! Builds navigation tables (sites, equips, points and histories) from a
//! station's component tree and history database, so that lookups by
//! navigation id or remote point do not have to walk the tree.
//!
//! ```ignore
//! let station = Arc::new(station::load_toml_file("station.toml")?);
//! let cache = Cache::new(CacheConfig::default(), Collaborators::for_snapshot(station));
//! cache.rebuild()?;
//! let equips = cache.nav_site_equips(&NavId::site("Plant1"))?;
//! ```

pub mod cache;
pub mod config;
pub mod format;
pub mod remote;
pub mod station;
pub mod visibility;

pub use cache::{
    Cache, CacheError, CacheStats, Collaborators, EntityCounts, Generation, IndexView, Indexes,
};
pub use config::CacheConfig;
