//! The index cache
//!
//! [`Cache`] derives lookup tables from a station's component tree and
//! history database, and answers navigation queries from them. Tables are
//! rebuilt as a whole and published atomically: readers always see exactly
//! one [`Generation`].

mod generation;
mod rebuild;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, error, info};

use haystack_types::{Handle, NavId, RemotePoint};

pub use generation::{EntityCounts, Generation, IndexView, Indexes};

use crate::config::CacheConfig;
use crate::format::{self, NavNameFormatter, SlotFormat};
use crate::remote::{NiagaraRemote, RemotePointDeriver};
use crate::station::{
    ComponentLookup, ComponentTree, HistoryConfig, HistoryDatabase, StationError,
    StationSnapshot, TaggedEntities,
};
use crate::visibility::{HistoryVisibility, ProxyAwareVisibility};
use rebuild::Rebuild;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CacheError {
    #[error("Cache has not been built yet")]
    Uninitialized,

    #[error("No nav histories for station: {0}")]
    NoNavHistories(String),

    #[error("Rebuild failed: {0}")]
    Rebuild(#[from] StationError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Collaborators
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the cache reads from during a rebuild
#[derive(Clone)]
pub struct Collaborators {
    pub tree: Arc<dyn ComponentTree>,
    pub lookup: Arc<dyn ComponentLookup>,
    pub histories: Arc<dyn HistoryDatabase>,
    pub entities: Arc<dyn TaggedEntities>,
    pub visibility: Arc<dyn HistoryVisibility>,
    pub remote: Arc<dyn RemotePointDeriver>,
    pub formatter: Arc<dyn NavNameFormatter>,
}

impl Collaborators {
    /// Wire a snapshot with the default policies
    pub fn for_snapshot(station: Arc<StationSnapshot>) -> Self {
        let remote: Arc<dyn RemotePointDeriver> = Arc::new(NiagaraRemote);
        Self {
            tree: station.clone(),
            lookup: station.clone(),
            histories: station.clone(),
            entities: station,
            visibility: Arc::new(ProxyAwareVisibility::new(remote.clone())),
            remote,
            formatter: Arc::new(SlotFormat),
        }
    }

    pub fn with_histories(mut self, histories: Arc<dyn HistoryDatabase>) -> Self {
        self.histories = histories;
        self
    }

    pub fn with_visibility(mut self, visibility: Arc<dyn HistoryVisibility>) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemotePointDeriver>) -> Self {
        self.remote = remote;
        self
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn NavNameFormatter>) -> Self {
        self.formatter = formatter;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stats
// ─────────────────────────────────────────────────────────────────────────────

/// Counters and table sizes of the current generation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub num_points: usize,
    pub num_equips: usize,
    pub num_sites: usize,
    pub sites: usize,
    pub equips: usize,
    pub site_navs: usize,
    pub equip_navs: usize,
    pub implicit_equips: usize,
    pub remote_points: usize,
    pub remote_histories: usize,
    pub nav_history_stations: usize,
    pub nav_histories: usize,
    pub last_rebuild_time: DateTime<Utc>,
    pub last_rebuild_duration_ms: u128,
}

impl CacheStats {
    fn of(generation: &Generation) -> Self {
        let idx = &generation.indexes;
        Self {
            num_points: idx.counts.points,
            num_equips: idx.counts.equips,
            num_sites: idx.counts.sites,
            sites: idx.sites.len(),
            equips: idx.equips.len(),
            site_navs: idx.site_navs.len(),
            equip_navs: idx.equip_navs.len(),
            implicit_equips: idx.implicit_equips.len(),
            remote_points: idx.remote_to_point.len(),
            remote_histories: idx.remote_to_config.len(),
            nav_history_stations: idx.nav_histories.len(),
            nav_histories: idx.nav_histories.values().map(Vec::len).sum(),
            last_rebuild_time: generation.rebuilt_at,
            last_rebuild_duration_ms: generation.rebuild_duration.as_millis(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache
// ─────────────────────────────────────────────────────────────────────────────

pub struct Cache {
    config: CacheConfig,
    collab: Collaborators,
    current: RwLock<Option<Arc<Generation>>>,
    rebuild_lock: Mutex<()>,
}

impl Cache {
    /// Create an empty cache. Nothing is indexed until [`Cache::rebuild`].
    pub fn new(config: CacheConfig, collab: Collaborators) -> Self {
        Self {
            config,
            collab,
            current: RwLock::new(None),
            rebuild_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Rebuild every table and publish the result.
    ///
    /// Concurrent rebuilds run one after the other. On failure the previous
    /// generation (if any) stays in place.
    pub fn rebuild(&self) -> Result<Arc<Generation>, CacheError> {
        let _guard = self.rebuild_lock.lock();

        info!("Begin cache rebuild from {}", self.config.root);
        let started = Instant::now();

        let indexes = Rebuild::new(&self.collab, &self.config)
            .run()
            .inspect_err(|e| error!("Cache rebuild failed: {}", e))?;

        let generation = Arc::new(Generation {
            indexes,
            rebuilt_at: Utc::now(),
            rebuild_duration: started.elapsed(),
        });
        *self.current.write() = Some(generation.clone());

        let idx = generation.indexes();
        info!(
            "End cache rebuild in {:?}: {} sites, {} equips, {} nav history stations",
            generation.rebuild_duration,
            idx.sites.len(),
            idx.equips.len(),
            idx.nav_histories.len()
        );
        Ok(generation)
    }

    pub fn is_initialized(&self) -> bool {
        self.current.read().is_some()
    }

    /// The published generation
    pub fn generation(&self) -> Result<Arc<Generation>, CacheError> {
        self.current.read().clone().ok_or(CacheError::Uninitialized)
    }

    /// Imported history collected from `remote`
    pub fn history_config(&self, remote: &RemotePoint) -> Result<Option<Arc<HistoryConfig>>, CacheError> {
        Ok(self.generation()?.indexes.remote_to_config.get(remote).cloned())
    }

    /// Local proxy point of `remote`
    pub fn control_point(&self, remote: &RemotePoint) -> Result<Option<Handle>, CacheError> {
        Ok(self.generation()?.indexes.remote_to_point.get(remote).copied())
    }

    pub fn all_sites(&self) -> Result<Vec<Handle>, CacheError> {
        Ok(self.generation()?.indexes.sites.clone())
    }

    pub fn all_equips(&self) -> Result<Vec<Handle>, CacheError> {
        Ok(self.generation()?.indexes.equips.clone())
    }

    /// Equip inferred from the ancestors of a point without `equipRef`
    pub fn implicit_equip(&self, point: Handle) -> Result<Option<Handle>, CacheError> {
        Ok(self.generation()?.indexes.implicit_equips.get(&point).copied())
    }

    pub fn nav_site(&self, nav: &NavId) -> Result<Option<Handle>, CacheError> {
        Ok(self.generation()?.indexes.site_navs.get(nav).copied())
    }

    pub fn nav_equip(&self, nav: &NavId) -> Result<Option<Handle>, CacheError> {
        Ok(self.generation()?.indexes.equip_navs.get(nav).copied())
    }

    /// Equips of a site, in tree order
    pub fn nav_site_equips(&self, nav: &NavId) -> Result<Vec<Handle>, CacheError> {
        let generation = self.generation()?;
        let idx = &generation.indexes;
        Ok(idx
            .site_navs
            .get(nav)
            .and_then(|site| idx.site_equips.get(site))
            .cloned()
            .unwrap_or_default())
    }

    /// Points of an equip, in tree order
    pub fn nav_equip_points(&self, nav: &NavId) -> Result<Vec<Handle>, CacheError> {
        let generation = self.generation()?;
        let idx = &generation.indexes;
        Ok(idx
            .equip_navs
            .get(nav)
            .and_then(|equip| idx.equip_points.get(equip))
            .cloned()
            .unwrap_or_default())
    }

    /// Point of an equip by nav name.
    ///
    /// Nav names of points are not indexed; this evaluates the name of every
    /// point of the equip until one matches.
    pub fn nav_point(&self, equip_nav: &NavId, point_nav_name: &str) -> Result<Option<Handle>, CacheError> {
        let tree = self.collab.tree.as_ref();
        for handle in self.nav_equip_points(equip_nav)? {
            let point = match tree.component(handle) {
                Ok(point) => point,
                Err(e) => {
                    debug!("Skipping point {}: {}", handle, e);
                    continue;
                }
            };
            let name = format::nav_name(
                self.collab.formatter.as_ref(),
                tree,
                &point,
                &self.config.nav_name_format,
            );
            if name == point_nav_name {
                return Ok(Some(handle));
            }
        }
        Ok(None)
    }

    /// Stations that have nav-indexed histories, sorted
    pub fn nav_history_station_names(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.generation()?.indexes.nav_histories.keys().cloned().collect())
    }

    /// Nav-indexed histories of a station, in history database order
    pub fn nav_histories(&self, station: &str) -> Result<Vec<Arc<HistoryConfig>>, CacheError> {
        self.generation()?
            .indexes
            .nav_histories
            .get(station)
            .cloned()
            .ok_or_else(|| CacheError::NoNavHistories(station.to_string()))
    }

    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let generation = self.generation()?;
        Ok(CacheStats::of(&generation))
    }

    /// Time since the current generation was published
    pub fn age(&self) -> Result<Duration, CacheError> {
        let generation = self.generation()?;
        Ok((Utc::now() - generation.rebuilt_at)
            .to_std()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haystack_types::{HistoryId, Tags};

    fn cache() -> (Arc<StationSnapshot>, Cache) {
        let st = Arc::new(StationSnapshot::new("Local"));
        let cache = Cache::new(CacheConfig::default(), Collaborators::for_snapshot(st.clone()));
        (st, cache)
    }

    #[test]
    fn test_queries_fail_before_first_rebuild() {
        let (_st, cache) = cache();
        assert!(!cache.is_initialized());
        assert_eq!(cache.all_sites(), Err(CacheError::Uninitialized));
        assert_eq!(cache.nav_site(&NavId::site("x")), Err(CacheError::Uninitialized));
        assert_eq!(cache.nav_history_station_names(), Err(CacheError::Uninitialized));
        assert_eq!(cache.nav_histories("Remote1").unwrap_err(), CacheError::Uninitialized);
        assert_eq!(cache.stats().unwrap_err(), CacheError::Uninitialized);
        assert_eq!(
            cache.nav_point(&NavId::equip("a", "b"), "p"),
            Err(CacheError::Uninitialized)
        );
    }

    #[test]
    fn test_empty_station_rebuilds() {
        let (_st, cache) = cache();
        cache.rebuild().unwrap();
        assert!(cache.is_initialized());
        assert!(cache.all_sites().unwrap().is_empty());
        assert!(cache.nav_history_station_names().unwrap().is_empty());
        assert_eq!(cache.stats().unwrap().num_points, 0);
    }

    #[test]
    fn test_unknown_nav_ids_are_empty() {
        let (st, cache) = cache();
        st.add_site(st.root(), "Plant1", Tags::default()).unwrap();
        cache.rebuild().unwrap();

        assert!(cache.nav_site_equips(&NavId::site("Nope")).unwrap().is_empty());
        assert!(cache.nav_site_equips(&NavId::site("Plant1")).unwrap().is_empty());
        assert!(cache.nav_equip_points(&NavId::equip("Plant1", "AHU9")).unwrap().is_empty());
        assert_eq!(cache.nav_point(&NavId::equip("Plant1", "AHU9"), "SAT").unwrap(), None);
    }

    #[test]
    fn test_stats_totals() {
        let (st, cache) = cache();
        st.add_history(HistoryConfig::new(HistoryId::new("Remote1", "a")));
        st.add_history(HistoryConfig::new(HistoryId::new("Remote1", "b")));
        st.add_history(HistoryConfig::new(HistoryId::new("Remote2", "c")));
        cache.rebuild().unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.nav_history_stations, 2);
        assert_eq!(stats.nav_histories, 3);
        assert!(cache.age().unwrap() < Duration::from_secs(60));
    }
}
