//! Index tables and published generations

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use haystack_types::{Handle, NavId, RemotePoint};

use crate::station::HistoryConfig;

/// Tag presence counts over every tagged entity of the station
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub points: usize,
    pub equips: usize,
    pub sites: usize,
}

/// All derived lookup tables of one rebuild
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Indexes {
    pub(crate) remote_to_point: HashMap<RemotePoint, Handle>,
    pub(crate) remote_to_config: HashMap<RemotePoint, Arc<HistoryConfig>>,
    pub(crate) sites: Vec<Handle>,
    pub(crate) equips: Vec<Handle>,
    pub(crate) implicit_equips: HashMap<Handle, Handle>,
    pub(crate) site_navs: HashMap<NavId, Handle>,
    pub(crate) equip_navs: HashMap<NavId, Handle>,
    pub(crate) site_equips: HashMap<Handle, Vec<Handle>>,
    pub(crate) equip_points: HashMap<Handle, Vec<Handle>>,
    pub(crate) nav_histories: BTreeMap<String, Vec<Arc<HistoryConfig>>>,
    pub(crate) counts: EntityCounts,
}

impl Indexes {
    /// Record `point` under `equip` (backward reference)
    pub(crate) fn add_equip_point(&mut self, equip: Handle, point: Handle) {
        self.equip_points.entry(equip).or_default().push(point);
    }

    /// Record `equip` under `site` (backward reference)
    pub(crate) fn add_site_equip(&mut self, site: Handle, equip: Handle) {
        self.site_equips.entry(site).or_default().push(equip);
    }

    pub(crate) fn add_nav_history(&mut self, station: &str, config: Arc<HistoryConfig>) {
        self.nav_histories
            .entry(station.to_string())
            .or_default()
            .push(config);
    }

    pub fn counts(&self) -> EntityCounts {
        self.counts
    }
}

/// Read-only view over the tables built so far, handed to policies that run
/// during a rebuild
pub struct IndexView<'a> {
    indexes: &'a Indexes,
    station_name: &'a str,
}

impl<'a> IndexView<'a> {
    pub fn new(indexes: &'a Indexes, station_name: &'a str) -> Self {
        Self {
            indexes,
            station_name,
        }
    }

    /// Name of the local station
    pub fn station_name(&self) -> &str {
        self.station_name
    }

    /// Local control point proxying `remote`
    pub fn control_point(&self, remote: &RemotePoint) -> Option<Handle> {
        self.indexes.remote_to_point.get(remote).copied()
    }

    /// Imported history collected from `remote`
    pub fn history_config(&self, remote: &RemotePoint) -> Option<&HistoryConfig> {
        self.indexes.remote_to_config.get(remote).map(Arc::as_ref)
    }

    /// Implicit equip inferred for a point
    pub fn implicit_equip(&self, point: Handle) -> Option<Handle> {
        self.indexes.implicit_equips.get(&point).copied()
    }
}

/// One published set of indexes with its rebuild metadata
#[derive(Debug)]
pub struct Generation {
    pub(crate) indexes: Indexes,
    pub(crate) rebuilt_at: DateTime<Utc>,
    pub(crate) rebuild_duration: Duration,
}

impl Generation {
    pub fn indexes(&self) -> &Indexes {
        &self.indexes
    }

    /// When the rebuild that produced this generation finished
    pub fn rebuilt_at(&self) -> DateTime<Utc> {
        self.rebuilt_at
    }

    /// How long that rebuild took
    pub fn rebuild_duration(&self) -> Duration {
        self.rebuild_duration
    }
}
