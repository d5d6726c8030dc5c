//! The rebuild passes
//!
//! A [`Rebuild`] fills a fresh [`Indexes`] from the collaborators. Nothing is
//! shared with the published generation; if any pass fails the partial
//! tables are dropped with it.

use std::sync::Arc;

use tracing::debug;

use haystack_types::{Handle, NavId, names};

use super::Collaborators;
use super::generation::{EntityCounts, IndexView, Indexes};
use crate::config::CacheConfig;
use crate::format;
use crate::station::{Component, DepthFirst, HistoryConfig, StationError, TaggedKind};

pub(crate) struct Rebuild<'a> {
    collab: &'a Collaborators,
    config: &'a CacheConfig,
    station_name: String,
    indexes: Indexes,
}

impl<'a> Rebuild<'a> {
    pub(crate) fn new(collab: &'a Collaborators, config: &'a CacheConfig) -> Self {
        let station_name = config
            .station_name
            .clone()
            .unwrap_or_else(|| collab.tree.station_name().to_string());
        Self {
            collab,
            config,
            station_name,
            indexes: Indexes::default(),
        }
    }

    /// Run every pass in order and hand back the finished tables
    pub(crate) fn run(mut self) -> Result<Indexes, StationError> {
        self.component_pass()?;
        let histories = self.collab.histories.histories()?;
        self.history_first_pass(&histories);
        self.history_second_pass(&histories);
        self.count_pass()?;
        Ok(self.indexes)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Component tree
    // ─────────────────────────────────────────────────────────────────────

    fn component_pass(&mut self) -> Result<(), StationError> {
        let root_path = self.config.root_slot_path();
        let root = self
            .collab
            .tree
            .resolve_slot(root_path)
            .ok_or_else(|| StationError::RootNotFound(self.config.root.clone()))?;

        let tree = self.collab.tree.clone();
        for component in DepthFirst::new(tree.as_ref(), root) {
            let component = component?;
            self.index_component(&component)?;
        }
        Ok(())
    }

    fn index_component(&mut self, component: &Arc<Component>) -> Result<(), StationError> {
        if component.is_control_point() {
            return self.index_point(component);
        }

        match component.tagged_kind() {
            Some(TaggedKind::Site) => self.index_site(component),
            Some(TaggedKind::Equip) => self.index_equip(component),
            Some(TaggedKind::Other) => {}
            None => {
                if component.tags().has(names::EQUIP) {
                    self.index_equip(component);
                }
            }
        }
        Ok(())
    }

    fn index_point(&mut self, point: &Arc<Component>) -> Result<(), StationError> {
        if let Some(proxy) = point.proxy() {
            if proxy.kind == self.config.remote_proxy_kind {
                match self.collab.remote.from_control_point(point) {
                    Some(remote) => {
                        self.indexes.remote_to_point.insert(remote, point.handle);
                    }
                    None => debug!("No remote point for proxy {}", point.slot_path),
                }
            }
        }

        // an explicit equipRef always wins, even when it cannot be resolved
        if point.tags().has(names::EQUIP_REF) {
            match point.tags().require_ref(names::EQUIP_REF) {
                Ok(equip_ref) => match self.collab.lookup.lookup(equip_ref) {
                    Some(equip) => self.indexes.add_equip_point(equip, point.handle),
                    None => debug!("Unresolved equipRef {} on {}", equip_ref, point.slot_path),
                },
                Err(e) => debug!("Unusable equipRef on {}: {}", point.slot_path, e),
            }
            return Ok(());
        }

        if let Some(equip) = self.find_implicit_equip(point)? {
            self.indexes.add_equip_point(equip, point.handle);
            self.indexes.implicit_equips.insert(point.handle, equip);
        }
        Ok(())
    }

    /// Nearest ancestor tagged `equip`
    fn find_implicit_equip(&self, point: &Component) -> Result<Option<Handle>, StationError> {
        let mut parent = point.parent;
        while let Some(handle) = parent {
            let ancestor = self.collab.tree.component(handle)?;
            if ancestor.tags().has(names::EQUIP) {
                return Ok(Some(handle));
            }
            parent = ancestor.parent;
        }
        Ok(None)
    }

    fn index_site(&mut self, site: &Arc<Component>) {
        self.indexes.sites.push(site.handle);
        let nav = self.nav_name(site);
        self.indexes.site_navs.insert(NavId::site(nav), site.handle);
    }

    fn index_equip(&mut self, equip: &Arc<Component>) {
        self.indexes.equips.push(equip.handle);

        if equip.tags().missing(names::SITE_REF) {
            return;
        }
        let site_ref = match equip.tags().require_ref(names::SITE_REF) {
            Ok(site_ref) => site_ref,
            Err(e) => {
                debug!("Unusable siteRef on {}: {}", equip.slot_path, e);
                return;
            }
        };
        let site = self
            .collab
            .lookup
            .lookup(site_ref)
            .and_then(|h| self.collab.tree.component(h).ok());
        let Some(site) = site else {
            debug!("Unresolved siteRef {} on {}", site_ref, equip.slot_path);
            return;
        };

        self.indexes.add_site_equip(site.handle, equip.handle);
        let nav = NavId::equip(self.nav_name(&site), self.nav_name(equip));
        self.indexes.equip_navs.insert(nav, equip.handle);
    }

    fn nav_name(&self, component: &Component) -> String {
        format::nav_name(
            self.collab.formatter.as_ref(),
            self.collab.tree.as_ref(),
            component,
            &self.config.nav_name_format,
        )
    }

    // ─────────────────────────────────────────────────────────────────────
    // History database
    // ─────────────────────────────────────────────────────────────────────

    fn is_local(&self, config: &HistoryConfig) -> bool {
        config.device_name() == self.station_name
    }

    fn history_first_pass(&mut self, histories: &[Arc<HistoryConfig>]) {
        for config in histories {
            if self.is_local(config) {
                continue;
            }
            if let Some(remote) = self.collab.remote.from_history_config(config) {
                self.indexes.remote_to_config.insert(remote, config.clone());
            }
        }
    }

    fn history_second_pass(&mut self, histories: &[Arc<HistoryConfig>]) {
        let visible: Vec<Arc<HistoryConfig>> = {
            let view = IndexView::new(&self.indexes, &self.station_name);
            histories
                .iter()
                .filter(|h| !self.is_local(h))
                .filter(|h| self.collab.visibility.is_visible(h, &view))
                .cloned()
                .collect()
        };

        for config in visible {
            let device = config.device_name().to_string();
            self.indexes.add_nav_history(&device, config);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Counters
    // ─────────────────────────────────────────────────────────────────────

    fn count_pass(&mut self) -> Result<(), StationError> {
        let mut counts = EntityCounts::default();
        for tags in self.collab.entities.tagged_entities()? {
            if tags.has(names::POINT) {
                counts.points += 1;
            }
            if tags.has(names::EQUIP) {
                counts.equips += 1;
            }
            if tags.has(names::SITE) {
                counts.sites += 1;
            }
        }
        self.indexes.counts = counts;
        Ok(())
    }
}
