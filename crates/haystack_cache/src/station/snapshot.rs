//! In-memory station snapshot
//!
//! An arena of components addressed by [`Handle`] plus a history list. The
//! snapshot can be mutated between rebuilds (components added, retagged or
//! removed), which is how tests model a live station.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use haystack_types::{Handle, HistoryId, Ref, TagValue, Tags, names};

use super::{
    Component, ComponentKind, ComponentLookup, ComponentTree, HistoryConfig, HistoryDatabase,
    ProxyExt, StationError, TaggedEntities, TaggedKind,
};

/// Description of a component to insert
#[derive(Debug, Clone)]
pub struct NewComponent {
    pub name: String,
    pub display_name: Option<String>,
    pub kind: ComponentKind,
    pub tags: Option<Tags>,
}

impl NewComponent {
    pub fn new(name: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            kind,
            tags: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = Some(tags);
        self
    }
}

#[derive(Debug, Default)]
struct Arena {
    components: BTreeMap<Handle, Arc<Component>>,
    paths: HashMap<String, Handle>,
    /// `id` tag ref -> component
    ids: HashMap<String, Handle>,
    histories: Vec<Arc<HistoryConfig>>,
    next_handle: u64,
}

impl Arena {
    fn get(&self, handle: Handle) -> Result<&Arc<Component>, StationError> {
        self.components
            .get(&handle)
            .ok_or(StationError::ComponentNotFound(handle))
    }

    fn child_path(parent_path: &str, name: &str) -> String {
        if parent_path == "/" {
            format!("/{}", name)
        } else {
            format!("{}/{}", parent_path, name)
        }
    }

    fn id_of(tags: Option<&Tags>) -> Option<String> {
        tags?.get_ref(names::ID).map(|id| id.id.clone())
    }

    fn index_id(&mut self, handle: Handle, tags: Option<&Tags>) {
        if let Some(id) = Self::id_of(tags) {
            if let Some(previous) = self.ids.insert(id.clone(), handle) {
                if previous != handle {
                    debug!("id {} moved from {} to {}", id, previous, handle);
                }
            }
        }
    }

    fn unindex_id(&mut self, handle: Handle, tags: Option<&Tags>) {
        if let Some(id) = Self::id_of(tags) {
            if self.ids.get(&id) == Some(&handle) {
                self.ids.remove(&id);
            }
        }
    }

    fn subtree(&self, handle: Handle) -> Vec<Handle> {
        let mut out = Vec::new();
        let mut stack = vec![handle];
        while let Some(h) = stack.pop() {
            if let Some(component) = self.components.get(&h) {
                stack.extend(component.children.iter().copied());
                out.push(h);
            }
        }
        out
    }
}

/// In-memory station: component tree, tag annotations and history database
#[derive(Debug)]
pub struct StationSnapshot {
    station_name: String,
    arena: RwLock<Arena>,
}

impl StationSnapshot {
    /// Handle of the root component (slot path `/`)
    pub const ROOT: Handle = Handle(0);

    /// Create an empty station containing only the root component
    pub fn new(station_name: impl Into<String>) -> Self {
        let station_name = station_name.into();
        let root = Component {
            handle: Self::ROOT,
            parent: None,
            children: Vec::new(),
            name: String::new(),
            display_name: station_name.clone(),
            slot_path: "/".to_string(),
            kind: ComponentKind::Folder,
            tags: None,
        };

        let mut arena = Arena {
            next_handle: 1,
            ..Default::default()
        };
        arena.paths.insert("/".to_string(), Self::ROOT);
        arena.components.insert(Self::ROOT, Arc::new(root));

        Self {
            station_name,
            arena: RwLock::new(arena),
        }
    }

    pub fn root(&self) -> Handle {
        Self::ROOT
    }

    /// Insert a component under `parent`
    pub fn add(&self, parent: Handle, new: NewComponent) -> Result<Handle, StationError> {
        let mut arena = self.arena.write();

        let parent_path = arena.get(parent)?.slot_path.clone();
        let slot_path = Arena::child_path(&parent_path, &new.name);
        if new.name.is_empty() || new.name.contains('/') {
            return Err(StationError::Snapshot(format!(
                "Invalid component name '{}' under {}",
                new.name, parent_path
            )));
        }
        if arena.paths.contains_key(&slot_path) {
            return Err(StationError::Snapshot(format!(
                "Duplicate slot path: {}",
                slot_path
            )));
        }

        let handle = Handle(arena.next_handle);
        arena.next_handle += 1;

        let component = Component {
            handle,
            parent: Some(parent),
            children: Vec::new(),
            display_name: new.display_name.unwrap_or_else(|| new.name.clone()),
            name: new.name,
            slot_path: slot_path.clone(),
            kind: new.kind,
            tags: new.tags,
        };

        if let Some(parent) = arena.components.get_mut(&parent) {
            Arc::make_mut(parent).children.push(handle);
        }
        arena.paths.insert(slot_path, handle);
        arena.index_id(handle, component.tags.as_ref());
        arena.components.insert(handle, Arc::new(component));

        Ok(handle)
    }

    pub fn add_folder(&self, parent: Handle, name: &str) -> Result<Handle, StationError> {
        self.add(parent, NewComponent::new(name, ComponentKind::Folder))
    }

    pub fn add_device(&self, parent: Handle, name: &str) -> Result<Handle, StationError> {
        self.add(parent, NewComponent::new(name, ComponentKind::Device))
    }

    /// Insert a site; the `site` marker is added to its tags
    pub fn add_site(&self, parent: Handle, name: &str, tags: Tags) -> Result<Handle, StationError> {
        self.add(
            parent,
            NewComponent::new(name, ComponentKind::Tagged(TaggedKind::Site))
                .with_tags(tags.with(names::SITE, TagValue::Marker)),
        )
    }

    /// Insert an equip; the `equip` marker is added to its tags
    pub fn add_equip(&self, parent: Handle, name: &str, tags: Tags) -> Result<Handle, StationError> {
        self.add(
            parent,
            NewComponent::new(name, ComponentKind::Tagged(TaggedKind::Equip))
                .with_tags(tags.with(names::EQUIP, TagValue::Marker)),
        )
    }

    /// Insert a control point; the `point` marker is added to its tags
    pub fn add_point(
        &self,
        parent: Handle,
        name: &str,
        tags: Tags,
        proxy: Option<ProxyExt>,
    ) -> Result<Handle, StationError> {
        self.add(
            parent,
            NewComponent::new(name, ComponentKind::ControlPoint { proxy })
                .with_tags(tags.with(names::POINT, TagValue::Marker)),
        )
    }

    /// Replace (or clear) a component's tag annotation
    pub fn set_tags(&self, handle: Handle, tags: Option<Tags>) -> Result<(), StationError> {
        let mut arena = self.arena.write();
        let old = arena.get(handle)?.tags.clone();
        arena.unindex_id(handle, old.as_ref());
        arena.index_id(handle, tags.as_ref());
        if let Some(component) = arena.components.get_mut(&handle) {
            Arc::make_mut(component).tags = tags;
        }
        Ok(())
    }

    /// Replace a component's kind, display name and tags in place, keeping
    /// its handle, slot path and children
    pub fn redefine(&self, handle: Handle, new: NewComponent) -> Result<(), StationError> {
        let mut arena = self.arena.write();
        let current = arena.get(handle)?;
        if current.name != new.name {
            return Err(StationError::Snapshot(format!(
                "Cannot rename {} to '{}'",
                current.slot_path, new.name
            )));
        }
        let old = current.tags.clone();

        arena.unindex_id(handle, old.as_ref());
        arena.index_id(handle, new.tags.as_ref());
        if let Some(component) = arena.components.get_mut(&handle) {
            let component = Arc::make_mut(component);
            component.display_name = new.display_name.unwrap_or_else(|| new.name.clone());
            component.kind = new.kind;
            component.tags = new.tags;
        }
        Ok(())
    }

    /// Remove a component and its whole subtree; returns the number removed
    pub fn remove(&self, handle: Handle) -> Result<usize, StationError> {
        if handle == Self::ROOT {
            return Err(StationError::Snapshot("Cannot remove the root".to_string()));
        }

        let mut arena = self.arena.write();
        let parent = arena.get(handle)?.parent;

        let doomed = arena.subtree(handle);
        for h in &doomed {
            if let Some(component) = arena.components.remove(h) {
                arena.paths.remove(&component.slot_path);
                arena.unindex_id(*h, component.tags.as_ref());
            }
        }
        if let Some(parent) = parent.and_then(|p| arena.components.get_mut(&p)) {
            Arc::make_mut(parent).children.retain(|c| *c != handle);
        }

        debug!("Removed {} components under {}", doomed.len(), handle);
        Ok(doomed.len())
    }

    pub fn add_history(&self, config: HistoryConfig) -> Arc<HistoryConfig> {
        let config = Arc::new(config);
        self.arena.write().histories.push(config.clone());
        config
    }

    /// Remove a history by id; returns whether it existed
    pub fn remove_history(&self, id: &HistoryId) -> bool {
        let mut arena = self.arena.write();
        let before = arena.histories.len();
        arena.histories.retain(|h| &h.id != id);
        arena.histories.len() != before
    }

    /// Number of components, including the root
    pub fn len(&self) -> usize {
        self.arena.read().components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn history_count(&self) -> usize {
        self.arena.read().histories.len()
    }
}

impl ComponentTree for StationSnapshot {
    fn station_name(&self) -> &str {
        &self.station_name
    }

    fn resolve_slot(&self, slot_path: &str) -> Option<Handle> {
        self.arena.read().paths.get(slot_path).copied()
    }

    fn component(&self, handle: Handle) -> Result<Arc<Component>, StationError> {
        self.arena.read().get(handle).cloned()
    }
}

impl ComponentLookup for StationSnapshot {
    fn lookup(&self, reference: &Ref) -> Option<Handle> {
        let arena = self.arena.read();

        if let Some(handle) = reference.handle() {
            return arena.components.contains_key(&handle).then_some(handle);
        }
        if let Some(path) = reference.slot_path() {
            return arena.paths.get(path).copied();
        }

        arena.ids.get(&reference.id).copied()
    }
}

impl HistoryDatabase for StationSnapshot {
    fn histories(&self) -> Result<Vec<Arc<HistoryConfig>>, StationError> {
        Ok(self.arena.read().histories.clone())
    }
}

impl TaggedEntities for StationSnapshot {
    fn tagged_entities(&self) -> Result<Vec<Tags>, StationError> {
        let arena = self.arena.read();
        let components = arena.components.values().filter_map(|c| c.tags.clone());
        let histories = arena
            .histories
            .iter()
            .filter(|h| !h.tags.is_empty())
            .map(|h| h.tags.clone());
        Ok(components.chain(histories).collect())
    }
}
