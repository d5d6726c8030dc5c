//! Station model and collaborator contracts
//!
//! The cache never owns station data. It reads the component tree, the
//! history database and the tag annotations through the traits defined here
//! and keeps only [`Handle`]s. [`StationSnapshot`] is an in-memory arena that
//! implements all of them.

mod loader;
mod snapshot;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use haystack_types::{Handle, HistoryId, Ref, Tags};

pub use loader::{load_toml, load_toml_file};
pub use snapshot::{NewComponent, StationSnapshot};

// ─────────────────────────────────────────────────────────────────────────────
// Components
// ─────────────────────────────────────────────────────────────────────────────

/// Proxy extension of a control point: how the point is connected to its
/// driver, and where the value originates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyExt {
    /// Driver type of the extension (e.g. `niagaraDriver:NiagaraProxyExt`)
    pub kind: String,
    /// Name of the station the proxied point lives on
    #[serde(default)]
    pub station_name: String,
    /// Id of the point on that station
    #[serde(default)]
    pub point_id: String,
}

/// Tag-capable component types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaggedKind {
    Site,
    Equip,
    Other,
}

/// What a component is, structurally
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentKind {
    /// Plain container
    Folder,
    /// Driver device
    Device,
    /// Control point, optionally proxied from a driver
    ControlPoint { proxy: Option<ProxyExt> },
    /// Tag-capable component (site, equip or other)
    Tagged(TaggedKind),
}

/// A node in the station's component tree
#[derive(Debug, Clone)]
pub struct Component {
    pub handle: Handle,
    pub parent: Option<Handle>,
    pub children: Vec<Handle>,
    pub name: String,
    pub display_name: String,
    pub slot_path: String,
    pub kind: ComponentKind,
    /// Tag annotation, if the component carries one
    pub tags: Option<Tags>,
}

impl Component {
    /// Tag dictionary of the component (empty when there is no annotation)
    pub fn tags(&self) -> &Tags {
        self.tags.as_ref().unwrap_or(Tags::empty())
    }

    pub fn is_control_point(&self) -> bool {
        matches!(self.kind, ComponentKind::ControlPoint { .. })
    }

    /// Proxy extension of a control point
    pub fn proxy(&self) -> Option<&ProxyExt> {
        match &self.kind {
            ComponentKind::ControlPoint { proxy } => proxy.as_ref(),
            _ => None,
        }
    }

    /// Kind of a tag-capable component
    pub fn tagged_kind(&self) -> Option<TaggedKind> {
        match self.kind {
            ComponentKind::Tagged(kind) => Some(kind),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Histories
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration of one history in the history database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub id: HistoryId,
    /// Id of the point the history was collected from on its device
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default = "default_record_type")]
    pub record_type: String,
    #[serde(default)]
    pub tags: Tags,
}

fn default_record_type() -> String {
    "numeric".to_string()
}

impl HistoryConfig {
    pub fn new(id: HistoryId) -> Self {
        Self {
            id,
            source: None,
            record_type: default_record_type(),
            tags: Tags::default(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_record_type(mut self, record_type: impl Into<String>) -> Self {
        self.record_type = record_type.into();
        self
    }

    pub fn device_name(&self) -> &str {
        &self.id.device_name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Failures raised by station collaborators
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StationError {
    #[error("Component not found: {0}")]
    ComponentNotFound(Handle),

    #[error("Root not found: {0}")]
    RootNotFound(String),

    #[error("History database error: {0}")]
    HistoryDb(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Collaborator Traits
// ─────────────────────────────────────────────────────────────────────────────

/// Access to the station's component tree
pub trait ComponentTree: Send + Sync {
    /// Name of the local station
    fn station_name(&self) -> &str;

    /// Resolve a slot path (`/`, `/Drivers/Net`) to a handle
    fn resolve_slot(&self, slot_path: &str) -> Option<Handle>;

    /// Fetch a component; fails if the handle is no longer in the tree
    fn component(&self, handle: Handle) -> Result<Arc<Component>, StationError>;
}

/// Resolution of ref tag values to components
pub trait ComponentLookup: Send + Sync {
    fn lookup(&self, reference: &Ref) -> Option<Handle>;
}

/// Enumeration of the history database
pub trait HistoryDatabase: Send + Sync {
    fn histories(&self) -> Result<Vec<Arc<HistoryConfig>>, StationError>;
}

/// Every tag dictionary the station exposes (components and histories)
pub trait TaggedEntities: Send + Sync {
    fn tagged_entities(&self) -> Result<Vec<Tags>, StationError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tree Walk
// ─────────────────────────────────────────────────────────────────────────────

/// Depth-first, pre-order iterator over the subtree rooted at a handle.
///
/// Children are visited in their declared order. A component that cannot be
/// fetched ends the walk with its error.
pub struct DepthFirst<'t> {
    tree: &'t dyn ComponentTree,
    stack: Vec<Handle>,
}

impl<'t> DepthFirst<'t> {
    pub fn new(tree: &'t dyn ComponentTree, root: Handle) -> Self {
        Self {
            tree,
            stack: vec![root],
        }
    }
}

impl Iterator for DepthFirst<'_> {
    type Item = Result<Arc<Component>, StationError>;

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.stack.pop()?;
        match self.tree.component(handle) {
            Ok(component) => {
                self.stack.extend(component.children.iter().rev().copied());
                Some(Ok(component))
            }
            Err(e) => {
                self.stack.clear();
                Some(Err(e))
            }
        }
    }
}
