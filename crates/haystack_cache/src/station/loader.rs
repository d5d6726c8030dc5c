//! Station snapshot documents (TOML)
//!
//! ```toml
//! [station]
//! name = "Local"
//!
//! [[component]]
//! path = "/Sites/Plant1"
//! kind = "site"
//! tags = { geoCity = "Richmond" }
//!
//! [[component]]
//! path = "/Sites/Plant1/AHU1/SAT"
//! kind = "point"
//! tags = { equipRef = "@slot:/Sites/Plant1/AHU1", sensor = true }
//! proxy = { kind = "niagaraDriver:NiagaraProxyExt", station_name = "Remote1", point_id = "/Drivers/SAT" }
//!
//! [[history]]
//! device = "Remote1"
//! name = "SAT"
//! source = "/Drivers/SAT"
//! ```
//!
//! Missing intermediate path segments are created as folders. A component
//! may be declared after its descendants: the placeholder folder created for
//! its path is upgraded in place and keeps its children. Tag values:
//! `true` is a marker, `false` a bool, numbers are numbers, strings starting
//! with `@` are refs and all other strings are strings.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use haystack_types::{HistoryId, Ref, TagValue, Tags};

use super::{ComponentKind, HistoryConfig, NewComponent, ProxyExt, StationError, StationSnapshot, TaggedKind};
use crate::station::ComponentTree;

#[derive(Debug, Deserialize)]
struct SnapshotDoc {
    station: StationSection,
    #[serde(default, rename = "component")]
    components: Vec<ComponentEntry>,
    #[serde(default, rename = "history")]
    histories: Vec<HistoryEntry>,
}

#[derive(Debug, Deserialize)]
struct StationSection {
    name: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum EntryKind {
    Folder,
    Device,
    Point,
    Site,
    Equip,
    Tagged,
}

#[derive(Debug, Deserialize)]
struct ComponentEntry {
    path: String,
    kind: EntryKind,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    tags: Option<BTreeMap<String, RawTag>>,
    #[serde(default)]
    proxy: Option<ProxyExt>,
}

#[derive(Debug, Deserialize)]
struct HistoryEntry {
    device: String,
    name: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    record_type: Option<String>,
    #[serde(default)]
    tags: BTreeMap<String, RawTag>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawTag {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<RawTag> for TagValue {
    fn from(raw: RawTag) -> Self {
        match raw {
            RawTag::Bool(true) => TagValue::Marker,
            RawTag::Bool(false) => TagValue::Bool(false),
            RawTag::Int(i) => TagValue::from(i),
            RawTag::Float(f) => TagValue::from(f),
            RawTag::Str(s) if s.starts_with('@') => TagValue::Ref(Ref::new(s)),
            RawTag::Str(s) => TagValue::Str(s),
        }
    }
}

fn to_tags(raw: BTreeMap<String, RawTag>) -> Tags {
    raw.into_iter().collect()
}

/// Parse a snapshot document
pub fn load_toml(content: &str) -> Result<StationSnapshot, StationError> {
    let doc: SnapshotDoc =
        toml::from_str(content).map_err(|e| StationError::Snapshot(e.to_string()))?;

    let snapshot = StationSnapshot::new(doc.station.name);
    let mut placeholders = HashSet::new();

    for entry in doc.components {
        let (parent_path, name) = entry
            .path
            .rsplit_once('/')
            .filter(|(_, name)| !name.is_empty())
            .ok_or_else(|| StationError::Snapshot(format!("Invalid path: {}", entry.path)))?;
        let parent = ensure_folders(&snapshot, parent_path, &mut placeholders)?;

        let kind = match entry.kind {
            EntryKind::Folder => ComponentKind::Folder,
            EntryKind::Device => ComponentKind::Device,
            EntryKind::Point => ComponentKind::ControlPoint { proxy: entry.proxy },
            EntryKind::Site => ComponentKind::Tagged(TaggedKind::Site),
            EntryKind::Equip => ComponentKind::Tagged(TaggedKind::Equip),
            EntryKind::Tagged => ComponentKind::Tagged(TaggedKind::Other),
        };

        // auto-tagging, as the typed add_* helpers do
        let tags = entry.tags.map(to_tags);
        let tags = match entry.kind {
            EntryKind::Point => Some(tags.unwrap_or_default().with("point", TagValue::Marker)),
            EntryKind::Site => Some(tags.unwrap_or_default().with("site", TagValue::Marker)),
            EntryKind::Equip => Some(tags.unwrap_or_default().with("equip", TagValue::Marker)),
            _ => tags,
        };

        let mut new = NewComponent::new(name, kind);
        new.display_name = entry.display_name;
        new.tags = tags;
        match snapshot.resolve_slot(&entry.path) {
            Some(handle) if placeholders.remove(&entry.path) => snapshot.redefine(handle, new)?,
            _ => {
                snapshot.add(parent, new)?;
            }
        }
    }

    for entry in doc.histories {
        let mut config = HistoryConfig::new(HistoryId::new(entry.device, entry.name))
            .with_tags(to_tags(entry.tags));
        config.source = entry.source;
        if let Some(record_type) = entry.record_type {
            config = config.with_record_type(record_type);
        }
        snapshot.add_history(config);
    }

    Ok(snapshot)
}

/// Read and parse a snapshot document from disk
pub fn load_toml_file(path: impl AsRef<Path>) -> Result<StationSnapshot, StationError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| StationError::Snapshot(format!("{}: {}", path.display(), e)))?;
    load_toml(&content)
}

/// Resolve `path`, creating any missing folders along the way; created
/// paths are recorded in `created`
fn ensure_folders(
    snapshot: &StationSnapshot,
    path: &str,
    created: &mut HashSet<String>,
) -> Result<haystack_types::Handle, StationError> {
    let mut current = snapshot.root();
    let mut current_path = String::new();

    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current_path.push('/');
        current_path.push_str(segment);
        current = match snapshot.resolve_slot(&current_path) {
            Some(handle) => handle,
            None => {
                created.insert(current_path.clone());
                snapshot.add_folder(current, segment)?
            }
        };
    }

    Ok(current)
}
