//! JSON rows for query output

use serde::Serialize;
use tracing::debug;
use wildmatch::WildMatch;

use haystack_cache::station::{ComponentTree, HistoryConfig};
use haystack_types::{Handle, Ref};

#[derive(Debug, Clone, Serialize)]
pub struct ComponentRow {
    pub id: String,
    /// Haystack ref with display text (`@h:1 "Plant 1"`)
    #[serde(rename = "ref")]
    pub reference: String,
    pub path: String,
    pub dis: String,
    pub tags: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryRow {
    pub id: String,
    pub source: Option<String>,
    pub kind: String,
    pub tags: serde_json::Value,
}

/// Describe components by handle, skipping ones no longer in the tree
pub fn components(tree: &dyn ComponentTree, handles: &[Handle]) -> Vec<ComponentRow> {
    handles
        .iter()
        .filter_map(|&handle| match tree.component(handle) {
            Ok(c) => Some(ComponentRow {
                id: handle.to_string(),
                reference: Ref::from_handle(handle)
                    .with_dis(c.display_name.clone())
                    .to_string(),
                path: c.slot_path.clone(),
                dis: c.display_name.clone(),
                tags: c.tags().clone().into(),
            }),
            Err(e) => {
                debug!("Skipping {}: {}", handle, e);
                None
            }
        })
        .collect()
}

/// Describe histories, keeping those whose name matches `pattern` (all when unset)
pub fn histories<'a>(
    configs: impl IntoIterator<Item = &'a HistoryConfig>,
    pattern: Option<&str>,
) -> Vec<HistoryRow> {
    let matcher = pattern.map(WildMatch::new);
    configs
        .into_iter()
        .filter(|h| {
            matcher
                .as_ref()
                .is_none_or(|m| m.matches(&h.id.history_name))
        })
        .map(|h| HistoryRow {
            id: h.id.to_string(),
            source: h.source.clone(),
            kind: h.record_type.clone(),
            tags: h.tags.clone().into(),
        })
        .collect()
}
