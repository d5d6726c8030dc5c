//! Tag dictionaries
//!
//! An immutable name -> value mapping attached to a component or a history.
//! Classification only ever asks two questions of it: is a tag present, and
//! what value does it carry.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::value::{Ref, TagValue, ValueParseError};

/// Well-known tag names used by the navigation indexes
pub mod names {
    pub const POINT: &str = "point";
    pub const EQUIP: &str = "equip";
    pub const SITE: &str = "site";
    pub const EQUIP_REF: &str = "equipRef";
    pub const SITE_REF: &str = "siteRef";
    pub const NAV_NAME_FORMAT: &str = "navNameFormat";
    pub const HIDDEN: &str = "hidden";
    pub const ID: &str = "id";
    pub const DIS: &str = "dis";
}

static EMPTY: LazyLock<Tags> = LazyLock::new(Tags::default);

/// Immutable tag dictionary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags {
    entries: BTreeMap<String, TagValue>,
}

impl Tags {
    /// Shared empty dictionary, used for components without a tag annotation
    pub fn empty() -> &'static Tags {
        &EMPTY
    }

    /// Start building a dictionary
    pub fn builder() -> TagsBuilder {
        TagsBuilder::default()
    }

    /// Whether the tag is present (with any value)
    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Whether the tag is absent
    pub fn missing(&self, name: &str) -> bool {
        !self.has(name)
    }

    /// Get a tag's value
    pub fn get(&self, name: &str) -> Option<&TagValue> {
        self.entries.get(name)
    }

    /// Get a tag's value as a ref; `None` if absent or not a ref
    pub fn get_ref(&self, name: &str) -> Option<&Ref> {
        self.get(name).and_then(TagValue::as_reference)
    }

    /// Get a tag's value as a string; `None` if absent or not a string
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(TagValue::as_str)
    }

    /// Get a ref tag, distinguishing a missing tag from a mistyped one
    pub fn require_ref(&self, name: &str) -> Result<&Ref, ValueParseError> {
        match self.get(name) {
            Some(TagValue::Ref(r)) => Ok(r),
            Some(other) => Err(ValueParseError::TypeMismatch {
                tag: name.to_string(),
                expected: "ref",
                actual: other.type_name(),
            }),
            None => Err(ValueParseError::MissingTag(name.to_string())),
        }
    }

    /// Copy of this dictionary with one tag added or replaced
    pub fn with(&self, name: impl Into<String>, value: impl Into<TagValue>) -> Tags {
        let mut entries = self.entries.clone();
        entries.insert(name.into(), value.into());
        Tags { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate tags in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<TagValue>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<Tags> for serde_json::Value {
    fn from(tags: Tags) -> Self {
        let obj: serde_json::Map<String, serde_json::Value> = tags
            .entries
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::from(v)))
            .collect();
        serde_json::Value::Object(obj)
    }
}

/// Builder for [`Tags`]
#[derive(Debug, Default)]
pub struct TagsBuilder {
    entries: BTreeMap<String, TagValue>,
}

impl TagsBuilder {
    /// Add a marker tag
    pub fn marker(mut self, name: impl Into<String>) -> Self {
        self.entries.insert(name.into(), TagValue::Marker);
        self
    }

    /// Add a tag with a value
    pub fn add(mut self, name: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.entries.insert(name.into(), value.into());
        self
    }

    pub fn build(self) -> Tags {
        Tags {
            entries: self.entries,
        }
    }
}
