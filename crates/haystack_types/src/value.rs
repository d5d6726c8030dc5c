//! Typed tag values
//!
//! Every tag on a component carries one of these values. Presence of a tag
//! (usually a marker) drives classification; refs link components together.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Handle Types
// ─────────────────────────────────────────────────────────────────────────────

/// Stable identity of a component within a station's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Handle(pub u64);

impl Handle {
    /// Prefix used when a handle is encoded in a ref or slot ord
    pub const PREFIX: &'static str = "h:";
}

impl From<u64> for Handle {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:x}", Self::PREFIX, self.0)
    }
}

impl FromStr for Handle {
    type Err = ValueParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix(Self::PREFIX)
            .ok_or_else(|| ValueParseError::Handle(s.to_string()))?;
        u64::from_str_radix(hex, 16)
            .map(Handle)
            .map_err(|_| ValueParseError::Handle(s.to_string()))
    }
}

/// Haystack reference value (`@id`)
///
/// The id is opaque here; resolving it to a component is the job of the
/// component lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ref {
    /// Identifier without the leading `@`
    pub id: String,
    /// Optional display text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dis: Option<String>,
}

impl Ref {
    /// Create a ref from an id (a leading `@` is stripped)
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let id = match id.strip_prefix('@') {
            Some(stripped) => stripped.to_string(),
            None => id,
        };
        Self { id, dis: None }
    }

    /// Create a ref that points at a component handle
    pub fn from_handle(handle: Handle) -> Self {
        Self::new(handle.to_string())
    }

    /// Attach display text
    pub fn with_dis(mut self, dis: impl Into<String>) -> Self {
        self.dis = Some(dis.into());
        self
    }

    /// The handle this ref encodes, if it is a handle ref
    pub fn handle(&self) -> Option<Handle> {
        self.id.parse().ok()
    }

    /// The slot path this ref encodes, if it is a slot ref (`slot:/a/b`)
    pub fn slot_path(&self) -> Option<&str> {
        self.id.strip_prefix("slot:")
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.id)?;
        if let Some(dis) = &self.dis {
            write!(f, " \"{}\"", dis)?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tag Value Type
// ─────────────────────────────────────────────────────────────────────────────

/// Value carried by a single tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "val")]
pub enum TagValue {
    /// Presence-only tag (`site`, `equip`, `point`, ...)
    Marker,
    /// Boolean value
    Bool(bool),
    /// Number with optional unit
    Number {
        value: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
    },
    /// UTF-8 string
    Str(String),
    /// Reference to another entity
    Ref(Ref),
    /// URI
    Uri(String),
    /// Timestamp
    DateTime(DateTime<Utc>),
}

impl TagValue {
    /// Check if value is a marker
    pub fn is_marker(&self) -> bool {
        matches!(self, TagValue::Marker)
    }

    /// Get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TagValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Number { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Get as string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Str(s) | TagValue::Uri(s) => Some(s),
            _ => None,
        }
    }

    /// Get as ref
    pub fn as_reference(&self) -> Option<&Ref> {
        match self {
            TagValue::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// Create a number with a unit
    pub fn number(value: f64, unit: impl Into<String>) -> Self {
        TagValue::Number {
            value,
            unit: Some(unit.into()),
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            TagValue::Marker => "marker",
            TagValue::Bool(_) => "bool",
            TagValue::Number { .. } => "number",
            TagValue::Str(_) => "str",
            TagValue::Ref(_) => "ref",
            TagValue::Uri(_) => "uri",
            TagValue::DateTime(_) => "dateTime",
        }
    }
}

/// Renders the value the way a nav name template expects to see it
impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Marker => f.write_str("\u{2713}"),
            TagValue::Bool(b) => write!(f, "{}", b),
            TagValue::Number { value, unit } => {
                write!(f, "{}", value)?;
                if let Some(unit) = unit {
                    f.write_str(unit)?;
                }
                Ok(())
            }
            TagValue::Str(s) | TagValue::Uri(s) => f.write_str(s),
            TagValue::Ref(r) => write!(f, "{}", r),
            TagValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// From Implementations
// ─────────────────────────────────────────────────────────────────────────────

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        TagValue::Bool(v)
    }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        TagValue::Number {
            value: v as f64,
            unit: None,
        }
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        TagValue::Number {
            value: v,
            unit: None,
        }
    }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self {
        TagValue::Str(v)
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        TagValue::Str(v.to_string())
    }
}

impl From<Ref> for TagValue {
    fn from(r: Ref) -> Self {
        TagValue::Ref(r)
    }
}

impl From<Handle> for TagValue {
    fn from(h: Handle) -> Self {
        TagValue::Ref(Ref::from_handle(h))
    }
}

impl From<DateTime<Utc>> for TagValue {
    fn from(dt: DateTime<Utc>) -> Self {
        TagValue::DateTime(dt)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// serde_json::Value Interop
// ─────────────────────────────────────────────────────────────────────────────

impl From<TagValue> for serde_json::Value {
    fn from(v: TagValue) -> Self {
        match v {
            TagValue::Marker => serde_json::Value::String("m:".to_string()),
            TagValue::Bool(b) => serde_json::Value::Bool(b),
            TagValue::Number { value, unit: None } => serde_json::Number::from_f64(value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            TagValue::Number {
                value,
                unit: Some(unit),
            } => serde_json::Value::String(format!("n:{} {}", value, unit)),
            TagValue::Str(s) => serde_json::Value::String(s),
            TagValue::Ref(r) => serde_json::Value::String(format!("r:{}", r.id)),
            TagValue::Uri(u) => serde_json::Value::String(format!("u:{}", u)),
            TagValue::DateTime(dt) => serde_json::Value::String(format!("t:{}", dt.to_rfc3339())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Error when reading or parsing a typed value
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueParseError {
    #[error("Invalid handle: {0}")]
    Handle(String),

    #[error("Invalid nav id: {0}")]
    NavId(String),

    #[error("Tag '{tag}' expected {expected}, got {actual}")]
    TypeMismatch {
        tag: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Missing tag: {0}")]
    MissingTag(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
