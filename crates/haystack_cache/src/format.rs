//! Navigation name formatting
//!
//! Nav names come from a per-component template (`navNameFormat` tag, or the
//! configured default) evaluated against the component. Templates use
//! `%token%` substitutions:
//!
//! - `%displayName%`, `%name%`, `%slotPath%`
//! - `%parent.<token>%` evaluates `<token>` against the parent component
//! - `%tags.<name>%` renders a tag value
//! - `%%` is a literal percent sign
//!
//! Unknown tokens render as empty text.

use haystack_types::names;
use tracing::debug;

use crate::station::{Component, ComponentTree};

/// Default template when neither the component nor the config names one
pub const DEFAULT_NAV_NAME_FORMAT: &str = "%displayName%";

/// Evaluates nav name templates
pub trait NavNameFormatter: Send + Sync {
    fn format(&self, template: &str, component: &Component, tree: &dyn ComponentTree) -> String;
}

/// Template evaluator over component slots and tags
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotFormat;

impl SlotFormat {
    fn resolve(token: &str, component: &Component, tree: &dyn ComponentTree) -> String {
        if let Some(rest) = token.strip_prefix("parent.") {
            return match component.parent.map(|p| tree.component(p)) {
                Some(Ok(parent)) => Self::resolve(rest, &parent, tree),
                _ => String::new(),
            };
        }
        if let Some(tag) = token.strip_prefix("tags.") {
            return component
                .tags()
                .get(tag)
                .map(ToString::to_string)
                .unwrap_or_default();
        }

        match token {
            "displayName" => component.display_name.clone(),
            "name" => component.name.clone(),
            "slotPath" => component.slot_path.clone(),
            other => {
                debug!("Unknown format token '{}' on {}", other, component.slot_path);
                String::new()
            }
        }
    }
}

impl NavNameFormatter for SlotFormat {
    fn format(&self, template: &str, component: &Component, tree: &dyn ComponentTree) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find('%') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            match after.find('%') {
                Some(0) => {
                    out.push('%');
                    rest = &after[1..];
                }
                Some(end) => {
                    out.push_str(&Self::resolve(&after[..end], component, tree));
                    rest = &after[end + 1..];
                }
                None => {
                    // unterminated token, keep it verbatim
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Nav name of a component: its `navNameFormat` tag if present, else
/// `default_format`, evaluated by `formatter`.
pub fn nav_name(
    formatter: &dyn NavNameFormatter,
    tree: &dyn ComponentTree,
    component: &Component,
    default_format: &str,
) -> String {
    let template = component
        .tags()
        .get_str(names::NAV_NAME_FORMAT)
        .unwrap_or(default_format);
    formatter.format(template, component, tree)
}
