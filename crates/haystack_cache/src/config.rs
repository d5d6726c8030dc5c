//! Cache configuration

use serde::{Deserialize, Serialize};

use crate::format::DEFAULT_NAV_NAME_FORMAT;

/// Proxy extension type whose points correlate with a remote station
pub const DEFAULT_REMOTE_PROXY_KIND: &str = "niagaraDriver:NiagaraProxyExt";

/// Configuration of the index cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Slot ord of the component the tree walk starts from
    pub root: String,
    /// Name of the local station; taken from the component tree when unset
    pub station_name: Option<String>,
    /// Proxy extension type of remote proxy points
    pub remote_proxy_kind: String,
    /// Nav name template for components without a `navNameFormat` tag
    pub nav_name_format: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: "slot:/".to_string(),
            station_name: None,
            remote_proxy_kind: DEFAULT_REMOTE_PROXY_KIND.to_string(),
            nav_name_format: DEFAULT_NAV_NAME_FORMAT.to_string(),
        }
    }
}

impl CacheConfig {
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_station_name(mut self, station_name: impl Into<String>) -> Self {
        self.station_name = Some(station_name.into());
        self
    }

    /// Root as a slot path (`slot:/Drivers` -> `/Drivers`)
    pub fn root_slot_path(&self) -> &str {
        let path = self.root.strip_prefix("slot:").unwrap_or(&self.root);
        if path.is_empty() { "/" } else { path }
    }
}
