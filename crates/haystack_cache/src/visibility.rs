//! History visibility policies
//!
//! Decides which histories are listed in the navigation tree. Policies see
//! the tables built by the earlier rebuild passes through [`IndexView`].

use std::sync::Arc;

use haystack_types::names;
use tracing::trace;

use crate::cache::IndexView;
use crate::remote::RemotePointDeriver;
use crate::station::HistoryConfig;

/// Decides whether a history is nav-indexed
pub trait HistoryVisibility: Send + Sync {
    fn is_visible(&self, config: &HistoryConfig, view: &IndexView<'_>) -> bool;
}

/// Every history is visible
#[derive(Debug, Clone, Copy, Default)]
pub struct AllVisible;

impl HistoryVisibility for AllVisible {
    fn is_visible(&self, _config: &HistoryConfig, _view: &IndexView<'_>) -> bool {
        true
    }
}

/// Hides histories marked `hidden`, and histories whose origin point is
/// already proxied by a local control point (the point exposes them).
pub struct ProxyAwareVisibility {
    remote: Arc<dyn RemotePointDeriver>,
}

impl ProxyAwareVisibility {
    pub fn new(remote: Arc<dyn RemotePointDeriver>) -> Self {
        Self { remote }
    }
}

impl HistoryVisibility for ProxyAwareVisibility {
    fn is_visible(&self, config: &HistoryConfig, view: &IndexView<'_>) -> bool {
        if config.tags.has(names::HIDDEN) {
            return false;
        }

        match self.remote.from_history_config(config) {
            Some(remote) if view.control_point(&remote).is_some() => {
                trace!("History {} is exposed by proxy point {}", config.id, remote);
                false
            }
            _ => true,
        }
    }
}
