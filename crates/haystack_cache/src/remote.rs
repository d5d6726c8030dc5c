//! Remote point derivation
//!
//! A remote point ties a local proxy point, or a history imported from
//! another station, back to the point it originates from.

use haystack_types::RemotePoint;

use crate::station::{Component, HistoryConfig};

/// Derives remote point keys from points and history configs
pub trait RemotePointDeriver: Send + Sync {
    fn from_control_point(&self, point: &Component) -> Option<RemotePoint>;
    fn from_history_config(&self, config: &HistoryConfig) -> Option<RemotePoint>;
}

/// Station-to-station derivation: the proxy extension names the remote
/// station and point id; an imported history is keyed by its device name
/// and the id of the point it was collected from.
#[derive(Debug, Clone, Copy, Default)]
pub struct NiagaraRemote;

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

impl RemotePointDeriver for NiagaraRemote {
    fn from_control_point(&self, point: &Component) -> Option<RemotePoint> {
        let proxy = point.proxy()?;
        let station = non_empty(&proxy.station_name)?;
        let point_id = non_empty(&proxy.point_id)?;
        Some(RemotePoint::new(station, point_id))
    }

    fn from_history_config(&self, config: &HistoryConfig) -> Option<RemotePoint> {
        let station = non_empty(config.device_name())?;
        let point_id = non_empty(config.source.as_deref()?)?;
        Some(RemotePoint::new(station, point_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::{ComponentKind, ProxyExt};
    use haystack_types::{Handle, HistoryId};

    fn point(proxy: Option<ProxyExt>) -> Component {
        Component {
            handle: Handle(1),
            parent: None,
            children: Vec::new(),
            name: "pt".to_string(),
            display_name: "pt".to_string(),
            slot_path: "/pt".to_string(),
            kind: ComponentKind::ControlPoint { proxy },
            tags: None,
        }
    }

    fn proxy(station: &str, point_id: &str) -> ProxyExt {
        ProxyExt {
            kind: "niagaraDriver:NiagaraProxyExt".to_string(),
            station_name: station.to_string(),
            point_id: point_id.to_string(),
        }
    }

    #[test]
    fn test_from_control_point() {
        let rp = NiagaraRemote.from_control_point(&point(Some(proxy("Remote1", "/Drivers/SAT"))));
        assert_eq!(rp, Some(RemotePoint::new("Remote1", "/Drivers/SAT")));

        assert!(NiagaraRemote.from_control_point(&point(None)).is_none());
        assert!(
            NiagaraRemote
                .from_control_point(&point(Some(proxy("", "/Drivers/SAT"))))
                .is_none()
        );
        assert!(
            NiagaraRemote
                .from_control_point(&point(Some(proxy("Remote1", "  "))))
                .is_none()
        );
    }

    #[test]
    fn test_from_history_config() {
        let cfg = HistoryConfig::new(HistoryId::new("Remote1", "SAT")).with_source("/Drivers/SAT");
        assert_eq!(
            NiagaraRemote.from_history_config(&cfg),
            Some(RemotePoint::new("Remote1", "/Drivers/SAT"))
        );

        let no_source = HistoryConfig::new(HistoryId::new("Remote1", "SAT"));
        assert!(NiagaraRemote.from_history_config(&no_source).is_none());
    }
}
