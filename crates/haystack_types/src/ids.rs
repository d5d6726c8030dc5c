//! Identities: remote point keys, history ids and navigation ids

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::value::ValueParseError;

/// Correlation key linking a local proxy point or imported history to the
/// point on the remote station it originates from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RemotePoint {
    /// Name of the originating station
    pub station_name: String,
    /// Identifier of the point on that station (usually its slot path)
    pub point_id: String,
}

impl RemotePoint {
    pub fn new(station_name: impl Into<String>, point_id: impl Into<String>) -> Self {
        Self {
            station_name: station_name.into(),
            point_id: point_id.into(),
        }
    }
}

impl fmt::Display for RemotePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.station_name, self.point_id)
    }
}

/// Identifier of a history: the device (station) it belongs to and its name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HistoryId {
    pub device_name: String,
    pub history_name: String,
}

impl HistoryId {
    pub fn new(device_name: impl Into<String>, history_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            history_name: history_name.into(),
        }
    }
}

impl fmt::Display for HistoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.device_name, self.history_name)
    }
}

/// Navigation id of a site or an equip.
///
/// Equip ids are scoped by the nav name of their site, so two equips with
/// the same name under different sites never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NavId {
    Site(String),
    Equip { site: String, equip: String },
}

impl NavId {
    /// Scheme prefix of the textual form
    pub const PREFIX: &'static str = "sep:/";

    pub fn site(site: impl Into<String>) -> Self {
        NavId::Site(site.into())
    }

    pub fn equip(site: impl Into<String>, equip: impl Into<String>) -> Self {
        NavId::Equip {
            site: site.into(),
            equip: equip.into(),
        }
    }
}

impl fmt::Display for NavId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavId::Site(site) => write!(f, "{}{}", Self::PREFIX, site),
            NavId::Equip { site, equip } => write!(f, "{}{}/{}", Self::PREFIX, site, equip),
        }
    }
}

impl FromStr for NavId {
    type Err = ValueParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(Self::PREFIX)
            .ok_or_else(|| ValueParseError::NavId(s.to_string()))?;

        match rest.split_once('/') {
            None if !rest.is_empty() => Ok(NavId::site(rest)),
            Some((site, equip)) if !site.is_empty() && !equip.is_empty() && !equip.contains('/') => {
                Ok(NavId::equip(site, equip))
            }
            _ => Err(ValueParseError::NavId(s.to_string())),
        }
    }
}
