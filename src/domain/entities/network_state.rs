use serde::{Deserialize, Serialize};
use std::fmt;

/// Tri-state internet reachability as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Reachability {
    Reachable,
    Unreachable,
    #[default]
    Unknown,
}

impl From<Option<bool>> for Reachability {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Reachability::Reachable,
            Some(false) => Reachability::Unreachable,
            None => Reachability::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    Wifi,
    Cellular,
    Ethernet,
    Other,
    None,
    #[default]
    Unknown,
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionType::Wifi => "wifi",
            ConnectionType::Cellular => "cellular",
            ConnectionType::Ethernet => "ethernet",
            ConnectionType::Other => "other",
            ConnectionType::None => "none",
            ConnectionType::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkState {
    pub is_connected: bool,
    pub is_internet_reachable: Reachability,
    pub connection_type: ConnectionType,
}

impl NetworkState {
    pub fn new(
        is_connected: bool,
        is_internet_reachable: Reachability,
        connection_type: ConnectionType,
    ) -> Self {
        Self {
            is_connected,
            is_internet_reachable,
            connection_type,
        }
    }

    pub fn offline() -> Self {
        Self::new(false, Reachability::Unreachable, ConnectionType::None)
    }

    pub fn online(connection_type: ConnectionType) -> Self {
        Self::new(true, Reachability::Reachable, connection_type)
    }

    /// Unknown reachability counts as online; many platforms never resolve it.
    pub fn is_online(&self) -> bool {
        self.is_connected && self.is_internet_reachable != Reachability::Unreachable
    }
}

impl Default for NetworkState {
    fn default() -> Self {
        Self::offline()
    }
}
