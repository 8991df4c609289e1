//! Router selection enum shared by the router, matcher, and session crates.

use std::str::FromStr;

use crate::NavError;

/// Which routing strategy computes a route.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RouterType {
    /// Contraction-hierarchy car routing over routing extensions.
    #[default]
    Vehicle,
    /// Bidirectional A* walking over the raw road graph.
    Pedestrian,
}

impl RouterType {
    /// Stable label.  This is the value persisted as the last used router,
    /// so it must never change.
    pub fn as_str(self) -> &'static str {
        match self {
            RouterType::Vehicle    => "vehicle",
            RouterType::Pedestrian => "pedestrian",
        }
    }
}

impl FromStr for RouterType {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "vehicle"    => Ok(RouterType::Vehicle),
            "pedestrian" => Ok(RouterType::Pedestrian),
            other        => Err(NavError::UnknownRouterType(other.to_owned())),
        }
    }
}

impl std::fmt::Display for RouterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
