//! Fixed session configuration, chosen once at construction.

use std::time::Duration;

use nav_core::RouterType;
use nav_graph::DEFAULT_STREET_READ_SCALE;
use nav_router::KEEP_PEDESTRIAN_DISTANCE_M;

use crate::{SessionError, SessionResult};

// ── SessionConfig ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionConfig {
    /// Trips shorter than this may be handed to the pedestrian router by
    /// [`RoutingSession::select_router`](crate::RoutingSession::select_router).
    /// Default: 10 000 m.
    pub keep_pedestrian_distance_m: f64,

    /// Features held by the pedestrian router's road-graph cache.  Must be
    /// non-zero.  Default: 1 024.
    pub cache_capacity: usize,

    /// Map scale at which the pedestrian graph reads features; features that
    /// only appear at a finer scale are skipped.  Default: 17.
    pub street_read_scale: u8,

    /// Router used when no preference has been stored yet.
    pub default_router: RouterType,

    /// Timeout applied to deviation-triggered rebuilds.  `Duration::ZERO`
    /// means none.
    pub rebuild_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keep_pedestrian_distance_m: KEEP_PEDESTRIAN_DISTANCE_M,
            cache_capacity:             1_024,
            street_read_scale:          DEFAULT_STREET_READ_SCALE,
            default_router:             RouterType::Vehicle,
            rebuild_timeout:            Duration::ZERO,
        }
    }
}

impl SessionConfig {
    /// Reject values no session can run with.
    pub fn validate(&self) -> SessionResult<()> {
        if self.cache_capacity == 0 {
            return Err(SessionError::Config("cache_capacity must be non-zero".into()));
        }
        if !self.keep_pedestrian_distance_m.is_finite() || self.keep_pedestrian_distance_m < 0.0 {
            return Err(SessionError::Config(format!(
                "keep_pedestrian_distance_m must be a non-negative distance, got {}",
                self.keep_pedestrian_distance_m,
            )));
        }
        Ok(())
    }
}
