//! Upward notifications: build results, progress, statistics.

use std::sync::Arc;
use std::time::Duration;

use nav_core::{RegionId, ResultCode, Route, RouterType};
use nav_graph::CacheStats;

/// Terminal outcome of one build, as delivered to the listener.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildResult {
    pub code:           ResultCode,
    /// Present exactly when `code.has_route()`.
    pub route:          Option<Arc<Route>>,
    /// Regions whose map file is not downloaded (or too old to use).
    pub absent_maps:    Vec<RegionId>,
    /// Regions whose map file is present but lacks usable routing data.
    pub absent_routing: Vec<RegionId>,
}

impl BuildResult {
    pub fn failure(code: ResultCode) -> Self {
        Self { code, route: None, absent_maps: Vec::new(), absent_routing: Vec::new() }
    }
}

/// Per-build counters, delivered before the result.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BuildStats {
    pub router:      RouterType,
    pub code:        ResultCode,
    /// Wall time from request to result delivery.
    pub elapsed:     Duration,
    /// Queue pops performed by the router.
    pub visited:     u64,
    /// Road-graph cache counters (pedestrian router only).
    pub cache:       Option<CacheStats>,
    pub route_len_m: Option<f64>,
}

/// Callbacks invoked by the session on its owner thread while it processes
/// events.
///
/// All methods have default no-op implementations.  `Cancelled` results are
/// never delivered.
pub trait RoutingListener {
    fn on_route_built(&mut self, _result: &BuildResult) {}

    /// Percent complete of the build in flight.
    fn on_progress(&mut self, _percent: f32) {}

    fn on_statistics(&mut self, _stats: &BuildStats) {}
}

/// A [`RoutingListener`] that ignores everything.
pub struct NoopListener;

impl RoutingListener for NoopListener {}
