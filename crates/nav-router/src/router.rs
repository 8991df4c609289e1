//! The `Router` trait shared by both strategies.
//!
//! # Pluggability
//!
//! The session's build worker owns one boxed router per [`RouterType`] and
//! talks to it only through this trait, so tests can substitute scripted
//! routers without touching the session.

use nav_core::{GeoPoint, ResultCode, Route, RouterType};

use crate::delegate::{RouterDelegate, RouterOutcome};

/// A path solver.
///
/// `compute_route` takes `&mut self` because routers own caches that the
/// search fills.  At most one call is in flight per router; cancellation and
/// timeouts arrive through the delegate.
pub trait Router: Send {
    fn router_type(&self) -> RouterType;

    fn compute_route(&mut self, start: GeoPoint, finish: GeoPoint, delegate: &RouterDelegate) -> RouterOutcome;

    /// Drop cached map data; the next build re-reads it.
    fn soft_reset(&mut self) {}
}

/// Reject routes with fewer than two points.
pub(crate) fn require_valid(route: Route) -> Result<Route, ResultCode> {
    if route.is_valid() {
        Ok(route)
    } else {
        tracing::debug!(points = route.point_count(), "discarding degenerate route");
        Err(ResultCode::RouteNotFound)
    }
}
