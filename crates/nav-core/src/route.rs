//! The `Route` value produced by a successful build.
//!
//! A route is immutable once built: the session publishes it as
//! `Arc<Route>` and replaces it wholesale on every (re)build.

use crate::{GeoPoint, RouterType};

/// A turn instruction anchored on the polyline.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TurnMarker {
    /// Index of the polyline vertex where the turn happens.
    pub point_index: usize,
    /// Arc length from the route start to that vertex, metres.
    pub offset_m: f64,
}

/// An ordered polyline plus turn markers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Route {
    router:       RouterType,
    points:       Vec<GeoPoint>,
    /// `cumulative_m[i]` = arc length from `points[0]` to `points[i]`.
    cumulative_m: Vec<f64>,
    turns:        Vec<TurnMarker>,
}

impl Route {
    /// Build a route from a polyline and the vertex indices that carry a
    /// turn.  Offsets are derived from the polyline; indices past the end
    /// are dropped.
    pub fn new(router: RouterType, points: Vec<GeoPoint>, turn_points: &[usize]) -> Self {
        let mut cumulative_m = Vec::with_capacity(points.len());
        let mut acc = 0.0;
        for (i, p) in points.iter().enumerate() {
            if i > 0 {
                acc += points[i - 1].distance_m(*p);
            }
            cumulative_m.push(acc);
        }

        let turns = turn_points
            .iter()
            .filter(|&&i| i < points.len())
            .map(|&i| TurnMarker { point_index: i, offset_m: cumulative_m[i] })
            .collect();

        Self { router, points, cumulative_m, turns }
    }

    /// A route is usable only with at least one segment.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.points.len() >= 2
    }

    pub fn router_type(&self) -> RouterType {
        self.router
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn segment_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    /// End points of segment `i` (`points[i] → points[i+1]`).
    #[inline]
    pub fn segment(&self, i: usize) -> (GeoPoint, GeoPoint) {
        (self.points[i], self.points[i + 1])
    }

    /// Arc length from the route start to vertex `i`, metres.
    #[inline]
    pub fn cumulative_m(&self, i: usize) -> f64 {
        self.cumulative_m[i]
    }

    /// Total length in metres (`0.0` for an invalid route).
    pub fn length_m(&self) -> f64 {
        self.cumulative_m.last().copied().unwrap_or(0.0)
    }

    pub fn turns(&self) -> &[TurnMarker] {
        &self.turns
    }

    pub fn start(&self) -> Option<GeoPoint> {
        self.points.first().copied()
    }

    pub fn finish(&self) -> Option<GeoPoint> {
        self.points.last().copied()
    }
}
