//! Projecting location fixes onto the active route.
//!
//! # Candidate search
//!
//! ```text
//!   segments:  0   1   2  [3   4   5 … 3+LOOKAHEAD)  …  n-1
//!                          ^ last matched segment
//! ```
//!
//! A fix is first matched against the window starting at the last matched
//! segment; travel along a route only moves forward, so this keeps a route
//! that doubles back on itself from snapping to the earlier pass.  While the
//! best candidate sits on the window's last segment the window slides on.
//! When the best candidate is still outside the snap radius the whole route
//! is scanned instead.
//!
//! Each candidate is scored `distance + direction_penalty_m × mismatch/180`,
//! where `mismatch` is the heading difference between the fix and the
//! segment in degrees.

use nav_core::geo::heading_delta_deg;
use nav_core::{GeoPoint, Route, RoutingSettings, TurnMarker};
use tracing::trace;

use crate::LocationFix;

/// Segments searched ahead of the last match before falling back to a full
/// scan.
pub const MATCH_LOOKAHEAD_SEGMENTS: usize = 16;

/// Outcome of matching one fix.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchResult {
    /// Closest point on the best segment.
    pub point:                 GeoPoint,
    /// Heading of the best segment, degrees clockwise from north.
    pub bearing_deg:           f64,
    /// Arc length from the route start to `point`, metres.
    pub distance_from_begin_m: f64,
    /// Distance from the fix to `point`, metres.
    pub distance_m:            f64,
    /// Index of the best segment.
    pub segment:               usize,
    /// `distance_m` is within the snap radius.
    pub valid:                 bool,
}

impl MatchResult {
    /// Position to report for `fix`: the matched point when it is valid and
    /// the settings ask for route matching, the raw fix otherwise.
    pub fn reported_point(&self, fix: &LocationFix, settings: &RoutingSettings) -> GeoPoint {
        if self.valid && settings.match_route { self.point } else { fix.point }
    }
}

/// The next turn within the look-ahead distance.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TurnAhead {
    pub marker:     TurnMarker,
    /// Distance along the route from the current position, metres.
    pub distance_m: f64,
}

struct Candidate {
    segment:    usize,
    point:      GeoPoint,
    /// Fraction along the segment.
    t:          f64,
    distance_m: f64,
    score:      f64,
}

/// Stateful matcher for one route.  Call [`reset`](Self::reset) when the
/// route is replaced.
#[derive(Debug, Default, Clone)]
pub struct RouteMatcher {
    last_segment:          usize,
    distance_from_begin_m: Option<f64>,
}

impl RouteMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all progress.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Arc length of the last valid match, `(false, 0.0)` before the first.
    pub fn distance_from_begin(&self) -> (bool, f64) {
        match self.distance_from_begin_m {
            Some(d) => (true, d),
            None => (false, 0.0),
        }
    }

    /// Metres left to the route finish from the last valid match.
    pub fn remaining_distance_m(&self, route: &Route) -> Option<f64> {
        self.distance_from_begin_m.map(|d| (route.length_m() - d).max(0.0))
    }

    /// First turn marker ahead of the last valid match and no farther than
    /// `lookahead_m`.
    pub fn next_turn(&self, route: &Route, lookahead_m: f64) -> Option<TurnAhead> {
        let d = self.distance_from_begin_m?;
        route
            .turns()
            .iter()
            .find(|t| t.offset_m > d)
            .map(|&marker| TurnAhead { marker, distance_m: marker.offset_m - d })
            .filter(|t| t.distance_m <= lookahead_m)
    }

    /// Match `fix` against `route`.
    ///
    /// An invalid match still reports the nearest segment and its distance
    /// (deviation tracking needs it) but leaves the stored progress alone.
    /// Returns `None` only for a route without segments.
    pub fn match_location(
        &mut self,
        route:    &Route,
        fix:      &LocationFix,
        settings: &RoutingSettings,
    ) -> Option<MatchResult> {
        let n = route.segment_count();
        if n == 0 {
            return None;
        }

        let from = self.last_segment.min(n - 1);
        let mut to = (from + MATCH_LOOKAHEAD_SEGMENTS).min(n);
        let mut best = best_candidate(route, fix, settings, from..to)?;
        // Best at the window's far edge: the agent may be further along.
        while best.segment + 1 == to && to < n {
            let next = (to + MATCH_LOOKAHEAD_SEGMENTS).min(n);
            match best_candidate(route, fix, settings, to..next) {
                Some(c) if c.score < best.score => best = c,
                _ => break,
            }
            to = next;
        }
        if best.distance_m > settings.snap_radius_m && (from > 0 || to < n) {
            trace!(from, to, distance_m = best.distance_m, "window miss, scanning whole route");
            if let Some(c) = best_candidate(route, fix, settings, 0..n) {
                if c.score < best.score {
                    best = c;
                }
            }
        }

        let (a, b) = route.segment(best.segment);
        // Interpolate the stored segment length so progress uses the same
        // measure as `length_m` and never overshoots the segment end.
        let seg_start = route.cumulative_m(best.segment);
        let seg_len = route.cumulative_m(best.segment + 1) - seg_start;
        let distance_from_begin_m = seg_start + seg_len * best.t;
        let valid = best.distance_m <= settings.snap_radius_m;
        if valid {
            self.last_segment = best.segment;
            self.distance_from_begin_m = Some(distance_from_begin_m);
        }

        Some(MatchResult {
            point: best.point,
            bearing_deg: a.bearing_deg(b),
            distance_from_begin_m,
            distance_m: best.distance_m,
            segment: best.segment,
            valid,
        })
    }
}

fn best_candidate(
    route:    &Route,
    fix:      &LocationFix,
    settings: &RoutingSettings,
    segments: std::ops::Range<usize>,
) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    for i in segments {
        let (a, b) = route.segment(i);
        let proj = fix.point.project_onto(a, b);
        let penalty = match fix.bearing_deg {
            Some(heading) if settings.direction_penalty_m > 0.0 && !a.almost_eq(b) => {
                settings.direction_penalty_m * heading_delta_deg(heading, a.bearing_deg(b)) / 180.0
            }
            _ => 0.0,
        };
        let score = proj.distance_m + penalty;
        if best.as_ref().is_none_or(|c| score < c.score) {
            best = Some(Candidate { segment: i, point: proj.point, t: proj.t, distance_m: proj.distance_m, score });
        }
    }
    best
}

// ── DeviationTracker ──────────────────────────────────────────────────────────

/// Counts consecutive off-route fixes.
///
/// A fix is off-route when its distance to the route exceeds
/// `deviation_threshold_m`; the tracker reports a deviation once
/// `deviation_window` such fixes arrive in a row.  Any on-route fix resets
/// the count.
#[derive(Debug, Default, Clone)]
pub struct DeviationTracker {
    off_route: usize,
}

impl DeviationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the distance of one fix from the route; `true` when the
    /// deviation has persisted for the whole window.
    pub fn record(&mut self, distance_m: f64, settings: &RoutingSettings) -> bool {
        if distance_m > settings.deviation_threshold_m {
            self.off_route += 1;
        } else {
            self.off_route = 0;
        }
        self.off_route >= settings.deviation_window.max(1)
    }

    pub fn off_route_count(&self) -> usize {
        self.off_route
    }

    pub fn reset(&mut self) {
        self.off_route = 0;
    }
}
