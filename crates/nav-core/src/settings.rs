//! Mode-specific routing settings.
//!
//! Switching router type swaps the whole settings object; nothing here is
//! derived at runtime.

/// Tuning for matching, deviation detection, and turn look-ahead.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoutingSettings {
    /// Maximum distance, metres, between a fix and the route for the fix to
    /// count as matched.
    pub snap_radius_m: f64,

    /// When `true` the reported position is the matched point on the route;
    /// otherwise the raw fix is kept for display and only progress is
    /// tracked.
    pub match_route: bool,

    /// Extra metres added to a candidate segment's matching score when the
    /// fix heading is opposite to the segment heading; scaled linearly by
    /// the heading mismatch.  `0.0` disables heading-aware matching.
    pub direction_penalty_m: f64,

    /// Distance ahead of the current position within which the next turn
    /// marker is reported.
    pub turn_lookahead_m: f64,

    /// Perpendicular distance, metres, above which a fix counts as off-route.
    pub deviation_threshold_m: f64,

    /// Number of consecutive off-route fixes that trigger a rebuild.
    pub deviation_window: usize,
}

impl RoutingSettings {
    /// Car navigation defaults.
    pub const fn vehicle() -> Self {
        Self {
            snap_radius_m:         50.0,
            match_route:           true,
            direction_penalty_m:   20.0,
            turn_lookahead_m:      300.0,
            deviation_threshold_m: 50.0,
            deviation_window:      3,
        }
    }

    /// Walking defaults: tighter snap, heading ignored (pedestrians turn
    /// around freely), short turn look-ahead.
    pub const fn pedestrian() -> Self {
        Self {
            snap_radius_m:         20.0,
            match_route:           false,
            direction_penalty_m:   0.0,
            turn_lookahead_m:      50.0,
            deviation_threshold_m: 25.0,
            deviation_window:      3,
        }
    }

    /// Settings preset for `router`.
    pub const fn for_router(router: crate::RouterType) -> Self {
        match router {
            crate::RouterType::Vehicle    => Self::vehicle(),
            crate::RouterType::Pedestrian => Self::pedestrian(),
        }
    }
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self::vehicle()
    }
}
