//! Choosing between the vehicle and pedestrian routers.

use nav_core::{GeoPoint, RouterType};

/// Trips shorter than this may be handed to the pedestrian router.
pub const KEEP_PEDESTRIAN_DISTANCE_M: f64 = 10_000.0;

/// Cheap check whether a vehicle route is plausible with local data.  Must
/// not run a search.
pub trait FeasibilityProbe {
    fn can_route(&self, start: GeoPoint, finish: GeoPoint) -> bool;
}

/// Pick a router with the default pedestrian distance threshold.
///
/// Short trips go to the pedestrian router when the stored preference is
/// pedestrian or the vehicle router cannot route them with local files.
/// Everything else goes to the vehicle router.
pub fn select_router(
    start:      GeoPoint,
    finish:     GeoPoint,
    preference: Option<RouterType>,
    probe:      &dyn FeasibilityProbe,
) -> RouterType {
    select_router_within(KEEP_PEDESTRIAN_DISTANCE_M, start, finish, preference, probe)
}

/// [`select_router`] with an explicit distance threshold.
pub fn select_router_within(
    threshold_m: f64,
    start:       GeoPoint,
    finish:      GeoPoint,
    preference:  Option<RouterType>,
    probe:       &dyn FeasibilityProbe,
) -> RouterType {
    if start.distance_m(finish) >= threshold_m {
        return RouterType::Vehicle;
    }
    if preference == Some(RouterType::Pedestrian) || !probe.can_route(start, finish) {
        RouterType::Pedestrian
    } else {
        RouterType::Vehicle
    }
}
