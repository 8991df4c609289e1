//! Vehicle/speed models.
//!
//! A model decides, per router mode, whether a feature is traversable, how
//! fast, and whether its one-way tag applies.  The cached road graph asks
//! the model once per decoded feature and caches the answer alongside the
//! geometry.
//!
//! | Class          | Car km/h | Walk km/h |
//! |----------------|----------|-----------|
//! | motorway       | 110      | —         |
//! | trunk          | 90       | —         |
//! | primary        | 70       | 5         |
//! | secondary      | 60       | 5         |
//! | tertiary       | 50       | 5         |
//! | unclassified   | 40       | 5         |
//! | residential    | 30       | 5         |
//! | living_street  | 10       | 5         |
//! | service        | 20       | 5         |
//! | track          | —        | 4.5       |
//! | pedestrian     | —        | 5         |
//! | footway / path | —        | 5 / 4.5   |
//! | steps          | —        | 2.5       |

use crate::{RoadClass, RoadFeature};

/// Per-mode traversal rules.
pub trait VehicleModel: Send + Sync {
    /// Traversal speed in km/h, or `None` if this mode may not use the road.
    fn speed_kmh(&self, feature: &RoadFeature) -> Option<f64>;

    /// Whether travel against the digitised direction is forbidden.
    fn is_oneway(&self, feature: &RoadFeature) -> bool;

    /// Upper bound of [`speed_kmh`](Self::speed_kmh) over all features.
    /// A* heuristics divide straight-line distance by this.
    fn max_speed_kmh(&self) -> f64;
}

// ── CarModel ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
pub struct CarModel;

impl CarModel {
    const MAX_SPEED_KMH: f64 = 110.0;
}

impl VehicleModel for CarModel {
    fn speed_kmh(&self, feature: &RoadFeature) -> Option<f64> {
        let class_speed: f64 = match feature.class {
            RoadClass::Motorway     => 110.0,
            RoadClass::Trunk        => 90.0,
            RoadClass::Primary      => 70.0,
            RoadClass::Secondary    => 60.0,
            RoadClass::Tertiary     => 50.0,
            RoadClass::Unclassified => 40.0,
            RoadClass::Residential  => 30.0,
            RoadClass::LivingStreet => 10.0,
            RoadClass::Service      => 20.0,
            RoadClass::Track
            | RoadClass::Pedestrian
            | RoadClass::Footway
            | RoadClass::Path
            | RoadClass::Steps => return None,
        };
        Some(match feature.maxspeed_kmh {
            Some(limit) if limit > 0.0 => class_speed.min(limit),
            _ => class_speed,
        })
    }

    fn is_oneway(&self, feature: &RoadFeature) -> bool {
        feature.oneway
    }

    fn max_speed_kmh(&self) -> f64 {
        Self::MAX_SPEED_KMH
    }
}

// ── PedestrianModel ───────────────────────────────────────────────────────────

/// Walking: everything but motorways and trunks, one-way tags ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct PedestrianModel;

impl PedestrianModel {
    const WALK_KMH: f64 = 5.0;
}

impl VehicleModel for PedestrianModel {
    fn speed_kmh(&self, feature: &RoadFeature) -> Option<f64> {
        match feature.class {
            RoadClass::Motorway | RoadClass::Trunk => None,
            RoadClass::Steps => Some(2.5),
            RoadClass::Track | RoadClass::Path => Some(4.5),
            _ => Some(Self::WALK_KMH),
        }
    }

    fn is_oneway(&self, _feature: &RoadFeature) -> bool {
        false
    }

    fn max_speed_kmh(&self) -> f64 {
        Self::WALK_KMH
    }
}
