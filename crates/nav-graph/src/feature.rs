//! Road features and the read-only feature store.
//!
//! A region file is modelled as a bag of road features (polylines with a
//! road class, one-way flag, and the minimum map scale at which they are
//! drawn).  [`FeatureStore`] is the seam to whatever decodes the packed map
//! files on a device; [`MemoryFeatureStore`] is the in-process implementation
//! used by tests, the demo, and the CSV loader.
//!
//! # Spatial index
//!
//! Each region carries an R-tree (via `rstar`) over feature bounding boxes in
//! `[lat, lon]` space so junction and snapping queries only decode features
//! near the query point.

use std::str::FromStr;

use rstar::{RTree, RTreeObject, AABB};
use rustc_hash::FxHashMap;

use nav_core::{FeatureId, GeoPoint, RegionId};

use crate::{GraphError, GraphResult};

// ── RoadClass ─────────────────────────────────────────────────────────────────

/// Functional class of a road, as tagged in the source map.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum RoadClass {
    Motorway,
    Trunk,
    Primary,
    Secondary,
    Tertiary,
    Unclassified,
    Residential,
    LivingStreet,
    Service,
    Track,
    Pedestrian,
    Footway,
    Path,
    Steps,
}

impl RoadClass {
    pub fn as_str(self) -> &'static str {
        match self {
            RoadClass::Motorway     => "motorway",
            RoadClass::Trunk        => "trunk",
            RoadClass::Primary      => "primary",
            RoadClass::Secondary    => "secondary",
            RoadClass::Tertiary     => "tertiary",
            RoadClass::Unclassified => "unclassified",
            RoadClass::Residential  => "residential",
            RoadClass::LivingStreet => "living_street",
            RoadClass::Service      => "service",
            RoadClass::Track        => "track",
            RoadClass::Pedestrian   => "pedestrian",
            RoadClass::Footway      => "footway",
            RoadClass::Path         => "path",
            RoadClass::Steps        => "steps",
        }
    }
}

impl FromStr for RoadClass {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "motorway"      => RoadClass::Motorway,
            "trunk"         => RoadClass::Trunk,
            "primary"       => RoadClass::Primary,
            "secondary"     => RoadClass::Secondary,
            "tertiary"      => RoadClass::Tertiary,
            "unclassified"  => RoadClass::Unclassified,
            "residential"   => RoadClass::Residential,
            "living_street" => RoadClass::LivingStreet,
            "service"       => RoadClass::Service,
            "track"         => RoadClass::Track,
            "pedestrian"    => RoadClass::Pedestrian,
            "footway"       => RoadClass::Footway,
            "path"          => RoadClass::Path,
            "steps"         => RoadClass::Steps,
            other           => return Err(GraphError::UnknownRoadClass(other.to_owned())),
        })
    }
}

// ── RoadFeature ───────────────────────────────────────────────────────────────

/// A raw road feature as stored in a region file.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadFeature {
    pub id:           FeatureId,
    pub class:        RoadClass,
    pub oneway:       bool,
    /// Lowest map scale (zoom level) at which the feature is present.
    pub min_scale:    u8,
    /// Posted limit, if tagged.  Models cap their class speed with it.
    pub maxspeed_kmh: Option<f64>,
    pub points:       Vec<GeoPoint>,
}

impl RoadFeature {
    pub fn new(id: FeatureId, class: RoadClass, oneway: bool, points: Vec<GeoPoint>) -> Self {
        Self { id, class, oneway, min_scale: 0, maxspeed_kmh: None, points }
    }
}

// ── FeatureStore trait ────────────────────────────────────────────────────────

/// Read-only access to decoded road features.
///
/// Implementations must be `Send + Sync`: the store is shared between the
/// session (router selection probes) and the build worker thread.
pub trait FeatureStore: Send + Sync {
    /// Fetch one feature by region and id.
    fn feature(&self, region: RegionId, id: FeatureId) -> GraphResult<RoadFeature>;

    /// Ids of features in `region` whose bounding box intersects
    /// `[min, max]` and whose `min_scale <= scale`.
    fn features_in_rect(&self, region: RegionId, min: GeoPoint, max: GeoPoint, scale: u8) -> Vec<FeatureId>;

    /// Every feature id of `region` visible at `scale`.
    fn region_features(&self, region: RegionId, scale: u8) -> Vec<FeatureId>;

    fn has_region(&self, region: RegionId) -> bool;
}

// ── MemoryFeatureStore ────────────────────────────────────────────────────────

/// Bounding-box entry stored in a region's R-tree.
#[derive(Clone)]
struct FeatureEntry {
    envelope:  AABB<[f64; 2]>, // [lat, lon]
    id:        FeatureId,
    min_scale: u8,
}

impl RTreeObject for FeatureEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

struct RegionFeatures {
    features: FxHashMap<FeatureId, RoadFeature>,
    index:    RTree<FeatureEntry>,
}

/// In-memory [`FeatureStore`].  Do not construct directly; use
/// [`FeatureStoreBuilder`].
pub struct MemoryFeatureStore {
    regions: FxHashMap<RegionId, RegionFeatures>,
}

impl MemoryFeatureStore {
    pub fn empty() -> Self {
        FeatureStoreBuilder::new().build()
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn feature_count(&self, region: RegionId) -> usize {
        self.regions.get(&region).map_or(0, |r| r.features.len())
    }
}

impl FeatureStore for MemoryFeatureStore {
    fn feature(&self, region: RegionId, id: FeatureId) -> GraphResult<RoadFeature> {
        self.regions
            .get(&region)
            .and_then(|r| r.features.get(&id))
            .cloned()
            .ok_or(GraphError::FeatureNotFound { region, feature: id })
    }

    fn features_in_rect(&self, region: RegionId, min: GeoPoint, max: GeoPoint, scale: u8) -> Vec<FeatureId> {
        let Some(r) = self.regions.get(&region) else {
            return Vec::new();
        };
        let query = AABB::from_corners([min.lat, min.lon], [max.lat, max.lon]);
        let mut ids: Vec<FeatureId> = r
            .index
            .locate_in_envelope_intersecting(&query)
            .filter(|e| e.min_scale <= scale)
            .map(|e| e.id)
            .collect();
        // R-tree order is unspecified; sort for deterministic expansion.
        ids.sort_unstable();
        ids
    }

    fn region_features(&self, region: RegionId, scale: u8) -> Vec<FeatureId> {
        let Some(r) = self.regions.get(&region) else {
            return Vec::new();
        };
        let mut ids: Vec<FeatureId> = r
            .features
            .values()
            .filter(|f| f.min_scale <= scale)
            .map(|f| f.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn has_region(&self, region: RegionId) -> bool {
        self.regions.contains_key(&region)
    }
}

// ── FeatureStoreBuilder ───────────────────────────────────────────────────────

/// Collect features per region, then call [`build`](Self::build) to
/// bulk-load the R-trees.
///
/// # Example
///
/// ```
/// use nav_core::{FeatureId, GeoPoint, RegionId};
/// use nav_graph::{FeatureStore, FeatureStoreBuilder, RoadClass, RoadFeature};
///
/// let mut b = FeatureStoreBuilder::new();
/// b.add_feature(RegionId(0), RoadFeature::new(
///     FeatureId(1),
///     RoadClass::Residential,
///     false,
///     vec![GeoPoint::new(55.0, 37.0), GeoPoint::new(55.0, 37.01)],
/// ));
/// let store = b.build();
/// assert!(store.has_region(RegionId(0)));
/// ```
#[derive(Default)]
pub struct FeatureStoreBuilder {
    regions: FxHashMap<RegionId, Vec<RoadFeature>>,
}

impl FeatureStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a feature.  A later feature with the same id replaces the earlier
    /// one.
    pub fn add_feature(&mut self, region: RegionId, feature: RoadFeature) {
        self.regions.entry(region).or_default().push(feature);
    }

    /// Register a region with no features (a downloaded but empty map).
    pub fn add_region(&mut self, region: RegionId) {
        self.regions.entry(region).or_default();
    }

    pub fn build(self) -> MemoryFeatureStore {
        let regions = self
            .regions
            .into_iter()
            .map(|(region, list)| {
                let mut features = FxHashMap::default();
                for f in list {
                    features.insert(f.id, f);
                }
                let entries: Vec<FeatureEntry> = features
                    .values()
                    .filter_map(|f| {
                        envelope_of(&f.points).map(|envelope| FeatureEntry {
                            envelope,
                            id: f.id,
                            min_scale: f.min_scale,
                        })
                    })
                    .collect();
                let index = RTree::bulk_load(entries);
                (region, RegionFeatures { features, index })
            })
            .collect();
        MemoryFeatureStore { regions }
    }
}

fn envelope_of(points: &[GeoPoint]) -> Option<AABB<[f64; 2]>> {
    let first = points.first()?;
    let (mut lo, mut hi) = ([first.lat, first.lon], [first.lat, first.lon]);
    for p in &points[1..] {
        lo = [lo[0].min(p.lat), lo[1].min(p.lon)];
        hi = [hi[0].max(p.lat), hi[1].max(p.lon)];
    }
    Some(AABB::from_corners(lo, hi))
}
