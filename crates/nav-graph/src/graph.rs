//! Cached road graph over one region's features.
//!
//! # Graph model
//!
//! Vertices of the search graph are [`RoadPosition`]s: a directed segment of
//! a feature.  Two positions are adjacent when the end vertex of the first
//! coincides with the start vertex of the second, on the same feature or on
//! any other feature passing through that junction.  The weight of entering
//! a position is the traversal time of its segment in seconds.
//!
//! # Cache
//!
//! Every feature lookup goes through a fixed-capacity [`LruCache`] keyed by
//! feature id.  On a miss the feature is fetched from the [`FeatureStore`],
//! its speed and one-way flag are resolved through the [`VehicleModel`], and
//! the decoded entry is inserted (evicting the least recently used one if
//! the cache is full).  `accesses` counts every lookup, `misses` only those
//! that had to decode.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tracing::{debug, warn};

use nav_core::geo::heading_delta_deg;
use nav_core::{FeatureId, GeoPoint, RegionId, Route, RouterType};

use crate::{FeatureStore, GraphError, GraphResult, LruCache, VehicleModel};

/// Map scale at which features count as roads for routing.  Features drawn
/// only at more detailed scales are invisible to the graph.
pub const DEFAULT_STREET_READ_SCALE: u8 = 17;

/// Two vertices closer than this belong to the same junction query box.
const JUNCTION_RADIUS_M: f64 = 1.0;

/// Heading change between consecutive features that earns a turn marker.
const TURN_ANGLE_DEG: f64 = 30.0;

// ── RoadPosition ──────────────────────────────────────────────────────────────

/// A directed location on the road network.
///
/// Segment `seg` joins vertices `seg` and `seg + 1` of the feature;
/// `forward` travels towards `seg + 1`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct RoadPosition {
    pub region:  RegionId,
    pub feature: FeatureId,
    pub seg:     u32,
    pub forward: bool,
}

impl RoadPosition {
    #[inline]
    pub const fn new(region: RegionId, feature: FeatureId, seg: u32, forward: bool) -> Self {
        Self { region, feature, seg, forward }
    }

    /// The same segment travelled the other way.
    #[inline]
    pub const fn reversed(self) -> Self {
        Self { forward: !self.forward, ..self }
    }

    /// Vertex index where travel along this position starts.
    #[inline]
    pub fn start_index(self) -> usize {
        if self.forward { self.seg as usize } else { self.seg as usize + 1 }
    }

    /// Vertex index where travel along this position ends.
    #[inline]
    pub fn end_index(self) -> usize {
        if self.forward { self.seg as usize + 1 } else { self.seg as usize }
    }
}

impl std::fmt::Display for RoadPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}#{}{}",
            self.region.0,
            self.feature.0,
            self.seg,
            if self.forward { '+' } else { '-' },
        )
    }
}

// ── Cached entries and statistics ─────────────────────────────────────────────

/// Decoded geometry and traversal attributes of one feature.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedFeature {
    pub points:    Vec<GeoPoint>,
    /// `0.0` when the active model may not use the road.
    pub speed_kmh: f64,
    pub oneway:    bool,
}

impl CachedFeature {
    #[inline]
    pub fn is_routable(&self) -> bool {
        self.speed_kmh > 0.0
    }

    /// Traversal time of segment `seg`, seconds.
    pub fn segment_secs(&self, seg: usize) -> f64 {
        let len = self.points[seg].distance_m(self.points[seg + 1]);
        len / (self.speed_kmh / 3.6)
    }

    pub fn segment_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }
}

/// Cache counters.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub accesses: u64,
    pub misses:   u64,
}

impl CacheStats {
    /// `misses / accesses`, `0.0` before the first access.
    pub fn miss_ratio(&self) -> f64 {
        if self.accesses == 0 {
            return 0.0;
        }
        self.misses as f64 / self.accesses as f64
    }
}

/// A snapped projection of a geographic point onto a road segment.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Snap {
    /// The segment, oriented along the feature's digitised direction.
    pub pos:        RoadPosition,
    /// Closest point on the segment.
    pub point:      GeoPoint,
    /// Fraction along the segment (`0.0` at vertex `seg`).
    pub t:          f64,
    pub distance_m: f64,
}

// ── CachedRoadGraph ───────────────────────────────────────────────────────────

/// Road-graph accessor for one region with a bounded feature cache.
///
/// Not `Sync`: the graph is exercised only by the single in-flight build.
pub struct CachedRoadGraph {
    store:      Arc<dyn FeatureStore>,
    region:     RegionId,
    model:      Box<dyn VehicleModel>,
    cache:      LruCache<FeatureId, Arc<CachedFeature>>,
    read_scale: u8,
    stats:      CacheStats,
}

impl CachedRoadGraph {
    pub fn new(
        store:      Arc<dyn FeatureStore>,
        region:     RegionId,
        model:      Box<dyn VehicleModel>,
        capacity:   NonZeroUsize,
        read_scale: u8,
    ) -> Self {
        Self {
            store,
            region,
            model,
            cache: LruCache::new(capacity),
            read_scale,
            stats: CacheStats::default(),
        }
    }

    pub fn region(&self) -> RegionId {
        self.region
    }

    pub fn read_scale(&self) -> u8 {
        self.read_scale
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn miss_ratio(&self) -> f64 {
        self.stats.miss_ratio()
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn max_speed_kmh(&self) -> f64 {
        self.model.max_speed_kmh()
    }

    /// Drop every cached feature.  Called when the underlying map files may
    /// have changed; counters survive so hit ratios stay comparable.
    pub fn soft_reset(&mut self) {
        debug!(region = %self.region, entries = self.cache.len(), "clearing road graph cache");
        self.cache.clear();
    }

    // ── Feature access ────────────────────────────────────────────────────

    /// Fetch a feature through the cache.
    ///
    /// Decode failures are logged and yield `None`; they are not cached, so
    /// a later lookup retries the store.
    pub fn feature(&mut self, id: FeatureId) -> Option<Arc<CachedFeature>> {
        self.stats.accesses += 1;
        if let Some(hit) = self.cache.get(&id) {
            return Some(Arc::clone(hit));
        }

        self.stats.misses += 1;
        match self.decode(id) {
            Ok(decoded) => {
                let entry = Arc::new(decoded);
                self.cache.insert(id, Arc::clone(&entry));
                Some(entry)
            }
            Err(e) => {
                warn!(region = %self.region, feature = %id, error = %e, "skipping undecodable feature");
                None
            }
        }
    }

    fn decode(&self, id: FeatureId) -> GraphResult<CachedFeature> {
        let raw = self.store.feature(self.region, id)?;
        if raw.points.len() < 2 {
            return Err(GraphError::Degenerate { feature: id, points: raw.points.len() });
        }
        let speed_kmh = self.model.speed_kmh(&raw).unwrap_or(0.0);
        let oneway = self.model.is_oneway(&raw);
        Ok(CachedFeature { points: raw.points, speed_kmh, oneway })
    }

    /// Traversal time of `pos`, or `None` if its feature cannot be decoded
    /// or is not routable.
    pub fn position_secs(&mut self, pos: RoadPosition) -> Option<f64> {
        let f = self.feature(pos.feature)?;
        if !f.is_routable() || pos.seg as usize >= f.segment_count() {
            return None;
        }
        Some(f.segment_secs(pos.seg as usize))
    }

    /// Geographic end points `(start, end)` of `pos` in travel direction.
    pub fn position_points(&mut self, pos: RoadPosition) -> Option<(GeoPoint, GeoPoint)> {
        let f = self.feature(pos.feature)?;
        let a = *f.points.get(pos.start_index())?;
        let b = *f.points.get(pos.end_index())?;
        Some((a, b))
    }

    // ── Adjacency ─────────────────────────────────────────────────────────

    /// Positions reachable from the end of `pos`, with the traversal time of
    /// each as weight.
    pub fn possible_turns(&mut self, pos: RoadPosition) -> Vec<(RoadPosition, f64)> {
        self.adjacent(pos, true)
    }

    /// Positions from which `pos` is reachable, weighted by their own
    /// traversal time.  The backward half of a bidirectional search uses
    /// this.
    pub fn incoming_turns(&mut self, pos: RoadPosition) -> Vec<(RoadPosition, f64)> {
        self.adjacent(pos, false)
    }

    fn adjacent(&mut self, pos: RoadPosition, outgoing: bool) -> Vec<(RoadPosition, f64)> {
        let Some(own) = self.feature(pos.feature) else {
            return Vec::new();
        };
        let vertex = if outgoing { pos.end_index() } else { pos.start_index() };
        let Some(&junction) = own.points.get(vertex) else {
            return Vec::new();
        };

        let (d_lat, d_lon) = junction.degree_radius(JUNCTION_RADIUS_M);
        let candidates = self.store.features_in_rect(
            self.region,
            GeoPoint::new(junction.lat - d_lat, junction.lon - d_lon),
            GeoPoint::new(junction.lat + d_lat, junction.lon + d_lon),
            self.read_scale,
        );

        let mut out = Vec::new();
        for id in candidates {
            let f = if id == pos.feature {
                Arc::clone(&own)
            } else {
                match self.feature(id) {
                    Some(f) => f,
                    None => continue,
                }
            };
            if !f.is_routable() {
                continue;
            }

            for (i, p) in f.points.iter().enumerate() {
                if !p.almost_eq(junction) {
                    continue;
                }
                // Segments leaving vertex i: forward along i, backward along i-1.
                let mut leaving = Vec::with_capacity(2);
                if i + 1 < f.points.len() {
                    leaving.push(RoadPosition::new(self.region, id, i as u32, true));
                }
                if i > 0 {
                    leaving.push(RoadPosition::new(self.region, id, i as u32 - 1, false));
                }

                for l in leaving {
                    let cand = if outgoing { l } else { l.reversed() };
                    if !cand.forward && f.oneway {
                        continue;
                    }
                    if cand == pos.reversed() {
                        continue;
                    }
                    out.push((cand, f.segment_secs(cand.seg as usize)));
                }
            }
        }
        out
    }

    // ── Snapping ──────────────────────────────────────────────────────────

    /// Routable segments within `radius_m` of `point`, closest first.
    pub fn snap(&mut self, point: GeoPoint, radius_m: f64) -> Vec<Snap> {
        let (d_lat, d_lon) = point.degree_radius(radius_m);
        let candidates = self.store.features_in_rect(
            self.region,
            GeoPoint::new(point.lat - d_lat, point.lon - d_lon),
            GeoPoint::new(point.lat + d_lat, point.lon + d_lon),
            self.read_scale,
        );

        let mut snaps = Vec::new();
        for id in candidates {
            let Some(f) = self.feature(id) else { continue };
            if !f.is_routable() {
                continue;
            }
            for seg in 0..f.segment_count() {
                let proj = point.project_onto(f.points[seg], f.points[seg + 1]);
                if proj.distance_m <= radius_m {
                    snaps.push(Snap {
                        pos:        RoadPosition::new(self.region, id, seg as u32, true),
                        point:      proj.point,
                        t:          proj.t,
                        distance_m: proj.distance_m,
                    });
                }
            }
        }
        snaps.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m).then(a.pos.cmp(&b.pos)));
        snaps
    }

    // ── Path reconstruction ───────────────────────────────────────────────

    /// Expand an ordered list of positions into route geometry.
    ///
    /// Shared junction vertices appear once and turn markers are placed as
    /// described on [`assemble_route`].
    ///
    /// Fails with [`GraphError::Disconnected`] if any position's feature can
    /// no longer be decoded.
    pub fn reconstruct_path(&mut self, positions: &[RoadPosition], router: RouterType) -> GraphResult<Route> {
        let legs = self.legs(positions)?;
        Ok(assemble_route(router, legs))
    }

    /// Like [`reconstruct_path`](Self::reconstruct_path), but the route starts
    /// at `start` and ends at `finish` instead of the outer vertices of the
    /// first and last positions.  Both points are expected to lie on those
    /// segments (snap projections).
    pub fn reconstruct_between(
        &mut self,
        positions: &[RoadPosition],
        start:     GeoPoint,
        finish:    GeoPoint,
        router:    RouterType,
    ) -> GraphResult<Route> {
        let mut legs = self.legs(positions)?;
        if let Some(first) = legs.first_mut() {
            first.1 = start;
        }
        if let Some(last) = legs.last_mut() {
            last.2 = finish;
        }
        Ok(assemble_route(router, legs))
    }

    fn legs(&mut self, positions: &[RoadPosition]) -> GraphResult<Vec<(FeatureId, GeoPoint, GeoPoint)>> {
        positions
            .iter()
            .map(|&pos| {
                let (a, b) = self
                    .position_points(pos)
                    .ok_or(GraphError::Disconnected(pos.feature))?;
                Ok((pos.feature, a, b))
            })
            .collect()
    }
}

// ── Route assembly ────────────────────────────────────────────────────────────

/// Concatenate `(feature, from, to)` legs into a [`Route`].
///
/// Consecutive duplicate points are merged.  A turn marker is placed where
/// the feature changes and the heading swings by more than
/// `TURN_ANGLE_DEG`; the final vertex always carries one.  Zero-length legs
/// contribute no heading.
pub fn assemble_route<I>(router: RouterType, legs: I) -> Route
where
    I: IntoIterator<Item = (FeatureId, GeoPoint, GeoPoint)>,
{
    let mut points: Vec<GeoPoint> = Vec::new();
    let mut turns: Vec<usize> = Vec::new();
    let mut prev: Option<(FeatureId, f64)> = None;

    for (feature, a, b) in legs {
        if a.almost_eq(b) {
            if points.is_empty() {
                points.push(a);
            }
            continue;
        }
        let heading = a.bearing_deg(b);

        if let Some((prev_feature, prev_heading)) = prev {
            if prev_feature != feature
                && heading_delta_deg(prev_heading, heading) > TURN_ANGLE_DEG
                && !points.is_empty()
            {
                turns.push(points.len() - 1);
            }
        }

        for p in [a, b] {
            if points.last().is_none_or(|last| !last.almost_eq(p)) {
                points.push(p);
            }
        }
        prev = Some((feature, heading));
    }

    if !points.is_empty() {
        turns.push(points.len() - 1);
    }
    Route::new(router, points, &turns)
}
