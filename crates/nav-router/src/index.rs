//! Contraction-hierarchy routing index for one region.
//!
//! # Build
//!
//! 1. Every vertex of every car-routable feature becomes a node; vertices
//!    with identical coordinates are merged, which is what joins features at
//!    junctions.  Each segment becomes a directed link (two for two-way
//!    roads) costed in milliseconds of car travel.
//! 2. Nodes are contracted in order of *edge difference* (shortcuts added
//!    minus links removed), with lazy priority updates.  Contracting `v`
//!    adds a shortcut `u → w` for each in/out neighbour pair unless a local
//!    witness search finds a path of equal or lower cost avoiding `v`.
//! 3. Links are split by rank into an upward forward graph and an upward
//!    backward graph, both stored in CSR form:
//!
//! ```text
//! fwd.head[ fwd.start[n] .. fwd.start[n+1] ]   // u → w with rank(w) > rank(u)
//! bwd.head[ bwd.start[n] .. bwd.start[n+1] ]   // u → n with rank(u) > rank(n), stored at n
//! ```
//!
//! # Query
//!
//! Bidirectional Dijkstra that only relaxes upward links; both directions
//! stop once their queue minimum reaches the best meeting cost.  Shortcuts
//! on the winning path are unpacked recursively through their middle node.
//! Either side may start from several nodes, each carrying the cost already
//! spent (or still owed) on the partial segment of a snapped point.
//!
//! # Spatial index
//!
//! One R-tree over original segments projects query points onto the road;
//! another over node positions finds the border nodes two regions share.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::ops::Range;

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use nav_core::{FeatureId, GeoPoint, NodeId, RegionId, ResultCode};
use nav_graph::{FeatureStore, VehicleModel, DEFAULT_STREET_READ_SCALE};

use crate::delegate::{RouterDelegate, POLL_INTERVAL};
use crate::{RouterError, RouterResult};

/// `mid` value of an original (non-shortcut) link.
const NO_MID: u32 = u32::MAX;

/// Nodes a witness search may settle before giving up and keeping the
/// shortcut.
const WITNESS_SETTLE_LIMIT: usize = 256;

/// Coordinate quantum used to merge vertices into nodes (~1 cm).
const NODE_QUANTUM: f64 = 1e-7;

// ── R-tree node entry ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct NodeEntry {
    point: [f64; 2], // [lat, lon]
    id:    NodeId,
}

impl RTreeObject for NodeEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for NodeEntry {
    /// Squared distance in degree space; callers re-check metres.
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.point[0] - point[0];
        let dlon = self.point[1] - point[1];
        dlat * dlat + dlon * dlon
    }
}

/// An original segment `from → to` in digitised order.
#[derive(Clone)]
struct SegmentEntry {
    a:           [f64; 2],
    b:           [f64; 2],
    from:        u32,
    to:          u32,
    feature:     FeatureId,
    forward_ms:  u32,
    /// `None` on one-way roads.
    backward_ms: Option<u32>,
}

impl RTreeObject for SegmentEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.a, self.b)
    }
}

// ── EdgeSnap ──────────────────────────────────────────────────────────────────

/// A query point projected onto the nearest routable segment of an index.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EdgeSnap {
    /// Closest point on the segment.
    pub point:      GeoPoint,
    /// Distance from the query point to `point`, metres.
    pub distance_m: f64,
    pub feature:    FeatureId,
    /// Segment end nodes in digitised order.
    pub from:       NodeId,
    pub to:         NodeId,
    /// Fraction of the way from `from` to `to`.
    pub t:          f64,
    forward_ms:     u32,
    backward_ms:    Option<u32>,
}

impl EdgeSnap {
    /// Nodes reachable by driving away from the snapped point, with the cost
    /// of getting there.
    pub fn exits(&self) -> Vec<(NodeId, u64)> {
        let mut out = vec![(self.to, share(self.forward_ms, 1.0 - self.t))];
        if let Some(c) = self.backward_ms {
            out.push((self.from, share(c, self.t)));
        }
        out
    }

    /// Nodes from which the snapped point is reached, with the cost still
    /// owed after them.
    pub fn entries(&self) -> Vec<(NodeId, u64)> {
        let mut out = vec![(self.from, share(self.forward_ms, self.t))];
        if let Some(c) = self.backward_ms {
            out.push((self.to, share(c, 1.0 - self.t)));
        }
        out
    }

    /// Cost of driving from `self` to `other` without leaving their shared
    /// segment; `None` when they lie on different segments or one-way
    /// forbids the direction.
    pub fn direct_cost_ms(&self, other: &EdgeSnap) -> Option<u64> {
        if (self.feature, self.from, self.to) != (other.feature, other.from, other.to) {
            return None;
        }
        if other.t >= self.t {
            Some(share(self.forward_ms, other.t - self.t))
        } else {
            self.backward_ms.map(|c| share(c, self.t - other.t))
        }
    }
}

#[inline]
fn share(cost_ms: u32, fraction: f64) -> u64 {
    (f64::from(cost_ms) * fraction.clamp(0.0, 1.0)).round() as u64
}

// ── Links ─────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug)]
struct Link {
    /// Target for out-lists, source for in-lists.
    other:   u32,
    cost:    u32,
    /// Contracted middle node of a shortcut, `NO_MID` for an original link.
    mid:     u32,
    /// Feature the original link was cut from (`INVALID` for shortcuts).
    feature: FeatureId,
}

/// Upward links in CSR form.
struct Csr {
    start:   Vec<u32>,
    head:    Vec<u32>,
    cost:    Vec<u32>,
    mid:     Vec<u32>,
    feature: Vec<FeatureId>,
}

impl Csr {
    fn from_lists(lists: Vec<Vec<Link>>) -> Self {
        let total: usize = lists.iter().map(Vec::len).sum();
        let mut csr = Csr {
            start:   Vec::with_capacity(lists.len() + 1),
            head:    Vec::with_capacity(total),
            cost:    Vec::with_capacity(total),
            mid:     Vec::with_capacity(total),
            feature: Vec::with_capacity(total),
        };
        csr.start.push(0);
        for list in lists {
            for l in list {
                csr.head.push(l.other);
                csr.cost.push(l.cost);
                csr.mid.push(l.mid);
                csr.feature.push(l.feature);
            }
            csr.start.push(csr.head.len() as u32);
        }
        csr
    }

    #[inline]
    fn links(&self, n: u32) -> Range<usize> {
        self.start[n as usize] as usize..self.start[n as usize + 1] as usize
    }

    /// Cheapest link of `n` whose head is `head`.
    fn find(&self, n: u32, head: u32) -> Option<usize> {
        self.links(n)
            .filter(|&i| self.head[i] == head)
            .min_by_key(|&i| self.cost[i])
    }

    fn len(&self) -> usize {
        self.head.len()
    }
}

// ── IndexPath ─────────────────────────────────────────────────────────────────

/// An unpacked shortest path through the index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPath {
    pub cost_ms:  u64,
    /// Node sequence from source to target (one node for `s == t`).
    pub nodes:    Vec<NodeId>,
    /// Feature of each leg; `features.len() == nodes.len() - 1`.
    pub features: Vec<FeatureId>,
}

impl IndexPath {
    fn trivial(node: NodeId) -> Self {
        Self { cost_ms: 0, nodes: vec![node], features: Vec::new() }
    }
}

// ── RoutingIndex ──────────────────────────────────────────────────────────────

/// Contraction-hierarchy index over one region's car network.  Do not
/// construct directly; use [`RoutingIndexBuilder`].
pub struct RoutingIndex {
    region:        RegionId,
    cross_region:  bool,
    node_pos:      Vec<GeoPoint>,
    rank:          Vec<u32>,
    fwd:           Csr,
    bwd:           Csr,
    original_links: usize,
    spatial_idx:   RTree<NodeEntry>,
    segments:      RTree<SegmentEntry>,
}

impl RoutingIndex {
    pub fn region(&self) -> RegionId {
        self.region
    }

    /// Whether routes may leave this region through shared border nodes.
    pub fn supports_cross_region(&self) -> bool {
        self.cross_region
    }

    pub fn node_count(&self) -> usize {
        self.node_pos.len()
    }

    /// Directed road segments the index was built from.
    pub fn edge_count(&self) -> usize {
        self.original_links
    }

    pub fn shortcut_count(&self) -> usize {
        (0..self.fwd.len()).filter(|&i| self.fwd.mid[i] != NO_MID).count()
            + (0..self.bwd.len()).filter(|&i| self.bwd.mid[i] != NO_MID).count()
    }

    #[inline]
    pub fn node_pos(&self, n: NodeId) -> GeoPoint {
        self.node_pos[n.index()]
    }

    /// Project `point` onto the nearest routable segment no farther than
    /// `radius_m`.
    pub fn snap(&self, point: GeoPoint, radius_m: f64) -> Option<EdgeSnap> {
        let (d_lat, d_lon) = point.degree_radius(radius_m);
        let window = AABB::from_corners(
            [point.lat - d_lat, point.lon - d_lon],
            [point.lat + d_lat, point.lon + d_lon],
        );
        self.segments
            .locate_in_envelope_intersecting(&window)
            .map(|s| {
                let a = GeoPoint::new(s.a[0], s.a[1]);
                let b = GeoPoint::new(s.b[0], s.b[1]);
                (s, point.project_onto(a, b))
            })
            .filter(|(_, p)| p.distance_m <= radius_m)
            .min_by(|(x, p), (y, q)| {
                p.distance_m
                    .total_cmp(&q.distance_m)
                    .then(x.feature.cmp(&y.feature))
                    .then(x.from.cmp(&y.from))
            })
            .map(|(s, p)| EdgeSnap {
                point:       p.point,
                distance_m:  p.distance_m,
                feature:     s.feature,
                from:        NodeId(s.from),
                to:          NodeId(s.to),
                t:           p.t,
                forward_ms:  s.forward_ms,
                backward_ms: s.backward_ms,
            })
    }

    /// Node at exactly `point`, if any.
    pub fn node_at(&self, point: GeoPoint) -> Option<NodeId> {
        let e = self.spatial_idx.nearest_neighbor(&[point.lat, point.lon])?;
        self.node_pos[e.id.index()].almost_eq(point).then_some(e.id)
    }

    /// Pairs `(node here, node in other)` sharing a position.
    pub fn border_nodes(&self, other: &RoutingIndex) -> Vec<(NodeId, NodeId)> {
        let (Some(a), Some(b)) = (self.bounds(), other.bounds()) else {
            return Vec::new();
        };
        let lo = [a.lower()[0].max(b.lower()[0]), a.lower()[1].max(b.lower()[1])];
        let hi = [a.upper()[0].min(b.upper()[0]), a.upper()[1].min(b.upper()[1])];
        if lo[0] > hi[0] || lo[1] > hi[1] {
            return Vec::new();
        }
        let overlap = AABB::from_corners(lo, hi);
        let mut pairs: Vec<(NodeId, NodeId)> = self
            .spatial_idx
            .locate_in_envelope_intersecting(&overlap)
            .filter_map(|e| other.node_at(self.node_pos[e.id.index()]).map(|o| (e.id, o)))
            .collect();
        pairs.sort_unstable();
        pairs
    }

    fn bounds(&self) -> Option<AABB<[f64; 2]>> {
        (!self.node_pos.is_empty()).then(|| self.spatial_idx.root().envelope())
    }

    // ── Query ─────────────────────────────────────────────────────────────

    /// Shortest path from `s` to `t`.
    ///
    /// `Ok(None)` when `t` is unreachable; `Err(code)` when the delegate
    /// interrupts the search.  `visited` accumulates queue pops.
    pub fn query(
        &self,
        s:        NodeId,
        t:        NodeId,
        delegate: &RouterDelegate,
        visited:  &mut u64,
    ) -> Result<Option<IndexPath>, ResultCode> {
        if s == t {
            return Ok(Some(IndexPath::trivial(s)));
        }
        self.query_between(&[(s, 0)], &[(t, 0)], delegate, visited)
    }

    /// Cheapest path from any of `sources` to any of `targets`.
    ///
    /// Each source carries the cost spent before reaching it and each target
    /// the cost still owed after it; both are included in
    /// [`IndexPath::cost_ms`].  The path starts at the winning source and
    /// ends at the winning target.
    pub fn query_between(
        &self,
        sources:  &[(NodeId, u64)],
        targets:  &[(NodeId, u64)],
        delegate: &RouterDelegate,
        visited:  &mut u64,
    ) -> Result<Option<IndexPath>, ResultCode> {
        // node → (cost, parent link index into fwd/bwd, or usize::MAX at the root)
        let mut dist_f: FxHashMap<u32, (u64, usize)> = FxHashMap::default();
        let mut dist_b: FxHashMap<u32, (u64, usize)> = FxHashMap::default();
        let mut heap_f: BinaryHeap<Reverse<(u64, u32)>> = BinaryHeap::new();
        let mut heap_b: BinaryHeap<Reverse<(u64, u32)>> = BinaryHeap::new();
        for (seeds, dist, heap) in [(sources, &mut dist_f, &mut heap_f), (targets, &mut dist_b, &mut heap_b)] {
            for &(n, cost) in seeds {
                if dist.get(&n.0).is_none_or(|&(d, _)| cost < d) {
                    dist.insert(n.0, (cost, usize::MAX));
                    heap.push(Reverse((cost, n.0)));
                }
            }
        }

        let mut best = u64::MAX;
        let mut meet: Option<u32> = None;

        loop {
            let top_f = heap_f.peek().map_or(u64::MAX, |Reverse((c, _))| *c);
            let top_b = heap_b.peek().map_or(u64::MAX, |Reverse((c, _))| *c);
            if top_f.min(top_b) >= best {
                break;
            }
            let forward = top_f <= top_b;
            let (heap, dist, other, csr) = if forward {
                (&mut heap_f, &mut dist_f, &dist_b, &self.fwd)
            } else {
                (&mut heap_b, &mut dist_b, &dist_f, &self.bwd)
            };
            let Some(Reverse((cost, node))) = heap.pop() else { break };

            *visited += 1;
            if *visited % POLL_INTERVAL == 0 {
                if let Some(code) = delegate.interrupt() {
                    return Err(code);
                }
            }

            // Skip stale heap entries.
            if dist.get(&node).is_some_and(|&(d, _)| cost > d) {
                continue;
            }
            if let Some(&(d, _)) = other.get(&node) {
                if cost + d < best {
                    best = cost + d;
                    meet = Some(node);
                }
            }

            for i in csr.links(node) {
                let next = csr.head[i];
                let new_cost = cost + u64::from(csr.cost[i]);
                if dist.get(&next).is_none_or(|&(d, _)| new_cost < d) {
                    dist.insert(next, (new_cost, i));
                    heap.push(Reverse((new_cost, next)));
                }
            }
        }

        let Some(meet) = meet else {
            return Ok(None);
        };

        // (from, to, link index, in fwd?) in travel order.
        let mut up: Vec<(u32, u32, usize, bool)> = Vec::new();
        let mut cur = meet;
        while let Some(&(_, i)) = dist_f.get(&cur) {
            if i == usize::MAX {
                break;
            }
            let from = self.fwd_source(i);
            up.push((from, cur, i, true));
            cur = from;
        }
        let root = cur;
        up.reverse();
        let mut cur = meet;
        while let Some(&(_, i)) = dist_b.get(&cur) {
            if i == usize::MAX {
                break;
            }
            let to = self.bwd_owner(i);
            up.push((cur, to, i, false));
            cur = to;
        }

        let mut legs: Vec<(u32, u32, FeatureId)> = Vec::new();
        for (from, to, i, in_fwd) in up {
            let (mid, feature) = if in_fwd {
                (self.fwd.mid[i], self.fwd.feature[i])
            } else {
                (self.bwd.mid[i], self.bwd.feature[i])
            };
            self.unpack(from, to, mid, feature, &mut legs)?;
        }

        let mut nodes = Vec::with_capacity(legs.len() + 1);
        nodes.push(NodeId(root));
        let mut features = Vec::with_capacity(legs.len());
        for (_, to, feature) in legs {
            nodes.push(NodeId(to));
            features.push(feature);
        }
        Ok(Some(IndexPath { cost_ms: best, nodes, features }))
    }

    /// Source node of forward link `i` (CSR stores only heads).
    fn fwd_source(&self, i: usize) -> u32 {
        self.fwd.start.partition_point(|&st| st as usize <= i) as u32 - 1
    }

    /// Node whose backward list holds link `i`: the link's travel target.
    fn bwd_owner(&self, i: usize) -> u32 {
        self.bwd.start.partition_point(|&st| st as usize <= i) as u32 - 1
    }

    /// Middle node and feature of the link `a → b`.
    fn link_between(&self, a: u32, b: u32) -> Option<(u32, FeatureId)> {
        if self.rank[b as usize] > self.rank[a as usize] {
            self.fwd.find(a, b).map(|i| (self.fwd.mid[i], self.fwd.feature[i]))
        } else {
            self.bwd.find(b, a).map(|i| (self.bwd.mid[i], self.bwd.feature[i]))
        }
    }

    fn unpack(
        &self,
        from:    u32,
        to:      u32,
        mid:     u32,
        feature: FeatureId,
        out:     &mut Vec<(u32, u32, FeatureId)>,
    ) -> Result<(), ResultCode> {
        let mut stack = vec![(from, to, mid, feature)];
        while let Some((a, b, m, f)) = stack.pop() {
            if m == NO_MID {
                out.push((a, b, f));
                continue;
            }
            let (Some((m1, f1)), Some((m2, f2))) = (self.link_between(a, m), self.link_between(m, b)) else {
                warn!(region = %self.region, from = a, to = b, via = m, "shortcut cannot be unpacked");
                return Err(ResultCode::InternalError);
            };
            stack.push((m, b, m2, f2));
            stack.push((a, m, m1, f1));
        }
        Ok(())
    }
}

// ── RoutingIndexBuilder ───────────────────────────────────────────────────────

/// Build a [`RoutingIndex`] from one region of a feature store.
///
/// # Example
///
/// ```
/// use nav_core::{FeatureId, GeoPoint, RegionId};
/// use nav_graph::{CarModel, FeatureStoreBuilder, RoadClass, RoadFeature};
/// use nav_router::RoutingIndexBuilder;
///
/// let mut b = FeatureStoreBuilder::new();
/// b.add_feature(RegionId(0), RoadFeature::new(
///     FeatureId(1),
///     RoadClass::Primary,
///     false,
///     vec![GeoPoint::new(55.0, 37.0), GeoPoint::new(55.0, 37.01), GeoPoint::new(55.0, 37.02)],
/// ));
/// let store = b.build();
/// let index = RoutingIndexBuilder::new(RegionId(0)).build(&store, &CarModel).unwrap();
/// assert_eq!(index.node_count(), 3);
/// assert_eq!(index.edge_count(), 4); // two-way
/// ```
pub struct RoutingIndexBuilder {
    region:       RegionId,
    read_scale:   u8,
    cross_region: bool,
}

impl RoutingIndexBuilder {
    pub fn new(region: RegionId) -> Self {
        Self { region, read_scale: DEFAULT_STREET_READ_SCALE, cross_region: false }
    }

    pub fn read_scale(mut self, scale: u8) -> Self {
        self.read_scale = scale;
        self
    }

    /// Mark the index as able to continue routes into neighbouring regions.
    pub fn cross_region(mut self, enabled: bool) -> Self {
        self.cross_region = enabled;
        self
    }

    pub fn build(self, store: &dyn FeatureStore, model: &dyn VehicleModel) -> RouterResult<RoutingIndex> {
        if !store.has_region(self.region) {
            return Err(RouterError::UnknownRegion(self.region));
        }

        let mut g = Contractor::default();
        let mut node_of: FxHashMap<(i64, i64), u32> = FxHashMap::default();
        let mut segments: Vec<SegmentEntry> = Vec::new();

        for id in store.region_features(self.region, self.read_scale) {
            let f = match store.feature(self.region, id) {
                Ok(f) => f,
                Err(e) => {
                    warn!(region = %self.region, feature = %id, error = %e, "skipping unreadable feature");
                    continue;
                }
            };
            if f.points.len() < 2 {
                warn!(region = %self.region, feature = %id, points = f.points.len(), "skipping degenerate feature");
                continue;
            }
            let Some(speed_kmh) = model.speed_kmh(&f) else { continue };
            let oneway = model.is_oneway(&f);
            let mps = speed_kmh / 3.6;

            let ids: Vec<u32> = f.points.iter().map(|&p| g.intern(&mut node_of, p)).collect();
            for (w, pts) in ids.windows(2).zip(f.points.windows(2)) {
                if w[0] == w[1] {
                    continue;
                }
                let cost = ((pts[0].distance_m(pts[1]) / mps) * 1000.0).round().max(1.0) as u32;
                g.add_link(w[0], w[1], cost, NO_MID, f.id);
                if !oneway {
                    g.add_link(w[1], w[0], cost, NO_MID, f.id);
                }
                segments.push(SegmentEntry {
                    a:           [pts[0].lat, pts[0].lon],
                    b:           [pts[1].lat, pts[1].lon],
                    from:        w[0],
                    to:          w[1],
                    feature:     f.id,
                    forward_ms:  cost,
                    backward_ms: (!oneway).then_some(cost),
                });
            }
        }

        let original_links = g.link_count();
        debug!(region = %self.region, nodes = g.pos.len(), links = original_links, "contracting");
        let rank = g.contract();

        // Split links by rank into the two upward graphs.
        let n = g.pos.len();
        let mut fwd: Vec<Vec<Link>> = vec![Vec::new(); n];
        let mut bwd: Vec<Vec<Link>> = vec![Vec::new(); n];
        for (u, links) in g.out.iter().enumerate() {
            for &l in links {
                if rank[l.other as usize] > rank[u] {
                    fwd[u].push(l);
                } else {
                    bwd[l.other as usize].push(Link { other: u as u32, ..l });
                }
            }
        }

        let entries: Vec<NodeEntry> = g
            .pos
            .iter()
            .enumerate()
            .map(|(i, p)| NodeEntry { point: [p.lat, p.lon], id: NodeId(i as u32) })
            .collect();

        let index = RoutingIndex {
            region:         self.region,
            cross_region:   self.cross_region,
            node_pos:       g.pos,
            rank,
            fwd:            Csr::from_lists(fwd),
            bwd:            Csr::from_lists(bwd),
            original_links,
            spatial_idx:    RTree::bulk_load(entries),
            segments:       RTree::bulk_load(segments),
        };
        info!(
            region    = %index.region,
            nodes     = index.node_count(),
            edges     = index.edge_count(),
            shortcuts = index.shortcut_count(),
            "routing index built",
        );
        Ok(index)
    }
}

// ── Contraction ───────────────────────────────────────────────────────────────

/// Mutable adjacency used while contracting.  `inc[v]` mirrors `out`:
/// for every `u → v` link it holds an entry whose `other` is `u`.
#[derive(Default)]
struct Contractor {
    pos:        Vec<GeoPoint>,
    out:        Vec<Vec<Link>>,
    inc:        Vec<Vec<Link>>,
    contracted: Vec<bool>,
    /// Contracted neighbours so far; added to the priority to spread
    /// contraction evenly.
    deleted:    Vec<i64>,
}

impl Contractor {
    fn intern(&mut self, node_of: &mut FxHashMap<(i64, i64), u32>, p: GeoPoint) -> u32 {
        let key = ((p.lat / NODE_QUANTUM).round() as i64, (p.lon / NODE_QUANTUM).round() as i64);
        *node_of.entry(key).or_insert_with(|| {
            let id = self.pos.len() as u32;
            self.pos.push(p);
            self.out.push(Vec::new());
            self.inc.push(Vec::new());
            self.contracted.push(false);
            self.deleted.push(0);
            id
        })
    }

    fn link_count(&self) -> usize {
        self.out.iter().map(Vec::len).sum()
    }

    /// Insert `from → to`, or lower the cost of an existing link.
    fn add_link(&mut self, from: u32, to: u32, cost: u32, mid: u32, feature: FeatureId) {
        if let Some(l) = self.out[from as usize].iter_mut().find(|l| l.other == to) {
            if cost < l.cost {
                *l = Link { other: to, cost, mid, feature };
                if let Some(r) = self.inc[to as usize].iter_mut().find(|r| r.other == from) {
                    *r = Link { other: from, cost, mid, feature };
                }
            }
            return;
        }
        self.out[from as usize].push(Link { other: to, cost, mid, feature });
        self.inc[to as usize].push(Link { other: from, cost, mid, feature });
    }

    /// Contract every node; returns the rank (contraction order) per node.
    fn contract(&mut self) -> Vec<u32> {
        let n = self.pos.len();
        let mut rank = vec![0u32; n];
        let mut heap: BinaryHeap<Reverse<(i64, u32)>> = (0..n as u32)
            .map(|v| Reverse((self.priority(v), v)))
            .collect();

        let mut next_rank = 0u32;
        while let Some(Reverse((prio, v))) = heap.pop() {
            if self.contracted[v as usize] {
                continue;
            }
            let fresh = self.priority(v);
            if fresh > prio {
                heap.push(Reverse((fresh, v)));
                continue;
            }

            for (u, w, cost) in self.shortcuts(v) {
                self.add_link(u, w, cost, v, FeatureId::INVALID);
            }
            self.contracted[v as usize] = true;
            rank[v as usize] = next_rank;
            next_rank += 1;

            let neighbours: Vec<u32> = self.out[v as usize]
                .iter()
                .chain(&self.inc[v as usize])
                .map(|l| l.other)
                .collect();
            for u in neighbours {
                self.deleted[u as usize] += 1;
            }
        }
        rank
    }

    fn priority(&self, v: u32) -> i64 {
        let live = |l: &&Link| !self.contracted[l.other as usize];
        let removed = self.out[v as usize].iter().filter(live).count() + self.inc[v as usize].iter().filter(live).count();
        self.shortcuts(v).len() as i64 - removed as i64 + self.deleted[v as usize]
    }

    /// Shortcuts needed to contract `v`, as `(from, to, cost)`.
    fn shortcuts(&self, v: u32) -> Vec<(u32, u32, u32)> {
        let mut found = Vec::new();
        for l_in in &self.inc[v as usize] {
            let u = l_in.other;
            if self.contracted[u as usize] || u == v {
                continue;
            }
            let targets: Vec<(u32, u32)> = self.out[v as usize]
                .iter()
                .filter(|l| !self.contracted[l.other as usize] && l.other != u && l.other != v)
                .map(|l| (l.other, l_in.cost.saturating_add(l.cost)))
                .collect();
            let Some(max) = targets.iter().map(|&(_, c)| c).max() else { continue };

            let witness = self.witness_search(u, v, max);
            for (w, via) in targets {
                if witness.get(&w).is_none_or(|&d| d > via) {
                    found.push((u, w, via));
                }
            }
        }
        found
    }

    /// Bounded Dijkstra from `source` over uncontracted nodes, skipping
    /// `avoid`.
    fn witness_search(&self, source: u32, avoid: u32, max_cost: u32) -> FxHashMap<u32, u32> {
        let mut dist: FxHashMap<u32, u32> = FxHashMap::default();
        let mut heap: BinaryHeap<Reverse<(u32, u32)>> = BinaryHeap::new();
        dist.insert(source, 0);
        heap.push(Reverse((0, source)));
        let mut settled = 0usize;

        while let Some(Reverse((cost, node))) = heap.pop() {
            if cost > max_cost || settled >= WITNESS_SETTLE_LIMIT {
                break;
            }
            if dist.get(&node).is_some_and(|&d| cost > d) {
                continue;
            }
            settled += 1;
            for l in &self.out[node as usize] {
                if l.other == avoid || self.contracted[l.other as usize] {
                    continue;
                }
                let new_cost = cost.saturating_add(l.cost);
                if dist.get(&l.other).is_none_or(|&d| new_cost < d) {
                    dist.insert(l.other, new_cost);
                    heap.push(Reverse((new_cost, l.other)));
                }
            }
        }
        dist
    }
}
