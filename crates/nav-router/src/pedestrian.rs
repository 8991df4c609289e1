//! Pedestrian router: bidirectional A* directly over the cached road graph.
//!
//! # Search
//!
//! Vertices are [`RoadPosition`]s; a position's cost is the walking time of
//! its segment.  The forward half expands `possible_turns`, the backward half
//! `incoming_turns`.  With `g_f` counting the cost of every position from the
//! source through `v` inclusive and `g_b` the cost from `v` inclusive to the
//! target, a meeting at `v` costs `g_f(v) + g_b(v) - c(v)`.
//!
//! The segments holding the start and finish are seeded with only the part
//! between the snapped point and the vertex each direction leads to.  The
//! opposite half always reaches such a segment at full cost, so the meeting
//! formula holds for them unchanged.
//!
//! Heuristics are straight-line distance divided by the model's top speed,
//! so both halves stay admissible and the search stops once either queue's
//! minimum `f` reaches the best meeting cost.
//!
//! The router only ever routes inside a single region file.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use nav_core::{GeoPoint, RegionId, ResultCode, RouterType};
use nav_graph::{CachedRoadGraph, FeatureStore, PedestrianModel, RoadPosition, Snap, DEFAULT_STREET_READ_SCALE};

use crate::catalog::FileCatalog;
use crate::delegate::{RouterDelegate, RouterOutcome, RouterStats, POLL_INTERVAL};
use crate::region::RegionResolver;
use crate::router::{require_valid, Router};

/// Default distance within which a query point must find a walkable segment.
pub const DEFAULT_PEDESTRIAN_SNAP_M: f64 = 500.0;

/// Default road-graph cache capacity, in features.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

// ── Queue entry ───────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug)]
struct QueueEntry {
    f:   f64,
    g:   f64,
    pos: RoadPosition,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    /// Reversed on `f` so `BinaryHeap` pops the smallest; ties broken by
    /// position for deterministic expansion.
    fn cmp(&self, other: &Self) -> Ordering {
        other.f.total_cmp(&self.f).then_with(|| other.pos.cmp(&self.pos))
    }
}

/// One half of the bidirectional search.
struct Frontier {
    queue:  BinaryHeap<QueueEntry>,
    g:      FxHashMap<RoadPosition, f64>,
    parent: FxHashMap<RoadPosition, RoadPosition>,
    /// Heuristic goal: the finish for the forward half, the start for the
    /// backward half.
    goal:   GeoPoint,
}

impl Frontier {
    fn new(goal: GeoPoint) -> Self {
        Self { queue: BinaryHeap::new(), g: FxHashMap::default(), parent: FxHashMap::default(), goal }
    }

    fn min_f(&self) -> f64 {
        self.queue.peek().map_or(f64::INFINITY, |e| e.f)
    }
}

// ── PedestrianRouter ──────────────────────────────────────────────────────────

pub struct PedestrianRouter {
    store:          Arc<dyn FeatureStore>,
    resolver:       Arc<dyn RegionResolver>,
    catalog:        Arc<dyn FileCatalog>,
    cache_capacity: NonZeroUsize,
    read_scale:     u8,
    snap_radius_m:  f64,
    /// Graph of the region routed last; replaced when the region changes.
    graph:          Option<CachedRoadGraph>,
}

impl PedestrianRouter {
    pub fn new(store: Arc<dyn FeatureStore>, resolver: Arc<dyn RegionResolver>, catalog: Arc<dyn FileCatalog>) -> Self {
        Self {
            store,
            resolver,
            catalog,
            cache_capacity: NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            read_scale:     DEFAULT_STREET_READ_SCALE,
            snap_radius_m:  DEFAULT_PEDESTRIAN_SNAP_M,
            graph:          None,
        }
    }

    pub fn with_cache_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.cache_capacity = capacity;
        self.graph = None;
        self
    }

    pub fn with_read_scale(mut self, scale: u8) -> Self {
        self.read_scale = scale;
        self.graph = None;
        self
    }

    pub fn with_snap_radius(mut self, radius_m: f64) -> Self {
        self.snap_radius_m = radius_m;
        self
    }

    /// Road graph used by the last build, if any.
    pub fn graph(&self) -> Option<&CachedRoadGraph> {
        self.graph.as_ref()
    }

    fn graph_for(&mut self, region: RegionId) -> &mut CachedRoadGraph {
        if self.graph.as_ref().is_some_and(|g| g.region() != region) {
            self.graph = None;
        }
        let (store, capacity, scale) = (&self.store, self.cache_capacity, self.read_scale);
        self.graph.get_or_insert_with(|| {
            debug!(region = %region, capacity = capacity.get(), "creating pedestrian road graph");
            CachedRoadGraph::new(Arc::clone(store), region, Box::new(PedestrianModel), capacity, scale)
        })
    }

    fn route(&mut self, start: GeoPoint, finish: GeoPoint, delegate: &RouterDelegate, visited: &mut u64) -> RouterOutcome {
        let Some(start_file) = self.resolver.file_at(start) else {
            return RouterOutcome::failure(ResultCode::StartPointNotFound);
        };
        let Some(finish_file) = self.resolver.file_at(finish) else {
            return RouterOutcome::failure(ResultCode::EndPointNotFound);
        };
        if start_file != finish_file {
            return RouterOutcome::failure(ResultCode::PointsInDifferentRegion);
        }

        let region = self
            .catalog
            .local_file(&start_file)
            .map(|f| f.region)
            .filter(|&r| self.store.has_region(r));
        let Some(region) = region else {
            return RouterOutcome::failure(ResultCode::RouteFileNotExist).with_absent(vec![start_file]);
        };

        let snap_radius_m = self.snap_radius_m;
        let graph = self.graph_for(region);
        let Some(from) = graph.snap(start, snap_radius_m).first().copied() else {
            return RouterOutcome::failure(ResultCode::StartPointNotFound);
        };
        let Some(to) = graph.snap(finish, snap_radius_m).first().copied() else {
            return RouterOutcome::failure(ResultCode::EndPointNotFound);
        };

        let path = if from.pos == to.pos {
            // Same segment: walk it in whichever direction leads to the finish.
            vec![if from.t <= to.t { from.pos } else { from.pos.reversed() }]
        } else {
            match search(graph, &from, &to, delegate, visited) {
                Ok(Some(path)) => path,
                Ok(None) => return RouterOutcome::failure(ResultCode::RouteNotFound),
                Err(code) => return RouterOutcome::failure(code),
            }
        };

        let route = match graph.reconstruct_between(&path, from.point, to.point, RouterType::Pedestrian) {
            Ok(route) => route,
            Err(e) => {
                warn!(error = %e, "pedestrian path lost geometry");
                return RouterOutcome::failure(ResultCode::RouteNotFound);
            }
        };
        match require_valid(route) {
            Ok(route) => RouterOutcome::success(route),
            Err(code) => RouterOutcome::failure(code),
        }
    }
}

impl Router for PedestrianRouter {
    fn router_type(&self) -> RouterType {
        RouterType::Pedestrian
    }

    fn compute_route(&mut self, start: GeoPoint, finish: GeoPoint, delegate: &RouterDelegate) -> RouterOutcome {
        let started = Instant::now();
        let mut visited = 0u64;
        let outcome = self.route(start, finish, delegate, &mut visited);
        let stats = RouterStats {
            visited,
            elapsed: started.elapsed(),
            cache:   self.graph.as_ref().map(CachedRoadGraph::stats),
        };
        debug!(
            code       = %outcome.code,
            visited,
            miss_ratio = self.graph.as_ref().map_or(0.0, CachedRoadGraph::miss_ratio),
            "pedestrian route computed",
        );
        outcome.with_stats(stats)
    }

    fn soft_reset(&mut self) {
        if let Some(g) = self.graph.as_mut() {
            g.soft_reset();
        }
    }
}

// ── Bidirectional A* ──────────────────────────────────────────────────────────

fn search(
    graph:    &mut CachedRoadGraph,
    from:     &Snap,
    to:       &Snap,
    delegate: &RouterDelegate,
    visited:  &mut u64,
) -> Result<Option<Vec<RoadPosition>>, ResultCode> {
    let max_mps = graph.max_speed_kmh() / 3.6;
    let mut fwd = Frontier::new(to.point);
    let mut bwd = Frontier::new(from.point);

    // Seeds cost only the part of their segment between the snapped point
    // and the vertex they lead to.
    for (pos, share) in [(from.pos, 1.0 - from.t), (from.pos.reversed(), from.t)] {
        if let Some(c) = graph.position_secs(pos) {
            let g = c * share;
            let h = heuristic(graph, pos, true, fwd.goal, max_mps);
            fwd.g.insert(pos, g);
            fwd.queue.push(QueueEntry { f: g + h, g, pos });
        }
    }
    for (pos, share) in [(to.pos, to.t), (to.pos.reversed(), 1.0 - to.t)] {
        if let Some(c) = graph.position_secs(pos) {
            let g = c * share;
            let h = heuristic(graph, pos, false, bwd.goal, max_mps);
            bwd.g.insert(pos, g);
            bwd.queue.push(QueueEntry { f: g + h, g, pos });
        }
    }

    // Progress: how far the forward frontier has closed the straight-line gap.
    let total_h = from.point.distance_m(to.point) / max_mps;
    let mut remaining_h = total_h;

    let mut best = f64::INFINITY;
    let mut meet: Option<RoadPosition> = None;

    loop {
        let (min_f, min_b) = (fwd.min_f(), bwd.min_f());
        if min_f >= best || min_b >= best || (min_f.is_infinite() && min_b.is_infinite()) {
            break;
        }
        let forward = fwd.queue.len() <= bwd.queue.len() && !min_f.is_infinite() || min_b.is_infinite();
        let (this, other) = if forward { (&mut fwd, &bwd) } else { (&mut bwd, &fwd) };
        let Some(entry) = this.queue.pop() else { break };

        *visited += 1;
        if *visited % POLL_INTERVAL == 0 {
            if let Some(code) = delegate.interrupt() {
                return Err(code);
            }
            if total_h > 0.0 {
                delegate.report_progress((100.0 * (1.0 - remaining_h / total_h)) as f32);
            }
        }
        if forward {
            remaining_h = remaining_h.min(entry.f - entry.g);
        }

        if this.g.get(&entry.pos).is_some_and(|&g| entry.g > g) {
            continue;
        }

        let neighbours = if forward { graph.possible_turns(entry.pos) } else { graph.incoming_turns(entry.pos) };
        for (next, cost) in neighbours {
            let g = entry.g + cost;
            if this.g.get(&next).is_some_and(|&old| g >= old) {
                continue;
            }
            this.g.insert(next, g);
            this.parent.insert(next, entry.pos);
            if let Some(&g_other) = other.g.get(&next) {
                let through = g + g_other - cost;
                if through < best {
                    best = through;
                    meet = Some(next);
                }
            }
            let h = heuristic(graph, next, forward, this.goal, max_mps);
            this.queue.push(QueueEntry { f: g + h, g, pos: next });
        }

        if let Some(&g_other) = other.g.get(&entry.pos) {
            let own = graph.position_secs(entry.pos).unwrap_or(0.0);
            let through = entry.g + g_other - own;
            if through < best {
                best = through;
                meet = Some(entry.pos);
            }
        }
    }

    let Some(meet) = meet else {
        return Ok(None);
    };
    debug!(cost_s = best, visited = *visited, "pedestrian search met");

    let mut path = vec![meet];
    let mut cur = meet;
    while let Some(&p) = fwd.parent.get(&cur) {
        path.push(p);
        cur = p;
    }
    path.reverse();
    let mut cur = meet;
    while let Some(&n) = bwd.parent.get(&cur) {
        path.push(n);
        cur = n;
    }
    Ok(Some(path))
}

/// Straight-line time from the far end of `pos` (its end for the forward
/// half, its start for the backward half) to `goal`.
fn heuristic(graph: &mut CachedRoadGraph, pos: RoadPosition, forward: bool, goal: GeoPoint, max_mps: f64) -> f64 {
    match graph.position_points(pos) {
        Some((a, b)) => (if forward { b } else { a }).distance_m(goal) / max_mps,
        None => 0.0,
    }
}
