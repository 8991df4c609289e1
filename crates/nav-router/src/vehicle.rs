//! Vehicle router over per-region contraction-hierarchy indexes.
//!
//! Start and finish are projected onto the nearest routable segment of
//! their region's index.  The search leaves the start segment through
//! whichever end nodes its direction allows and reaches the finish segment
//! the same way, paying only the partial segment costs; the route is then
//! trimmed to the two projections.  When both points share a segment and
//! driving along it is cheapest, no search result is used at all.

use std::iter;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use nav_core::{GeoPoint, ResultCode, Route, RouterType};
use nav_graph::assemble_route;

use crate::absent::AbsentFileResolver;
use crate::catalog::{FileCatalog, RoutingExtension, MIN_ROUTING_FORMAT};
use crate::delegate::{RouterDelegate, RouterOutcome, RouterStats};
use crate::index::{EdgeSnap, IndexPath, RoutingIndex};
use crate::region::RegionResolver;
use crate::router::{require_valid, Router};
use crate::select::FeasibilityProbe;

/// Default distance within which a query point must find a road segment.
pub const DEFAULT_VEHICLE_SNAP_M: f64 = 1_000.0;

/// Why a region file cannot serve vehicle routing.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FileProblem {
    /// Not downloaded, or downloaded without routing data.
    Absent,
    TooOld,
    Inconsistent,
}

fn usable_extension(catalog: &dyn FileCatalog, name: &str) -> Result<RoutingExtension, FileProblem> {
    let file = catalog.local_file(name).ok_or(FileProblem::Absent)?;
    let ext = file.routing.clone().ok_or(FileProblem::Absent)?;
    if ext.format < MIN_ROUTING_FORMAT {
        return Err(FileProblem::TooOld);
    }
    if ext.data_version != file.map_version {
        return Err(FileProblem::Inconsistent);
    }
    Ok(ext)
}

/// Cheap vehicle feasibility check: both files resolve, are present with a
/// usable routing extension, and are either the same file or both allow
/// cross-region routes.  No search is run.
pub fn check_routing_ability(
    resolver: &dyn RegionResolver,
    catalog:  &dyn FileCatalog,
    start:    GeoPoint,
    finish:   GeoPoint,
) -> bool {
    let (Some(a), Some(b)) = (resolver.file_at(start), resolver.file_at(finish)) else {
        return false;
    };
    let (Ok(ea), Ok(eb)) = (usable_extension(catalog, &a), usable_extension(catalog, &b)) else {
        return false;
    };
    a == b || (ea.index.supports_cross_region() && eb.index.supports_cross_region())
}

/// [`FeasibilityProbe`] answering with [`check_routing_ability`].  Shares
/// the resolver and catalog with the vehicle router but no search state.
#[derive(Clone)]
pub struct RoutingFilesProbe {
    resolver: Arc<dyn RegionResolver>,
    catalog:  Arc<dyn FileCatalog>,
}

impl RoutingFilesProbe {
    pub fn new(resolver: Arc<dyn RegionResolver>, catalog: Arc<dyn FileCatalog>) -> Self {
        Self { resolver, catalog }
    }
}

impl FeasibilityProbe for RoutingFilesProbe {
    fn can_route(&self, start: GeoPoint, finish: GeoPoint) -> bool {
        check_routing_ability(self.resolver.as_ref(), self.catalog.as_ref(), start, finish)
    }
}

// ── VehicleRouter ─────────────────────────────────────────────────────────────

pub struct VehicleRouter {
    resolver:      Arc<dyn RegionResolver>,
    catalog:       Arc<dyn FileCatalog>,
    absent:        Box<dyn AbsentFileResolver>,
    snap_radius_m: f64,
}

impl VehicleRouter {
    pub fn new(
        resolver: Arc<dyn RegionResolver>,
        catalog:  Arc<dyn FileCatalog>,
        absent:   Box<dyn AbsentFileResolver>,
    ) -> Self {
        Self { resolver, catalog, absent, snap_radius_m: DEFAULT_VEHICLE_SNAP_M }
    }

    pub fn with_snap_radius(mut self, radius_m: f64) -> Self {
        self.snap_radius_m = radius_m;
        self
    }

    pub fn check_routing_ability(&self, start: GeoPoint, finish: GeoPoint) -> bool {
        check_routing_ability(self.resolver.as_ref(), self.catalog.as_ref(), start, finish)
    }

    fn route(&self, start: GeoPoint, finish: GeoPoint, delegate: &RouterDelegate, visited: &mut u64) -> RouterOutcome {
        let Some(start_file) = self.resolver.file_at(start) else {
            return RouterOutcome::failure(ResultCode::StartPointNotFound);
        };
        let Some(finish_file) = self.resolver.file_at(finish) else {
            return RouterOutcome::failure(ResultCode::EndPointNotFound);
        };

        let mut files = vec![start_file.clone()];
        if finish_file != start_file {
            files.push(finish_file.clone());
        }

        let mut missing = Vec::new();
        let mut extensions = Vec::with_capacity(files.len());
        for name in &files {
            match usable_extension(self.catalog.as_ref(), name) {
                Ok(ext) => extensions.push(ext),
                Err(FileProblem::Absent) => missing.push(name.clone()),
                Err(FileProblem::TooOld) => {
                    return RouterOutcome::failure(ResultCode::FileTooOld).with_absent(vec![name.clone()]);
                }
                Err(FileProblem::Inconsistent) => {
                    return RouterOutcome::failure(ResultCode::InconsistentRegionAndRoute)
                        .with_absent(vec![name.clone()]);
                }
            }
        }
        if !missing.is_empty() {
            for name in self.absent.absent_files(start, finish, &[]) {
                if !missing.contains(&name) {
                    missing.push(name);
                }
            }
            debug!(files = ?missing, "routing files absent");
            return RouterOutcome::failure(ResultCode::RouteFileNotExist).with_absent(missing);
        }

        let from = &extensions[0].index;
        let to = &extensions[extensions.len() - 1].index;
        let Some(s) = from.snap(start, self.snap_radius_m) else {
            return RouterOutcome::failure(ResultCode::StartPointNotFound);
        };
        let Some(t) = to.snap(finish, self.snap_radius_m) else {
            return RouterOutcome::failure(ResultCode::EndPointNotFound);
        };
        debug!(start_off_m = s.distance_m, finish_off_m = t.distance_m, "snapped to road segments");
        delegate.report_progress(0.0);

        let route = if extensions.len() == 1 {
            let found = match from.query_between(&s.exits(), &t.entries(), delegate, visited) {
                Ok(found) => found,
                Err(code) => return RouterOutcome::failure(code),
            };
            match (s.direct_cost_ms(&t), found) {
                (Some(direct), found) if found.as_ref().is_none_or(|p| direct <= p.cost_ms) => {
                    assemble_route(RouterType::Vehicle, [(s.feature, s.point, t.point)])
                }
                (_, Some(path)) => path_route(&s, &t, &[(&**from, path)]),
                (_, None) => return RouterOutcome::failure(ResultCode::RouteNotFound),
            }
        } else {
            if !(from.supports_cross_region() && to.supports_cross_region()) {
                return RouterOutcome::failure(ResultCode::PointsInDifferentRegion);
            }
            match cross_region(from, to, &s, &t, delegate, visited) {
                Ok(Some((a, b))) => path_route(&s, &t, &[(&**from, a), (&**to, b)]),
                Ok(None) => return RouterOutcome::failure(ResultCode::RouteNotFound),
                Err(code) => return RouterOutcome::failure(code),
            }
        };
        delegate.report_progress(100.0);

        let route = match require_valid(route) {
            Ok(r) => r,
            Err(code) => return RouterOutcome::failure(code),
        };

        let absent = self.absent.absent_files(start, finish, route.points());
        if absent.is_empty() {
            RouterOutcome::success(route)
        } else {
            info!(files = ?absent, "route needs more maps");
            RouterOutcome { code: ResultCode::NeedMoreMaps, ..RouterOutcome::success(route) }.with_absent(absent)
        }
    }
}

/// Best route leaving `from`'s region through a border node shared with
/// `to`'s region.
fn cross_region(
    from:     &RoutingIndex,
    to:       &RoutingIndex,
    s:        &EdgeSnap,
    t:        &EdgeSnap,
    delegate: &RouterDelegate,
    visited:  &mut u64,
) -> Result<Option<(IndexPath, IndexPath)>, ResultCode> {
    let border = from.border_nodes(to);
    debug!(from = %from.region(), to = %to.region(), border = border.len(), "cross-region search");

    let (exits, entries) = (s.exits(), t.entries());
    let mut best: Option<(u64, IndexPath, IndexPath)> = None;
    for (i, &(here, there)) in border.iter().enumerate() {
        let Some(a) = from.query_between(&exits, &[(here, 0)], delegate, visited)? else { continue };
        if best.as_ref().is_some_and(|(c, ..)| a.cost_ms >= *c) {
            continue;
        }
        let Some(b) = to.query_between(&[(there, 0)], &entries, delegate, visited)? else { continue };
        let total = a.cost_ms + b.cost_ms;
        if best.as_ref().is_none_or(|(c, ..)| total < *c) {
            best = Some((total, a, b));
        }
        delegate.report_progress(100.0 * (i + 1) as f32 / border.len() as f32);
    }
    Ok(best.map(|(_, a, b)| (a, b)))
}

/// Route geometry: the partial start segment, every unpacked leg, then the
/// partial finish segment.
fn path_route(start: &EdgeSnap, finish: &EdgeSnap, legs: &[(&RoutingIndex, IndexPath)]) -> Route {
    let first = legs
        .first()
        .and_then(|(index, path)| path.nodes.first().map(|&n| index.node_pos(n)))
        .unwrap_or(start.point);
    let last = legs
        .last()
        .and_then(|(index, path)| path.nodes.last().map(|&n| index.node_pos(n)))
        .unwrap_or(finish.point);
    let inner = legs.iter().flat_map(|(index, path)| {
        path.nodes
            .windows(2)
            .zip(&path.features)
            .map(move |(w, &f)| (f, index.node_pos(w[0]), index.node_pos(w[1])))
    });
    let segments = iter::once((start.feature, start.point, first))
        .chain(inner)
        .chain(iter::once((finish.feature, last, finish.point)));
    assemble_route(RouterType::Vehicle, segments)
}

impl Router for VehicleRouter {
    fn router_type(&self) -> RouterType {
        RouterType::Vehicle
    }

    fn compute_route(&mut self, start: GeoPoint, finish: GeoPoint, delegate: &RouterDelegate) -> RouterOutcome {
        let started = Instant::now();
        let mut visited = 0u64;
        let outcome = self.route(start, finish, delegate, &mut visited);
        let stats = RouterStats { visited, elapsed: started.elapsed(), cache: None };
        debug!(code = %outcome.code, visited, elapsed_ms = stats.elapsed.as_millis() as u64, "vehicle route computed");
        outcome.with_stats(stats)
    }
}
