//! Absent-file resolution: which region files does a trip need that the
//! device does not have (or has without routing data)?

use std::sync::Arc;

use tracing::{debug, warn};

use nav_core::GeoPoint;

use crate::{FileCatalog, RegionResolver, RouterResult};

/// Distance between two samples along the trip.
pub const SAMPLE_STEP_M: f64 = 2_000.0;

pub trait AbsentFileResolver: Send {
    /// Region files needed between `start` and `finish` (and along `route`,
    /// when one was found) that are missing locally or lack routing data.
    fn absent_files(&self, start: GeoPoint, finish: GeoPoint, route: &[GeoPoint]) -> Vec<String>;
}

/// Network collaborator answering "which region files does this trip
/// cross?".
pub trait RemoteRegionLookup: Send + Sync {
    fn files_for_trip(&self, start: GeoPoint, finish: GeoPoint) -> RouterResult<Vec<String>>;
}

/// `true` when `name` cannot serve vehicle routing from local data.
pub(crate) fn missing_locally(catalog: &dyn FileCatalog, name: &str) -> bool {
    catalog.local_file(name).is_none_or(|f| !f.has_routing())
}

fn push_unique(list: &mut Vec<String>, name: String) {
    if !list.contains(&name) {
        list.push(name);
    }
}

// ── SamplingAbsentResolver ────────────────────────────────────────────────────

/// Offline resolver: samples the start→finish chord and the route polyline
/// every [`SAMPLE_STEP_M`] and asks the region resolver which file governs
/// each sample.
pub struct SamplingAbsentResolver {
    resolver: Arc<dyn RegionResolver>,
    catalog:  Arc<dyn FileCatalog>,
    step_m:   f64,
}

impl SamplingAbsentResolver {
    pub fn new(resolver: Arc<dyn RegionResolver>, catalog: Arc<dyn FileCatalog>) -> Self {
        Self { resolver, catalog, step_m: SAMPLE_STEP_M }
    }

    pub fn with_step(mut self, step_m: f64) -> Self {
        self.step_m = step_m.max(1.0);
        self
    }

    fn sample_polyline(&self, points: &[GeoPoint], out: &mut Vec<GeoPoint>) {
        let Some(&first) = points.first() else { return };
        out.push(first);
        let mut since_last = 0.0;
        for w in points.windows(2) {
            let len = w[0].distance_m(w[1]);
            let mut at = self.step_m - since_last;
            while at <= len {
                out.push(w[0].lerp(w[1], at / len));
                at += self.step_m;
            }
            since_last = (since_last + len) % self.step_m;
        }
        if let Some(&last) = points.last() {
            out.push(last);
        }
    }
}

impl AbsentFileResolver for SamplingAbsentResolver {
    fn absent_files(&self, start: GeoPoint, finish: GeoPoint, route: &[GeoPoint]) -> Vec<String> {
        let mut samples = Vec::new();
        self.sample_polyline(&[start, finish], &mut samples);
        self.sample_polyline(route, &mut samples);

        let mut absent = Vec::new();
        for p in samples {
            if let Some(name) = self.resolver.file_at(p) {
                if missing_locally(self.catalog.as_ref(), &name) {
                    push_unique(&mut absent, name);
                }
            }
        }
        debug!(count = absent.len(), "sampled absent files");
        absent
    }
}

// ── OnlineAbsentResolver ──────────────────────────────────────────────────────

/// Resolver backed by a [`RemoteRegionLookup`].  A failed lookup is logged
/// and answered by sampling instead.
pub struct OnlineAbsentResolver {
    lookup:   Box<dyn RemoteRegionLookup>,
    catalog:  Arc<dyn FileCatalog>,
    fallback: SamplingAbsentResolver,
}

impl OnlineAbsentResolver {
    pub fn new(
        lookup:   Box<dyn RemoteRegionLookup>,
        resolver: Arc<dyn RegionResolver>,
        catalog:  Arc<dyn FileCatalog>,
    ) -> Self {
        let fallback = SamplingAbsentResolver::new(resolver, Arc::clone(&catalog));
        Self { lookup, catalog, fallback }
    }
}

impl AbsentFileResolver for OnlineAbsentResolver {
    fn absent_files(&self, start: GeoPoint, finish: GeoPoint, route: &[GeoPoint]) -> Vec<String> {
        match self.lookup.files_for_trip(start, finish) {
            Ok(files) => {
                let mut absent = Vec::new();
                for name in files {
                    if missing_locally(self.catalog.as_ref(), &name) {
                        push_unique(&mut absent, name);
                    }
                }
                absent
            }
            Err(e) => {
                warn!(error = %e, "remote region lookup failed; sampling instead");
                self.fallback.absent_files(start, finish, route)
            }
        }
    }
}
