//! Unit tests for nav-graph.
//!
//! All tests use hand-crafted features so they run without any map file.

#[cfg(test)]
mod helpers {
    use std::num::NonZeroUsize;
    use std::sync::Arc;

    use nav_core::{FeatureId, GeoPoint, RegionId};

    use crate::{
        CachedRoadGraph, FeatureStoreBuilder, MemoryFeatureStore, RoadClass, RoadFeature,
        VehicleModel, DEFAULT_STREET_READ_SCALE,
    };

    pub const R: RegionId = RegionId(0);

    pub const A: GeoPoint = GeoPoint::new(0.0, 0.0);
    pub const B: GeoPoint = GeoPoint::new(0.0, 0.001);
    pub const C: GeoPoint = GeoPoint::new(0.0, 0.002);
    pub const D: GeoPoint = GeoPoint::new(0.001, 0.002);
    pub const E: GeoPoint = GeoPoint::new(0.001, 0.001);

    /// Features (lat, lon):
    ///
    /// ```text
    ///   E(0.001,0.001)      D(0.001,0.002)
    ///   |  f3               ^  f2 (one-way C→D)
    ///   |                   |
    ///   A ──── B ──── C     (f1: A→B→C, two-way)
    /// ```
    ///
    /// f4 is an isolated footway far away; f5 is a damaged single-point
    /// record sitting on D; f6 is only visible at scale 18.
    pub fn store() -> MemoryFeatureStore {
        let mut b = FeatureStoreBuilder::new();
        b.add_feature(R, RoadFeature::new(FeatureId(1), RoadClass::Residential, false, vec![A, B, C]));
        b.add_feature(R, RoadFeature::new(FeatureId(2), RoadClass::Residential, true, vec![C, D]));
        b.add_feature(R, RoadFeature::new(FeatureId(3), RoadClass::Residential, false, vec![B, E]));
        b.add_feature(
            R,
            RoadFeature::new(
                FeatureId(4),
                RoadClass::Footway,
                false,
                vec![GeoPoint::new(0.01, 0.01), GeoPoint::new(0.01, 0.011)],
            ),
        );
        b.add_feature(R, RoadFeature::new(FeatureId(5), RoadClass::Residential, false, vec![D]));
        let mut detailed = RoadFeature::new(FeatureId(6), RoadClass::Residential, false, vec![E, D]);
        detailed.min_scale = 18;
        b.add_feature(R, detailed);
        b.build()
    }

    pub fn graph_with(model: Box<dyn VehicleModel>, capacity: usize) -> CachedRoadGraph {
        CachedRoadGraph::new(
            Arc::new(store()),
            R,
            model,
            NonZeroUsize::new(capacity).unwrap(),
            DEFAULT_STREET_READ_SCALE,
        )
    }
}

// ── LruCache ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod lru {
    use std::collections::VecDeque;
    use std::num::NonZeroUsize;

    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use crate::LruCache;

    fn cache(cap: usize) -> LruCache<u32, &'static str> {
        LruCache::new(NonZeroUsize::new(cap).unwrap())
    }

    #[test]
    fn evicts_least_recently_inserted_when_untouched() {
        let mut c = cache(2);
        assert_eq!(c.insert(1, "a"), None);
        assert_eq!(c.insert(2, "b"), None);
        assert_eq!(c.insert(3, "c"), Some((1, "a")));
        assert!(!c.contains(&1));
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn get_promotes_entry() {
        let mut c = cache(2);
        c.insert(1, "a");
        c.insert(2, "b");
        assert_eq!(c.get(&1), Some(&"a"));
        assert_eq!(c.insert(3, "c"), Some((2, "b")));
        assert!(c.contains(&1));
    }

    #[test]
    fn peek_does_not_promote() {
        let mut c = cache(2);
        c.insert(1, "a");
        c.insert(2, "b");
        assert_eq!(c.peek(&1), Some(&"a"));
        assert_eq!(c.insert(3, "c"), Some((1, "a")));
    }

    #[test]
    fn replacing_a_key_never_evicts() {
        let mut c = cache(2);
        c.insert(1, "a");
        c.insert(2, "b");
        assert_eq!(c.insert(1, "z"), None);
        assert_eq!(c.peek(&1), Some(&"z"));
        assert_eq!(c.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn capacity_one() {
        let mut c = cache(1);
        c.insert(1, "a");
        assert_eq!(c.insert(2, "b"), Some((1, "a")));
        assert_eq!(c.get(&2), Some(&"b"));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut c = cache(3);
        c.insert(1, "a");
        c.insert(2, "b");
        c.clear();
        assert!(c.is_empty());
        assert_eq!(c.capacity(), 3);
        assert_eq!(c.insert(3, "c"), None);
        assert_eq!(c.keys().count(), 1);
    }

    /// Compare against a naive `VecDeque` model under a random workload.
    #[test]
    fn matches_reference_model() {
        const CAP: usize = 8;
        let mut rng = SmallRng::seed_from_u64(7);
        let mut c: LruCache<u32, u32> = LruCache::new(NonZeroUsize::new(CAP).unwrap());
        // Front = most recently used.
        let mut model: VecDeque<(u32, u32)> = VecDeque::new();

        for step in 0..5_000u32 {
            let key = rng.gen_range(0..20);
            if rng.gen_bool(0.5) {
                let got = c.get(&key).copied();
                let want = model.iter().position(|&(k, _)| k == key).map(|i| {
                    let e = model.remove(i).unwrap();
                    model.push_front(e);
                    e.1
                });
                assert_eq!(got, want, "step {step}");
            } else {
                let evicted = c.insert(key, step);
                let want = if let Some(i) = model.iter().position(|&(k, _)| k == key) {
                    model.remove(i);
                    model.push_front((key, step));
                    None
                } else {
                    model.push_front((key, step));
                    if model.len() > CAP { model.pop_back() } else { None }
                };
                assert_eq!(evicted, want, "step {step}");
            }
            assert!(c.len() <= CAP);
        }
        let keys: Vec<u32> = c.keys().copied().collect();
        let want: Vec<u32> = model.iter().map(|&(k, _)| k).collect();
        assert_eq!(keys, want);
    }
}

// ── Models ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod models {
    use nav_core::{FeatureId, GeoPoint};

    use crate::{CarModel, PedestrianModel, RoadClass, RoadFeature, VehicleModel};

    fn feature(class: RoadClass, oneway: bool) -> RoadFeature {
        RoadFeature::new(FeatureId(0), class, oneway, vec![GeoPoint::new(0.0, 0.0)])
    }

    #[test]
    fn car_skips_footways_and_honours_limits() {
        assert_eq!(CarModel.speed_kmh(&feature(RoadClass::Footway, false)), None);
        let mut primary = feature(RoadClass::Primary, true);
        assert_eq!(CarModel.speed_kmh(&primary), Some(70.0));
        primary.maxspeed_kmh = Some(40.0);
        assert_eq!(CarModel.speed_kmh(&primary), Some(40.0));
        assert!(CarModel.is_oneway(&primary));
    }

    #[test]
    fn car_limit_only_ever_lowers_class_speed() {
        let mut residential = feature(RoadClass::Residential, false);
        residential.maxspeed_kmh = Some(90.0);
        assert_eq!(CarModel.speed_kmh(&residential), Some(30.0));
        residential.maxspeed_kmh = Some(0.0);
        assert_eq!(CarModel.speed_kmh(&residential), Some(30.0));
        residential.maxspeed_kmh = Some(25.5);
        assert_eq!(CarModel.speed_kmh(&residential), Some(25.5));
    }

    #[test]
    fn pedestrian_ignores_oneway_and_motorways() {
        let oneway = feature(RoadClass::Residential, true);
        assert!(!PedestrianModel.is_oneway(&oneway));
        assert_eq!(PedestrianModel.speed_kmh(&feature(RoadClass::Motorway, false)), None);
        assert_eq!(PedestrianModel.speed_kmh(&feature(RoadClass::Steps, false)), Some(2.5));
    }

    #[test]
    fn max_speed_bounds_every_class() {
        let classes = [
            RoadClass::Motorway, RoadClass::Trunk, RoadClass::Primary, RoadClass::Secondary,
            RoadClass::Tertiary, RoadClass::Unclassified, RoadClass::Residential,
            RoadClass::LivingStreet, RoadClass::Service, RoadClass::Track,
            RoadClass::Pedestrian, RoadClass::Footway, RoadClass::Path, RoadClass::Steps,
        ];
        for class in classes {
            let f = feature(class, false);
            for (model, max) in [
                (&CarModel as &dyn VehicleModel, CarModel.max_speed_kmh()),
                (&PedestrianModel as &dyn VehicleModel, PedestrianModel.max_speed_kmh()),
            ] {
                if let Some(s) = model.speed_kmh(&f) {
                    assert!(s <= max, "{class:?}: {s} > {max}");
                }
            }
        }
    }
}

// ── Cache counters ────────────────────────────────────────────────────────────

#[cfg(test)]
mod cache_counters {
    use nav_core::FeatureId;

    use super::helpers::{graph_with, R};
    use crate::{CarModel, PedestrianModel, RoadPosition};

    #[test]
    fn miss_ratio_is_zero_before_any_access() {
        let g = graph_with(Box::new(CarModel), 16);
        assert_eq!(g.stats().accesses, 0);
        assert_eq!(g.miss_ratio(), 0.0);
    }

    #[test]
    fn repeated_turn_query_hits_cache() {
        let mut g = graph_with(Box::new(PedestrianModel), 16);
        let pos = RoadPosition::new(R, FeatureId(4), 0, true);

        assert!(g.possible_turns(pos).is_empty());
        assert!(g.possible_turns(pos).is_empty());

        let s = g.stats();
        assert_eq!(s.accesses, 2);
        assert_eq!(s.misses, 1);
        assert_eq!(g.miss_ratio(), 0.5);
    }

    #[test]
    fn capacity_pressure_evicts() {
        let mut g = graph_with(Box::new(CarModel), 1);
        g.feature(FeatureId(1));
        g.feature(FeatureId(3));
        g.feature(FeatureId(1));
        assert_eq!(g.stats().misses, 3);
        assert_eq!(g.cached_len(), 1);
    }

    #[test]
    fn soft_reset_clears_entries_but_keeps_counters() {
        let mut g = graph_with(Box::new(CarModel), 8);
        g.feature(FeatureId(1));
        g.feature(FeatureId(1));
        g.soft_reset();
        assert_eq!(g.cached_len(), 0);
        assert_eq!(g.stats().accesses, 2);
        g.feature(FeatureId(1));
        assert_eq!(g.stats().misses, 2);
    }

    #[test]
    fn undecodable_feature_is_not_cached() {
        let mut g = graph_with(Box::new(CarModel), 8);
        assert!(g.feature(FeatureId(5)).is_none());
        assert!(g.feature(FeatureId(99)).is_none());
        assert_eq!(g.cached_len(), 0);
        assert_eq!(g.stats().misses, 2);
    }
}

// ── Adjacency ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod turns {
    use nav_core::FeatureId;

    use super::helpers::{graph_with, B, C, R};
    use crate::{CarModel, PedestrianModel, RoadPosition};

    fn pos(f: u32, seg: u32, forward: bool) -> RoadPosition {
        RoadPosition::new(R, FeatureId(f), seg, forward)
    }

    #[test]
    fn turns_at_a_one_way_junction() {
        let mut g = graph_with(Box::new(CarModel), 16);
        // Arriving at C along f1: only the one-way f2 leaves C.
        let turns = g.possible_turns(pos(1, 1, true));
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].0, pos(2, 0, true));
    }

    #[test]
    fn u_turn_is_excluded() {
        let mut g = graph_with(Box::new(CarModel), 16);
        // E→B along f3 reversed: may continue to C or A, not back to E.
        let mut turns: Vec<RoadPosition> = g.possible_turns(pos(3, 0, false)).into_iter().map(|t| t.0).collect();
        turns.sort();
        assert_eq!(turns, vec![pos(1, 0, false), pos(1, 1, true)]);
    }

    #[test]
    fn one_way_dead_end_and_damaged_neighbour() {
        let mut g = graph_with(Box::new(CarModel), 16);
        // At D: f2 cannot be driven backwards; f5 is damaged; f6 is above
        // the read scale.
        assert!(g.possible_turns(pos(2, 0, true)).is_empty());
    }

    #[test]
    fn pedestrians_may_walk_one_ways_backwards() {
        let mut g = graph_with(Box::new(PedestrianModel), 16);
        let turns: Vec<RoadPosition> = g.possible_turns(pos(1, 1, true)).into_iter().map(|t| t.0).collect();
        assert_eq!(turns, vec![pos(2, 0, true)]);
        let back: Vec<RoadPosition> = g.incoming_turns(pos(1, 1, false)).into_iter().map(|t| t.0).collect();
        assert_eq!(back, vec![pos(2, 0, false)]);
    }

    #[test]
    fn incoming_turns_respect_one_way() {
        let mut g = graph_with(Box::new(CarModel), 16);
        let incoming: Vec<RoadPosition> = g.incoming_turns(pos(2, 0, true)).into_iter().map(|t| t.0).collect();
        assert_eq!(incoming, vec![pos(1, 1, true)]);
    }

    #[test]
    fn weight_is_segment_time() {
        let mut g = graph_with(Box::new(CarModel), 16);
        let turns = g.possible_turns(pos(1, 0, true));
        let (_, w) = turns.iter().find(|t| t.0 == pos(1, 1, true)).copied().unwrap();
        let expected = B.distance_m(C) / (30.0 / 3.6);
        assert!((w - expected).abs() < 1e-9, "{w} vs {expected}");
    }
}

// ── Snapping & reconstruction ─────────────────────────────────────────────────

#[cfg(test)]
mod geometry {
    use nav_core::{FeatureId, GeoPoint, RouterType};

    use super::helpers::{graph_with, A, B, C, D, R};
    use crate::{CarModel, GraphError, RoadPosition};

    #[test]
    fn snap_picks_nearest_segment() {
        let mut g = graph_with(Box::new(CarModel), 16);
        let snaps = g.snap(GeoPoint::new(0.0001, 0.0005), 50.0);
        assert!(!snaps.is_empty());
        let best = snaps[0];
        assert_eq!(best.pos, RoadPosition::new(R, FeatureId(1), 0, true));
        assert!((best.distance_m - 11.1).abs() < 0.5, "{}", best.distance_m);
        assert!((best.t - 0.5).abs() < 1e-6);
        assert!(g.snap(GeoPoint::new(0.0001, 0.0005), 5.0).is_empty());
    }

    #[test]
    fn reconstruct_merges_junctions_and_marks_turns() {
        let mut g = graph_with(Box::new(CarModel), 16);
        let path = [
            RoadPosition::new(R, FeatureId(1), 0, true),
            RoadPosition::new(R, FeatureId(1), 1, true),
            RoadPosition::new(R, FeatureId(2), 0, true),
        ];
        let route = g.reconstruct_path(&path, RouterType::Vehicle).unwrap();
        assert_eq!(route.points(), &[A, B, C, D]);
        let turn_points: Vec<usize> = route.turns().iter().map(|t| t.point_index).collect();
        assert_eq!(turn_points, vec![2, 3]);
        assert_eq!(route.router_type(), RouterType::Vehicle);
    }

    #[test]
    fn reconstruct_between_trims_to_snapped_points() {
        let mut g = graph_with(Box::new(CarModel), 16);
        let path = [
            RoadPosition::new(R, FeatureId(1), 0, true),
            RoadPosition::new(R, FeatureId(1), 1, true),
        ];
        let start = GeoPoint::new(0.0, 0.0005);
        let finish = GeoPoint::new(0.0, 0.0015);
        let route = g.reconstruct_between(&path, start, finish, RouterType::Pedestrian).unwrap();
        assert_eq!(route.points(), &[start, B, finish]);
        assert!((route.length_m() - start.distance_m(finish)).abs() < 1e-6);
    }

    #[test]
    fn zero_length_path_yields_single_point() {
        let route = crate::assemble_route(RouterType::Pedestrian, [(FeatureId(1), A, A)]);
        assert_eq!(route.point_count(), 1);
        assert!(!route.is_valid());
    }

    #[test]
    fn reconstruct_fails_on_disconnected_geometry() {
        let mut g = graph_with(Box::new(CarModel), 16);
        let path = [
            RoadPosition::new(R, FeatureId(1), 0, true),
            RoadPosition::new(R, FeatureId(5), 0, true),
        ];
        let err = g.reconstruct_path(&path, RouterType::Vehicle).unwrap_err();
        assert!(matches!(err, GraphError::Disconnected(FeatureId(5))));
    }
}

// ── CSV loader ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod loader {
    use std::io::{Cursor, Write};

    use nav_core::{FeatureId, GeoPoint, RegionId};

    use crate::{load_features_csv, load_features_reader, FeatureStore, GraphError, RoadClass};

    const CSV: &str = "\
region,feature,class,oneway,min_scale,maxspeed_kmh,points\n\
0,1,residential,false,10,,55.75 37.60;55.75 37.61\n\
0,2,primary,true,5,60,55.75 37.61;55.76 37.61;55.76 37.62\n\
3,7,footway,false,17,,55.80 37.70\n\
";

    #[test]
    fn loads_rows_into_regions() {
        let store = load_features_reader(Cursor::new(CSV)).unwrap();
        assert_eq!(store.region_count(), 2);
        let f = store.feature(RegionId(0), FeatureId(2)).unwrap();
        assert_eq!(f.class, RoadClass::Primary);
        assert!(f.oneway);
        assert_eq!(f.maxspeed_kmh, Some(60.0));
        assert_eq!(f.points.len(), 3);
        assert_eq!(store.feature(RegionId(0), FeatureId(1)).unwrap().maxspeed_kmh, None);
        // Single-point rows load; the road graph rejects them later.
        assert_eq!(store.feature(RegionId(3), FeatureId(7)).unwrap().points, vec![GeoPoint::new(55.80, 37.70)]);
    }

    #[test]
    fn rect_query_respects_scale() {
        let store = load_features_reader(Cursor::new(CSV)).unwrap();
        let min = GeoPoint::new(55.74, 37.59);
        let max = GeoPoint::new(55.77, 37.63);
        assert_eq!(store.features_in_rect(RegionId(0), min, max, 17), vec![FeatureId(1), FeatureId(2)]);
        assert_eq!(store.features_in_rect(RegionId(0), min, max, 7), vec![FeatureId(2)]);
        assert_eq!(store.region_features(RegionId(0), 7), vec![FeatureId(2)]);
    }

    #[test]
    fn unknown_class_is_an_error() {
        let csv = "region,feature,class,oneway,min_scale,maxspeed_kmh,points\n0,1,runway,false,1,,0 0;0 1\n";
        let err = load_features_reader(Cursor::new(csv)).err().unwrap();
        assert!(matches!(err, GraphError::UnknownRoadClass(ref c) if c == "runway"));
    }

    #[test]
    fn malformed_point_is_a_parse_error() {
        let csv = "region,feature,class,oneway,min_scale,maxspeed_kmh,points\n0,1,primary,false,1,,0 0;1\n";
        assert!(matches!(load_features_reader(Cursor::new(csv)), Err(GraphError::Parse(_))));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CSV.as_bytes()).unwrap();
        let store = load_features_csv(file.path()).unwrap();
        assert_eq!(store.feature_count(RegionId(0)), 2);
    }
}
