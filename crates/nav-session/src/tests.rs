//! Unit tests for nav-session.
//!
//! The session is driven with a scripted router whose behaviour depends on
//! the requested finish point (or, for rebuilds, the start latitude), so
//! every state transition can be reached deterministically.

#[cfg(test)]
mod helpers {
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    use nav_core::{GeoPoint, RegionId, ResultCode, Route, RouterType};
    use nav_graph::MemoryFeatureStore;
    use nav_router::{BoxRegionResolver, LocalRegionFile, MemoryCatalog, Router, RouterDelegate, RouterOutcome};

    use crate::{
        BuildResult, BuildStats, MemoryPreferences, RoutingListener, RoutingSession, SessionBuilder, SessionConfig,
    };

    pub const ALPHA: RegionId = RegionId(1);
    pub const GAMMA: RegionId = RegionId(3);
    pub const DELTA: RegionId = RegionId(4);

    pub const START: GeoPoint = GeoPoint::new(0.001, 0.001);
    pub const FINISH: GeoPoint = GeoPoint::new(0.001, 0.011);
    /// Search runs until cancelled or timed out.
    pub const BLOCK: GeoPoint = GeoPoint::new(0.002, 0.002);
    /// Search "succeeds" with a single point.
    pub const SINGLE: GeoPoint = GeoPoint::new(0.003, 0.003);
    /// Two files missing: `delta` (map present) and `gamma` (nothing local).
    pub const ABSENT: GeoPoint = GeoPoint::new(0.004, 0.004);
    /// `alpha` is too old.
    pub const OLD: GeoPoint = GeoPoint::new(0.005, 0.005);
    /// Route found, `gamma` missing along the way.
    pub const MORE: GeoPoint = GeoPoint::new(0.006, 0.006);
    /// Search fails outright.
    pub const FAIL: GeoPoint = GeoPoint::new(0.007, 0.007);
    /// Searches starting north of this latitude find no road.
    pub const NO_ROAD_LAT: f64 = 0.015;
    /// Searches starting south of this latitude run until cancelled.
    pub const STALL_LAT: f64 = -0.015;

    pub const WAIT: Duration = Duration::from_secs(10);

    fn names(files: &[&str]) -> Vec<String> {
        files.iter().map(|s| s.to_string()).collect()
    }

    pub struct ScriptedRouter(pub RouterType);

    impl Router for ScriptedRouter {
        fn router_type(&self) -> RouterType {
            self.0
        }

        fn compute_route(&mut self, start: GeoPoint, finish: GeoPoint, delegate: &RouterDelegate) -> RouterOutcome {
            if finish == BLOCK || start.lat < STALL_LAT {
                let give_up = Instant::now() + WAIT;
                while Instant::now() < give_up {
                    if let Some(code) = delegate.interrupt() {
                        return RouterOutcome::failure(code);
                    }
                    thread::sleep(Duration::from_millis(1));
                }
                return RouterOutcome::failure(ResultCode::InternalError);
            }
            if finish == SINGLE {
                return RouterOutcome::success(Route::new(self.0, vec![start], &[]));
            }
            if finish == ABSENT {
                return RouterOutcome::failure(ResultCode::RouteFileNotExist).with_absent(names(&["delta", "gamma"]));
            }
            if finish == OLD {
                return RouterOutcome::failure(ResultCode::FileTooOld).with_absent(names(&["alpha"]));
            }
            if finish == FAIL || start.lat > NO_ROAD_LAT {
                return RouterOutcome::failure(ResultCode::RouteNotFound);
            }
            delegate.report_progress(50.0);
            let route = Route::new(self.0, vec![start, finish], &[1]);
            if finish == MORE {
                return RouterOutcome { code: ResultCode::NeedMoreMaps, ..RouterOutcome::success(route) }
                    .with_absent(names(&["gamma"]));
            }
            RouterOutcome::success(route)
        }
    }

    #[derive(Default)]
    pub struct Log {
        pub results:  Vec<BuildResult>,
        pub progress: Vec<f32>,
        pub stats:    Vec<BuildStats>,
    }

    #[derive(Clone, Default)]
    pub struct Recorder(pub Arc<Mutex<Log>>);

    impl Recorder {
        pub fn results(&self) -> Vec<BuildResult> {
            self.0.lock().unwrap().results.clone()
        }
    }

    impl RoutingListener for Recorder {
        fn on_route_built(&mut self, result: &BuildResult) {
            self.0.lock().unwrap().results.push(result.clone());
        }

        fn on_progress(&mut self, percent: f32) {
            self.0.lock().unwrap().progress.push(percent);
        }

        fn on_statistics(&mut self, stats: &BuildStats) {
            self.0.lock().unwrap().stats.push(*stats);
        }
    }

    /// alpha and delta are downloaded without routing data; gamma is not.
    pub fn builder(recorder: &Recorder) -> SessionBuilder {
        let mut resolver = BoxRegionResolver::new();
        resolver
            .add("alpha", ALPHA, GeoPoint::new(-0.01, -0.01), GeoPoint::new(0.05, 0.05))
            .add("gamma", GAMMA, GeoPoint::new(0.05, -0.01), GeoPoint::new(0.1, 0.05))
            .add("delta", DELTA, GeoPoint::new(0.05, 0.05), GeoPoint::new(0.1, 0.1));
        let catalog = MemoryCatalog::new();
        for (name, region) in [("alpha", ALPHA), ("delta", DELTA)] {
            catalog.insert(LocalRegionFile { name: name.into(), region, map_version: 1, routing: None });
        }
        SessionBuilder::new(Arc::new(MemoryFeatureStore::empty()), Arc::new(resolver), Arc::new(catalog))
            .listener(Box::new(recorder.clone()))
            .vehicle_router(Box::new(ScriptedRouter(RouterType::Vehicle)))
            .pedestrian_router(Box::new(ScriptedRouter(RouterType::Pedestrian)))
    }

    pub fn session() -> (RoutingSession, Recorder) {
        let recorder = Recorder::default();
        (builder(&recorder).build().unwrap(), recorder)
    }

    pub fn session_with(config: SessionConfig, prefs: MemoryPreferences) -> (RoutingSession, Recorder) {
        let recorder = Recorder::default();
        (builder(&recorder).config(config).preferences(Box::new(prefs)).build().unwrap(), recorder)
    }

    /// A session with a built route.
    pub fn ready() -> (RoutingSession, Recorder) {
        let (mut s, rec) = session();
        s.build_route(START, FINISH, Duration::ZERO).unwrap();
        assert!(s.wait_idle(WAIT).unwrap());
        (s, rec)
    }
}

// ── Builds ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod builds {
    use std::time::Duration;

    use nav_core::{ResultCode, RouterType};

    use super::helpers::*;
    use crate::{PreferenceStore, SessionState, ROUTER_PREFERENCE_KEY};

    #[test]
    fn success_makes_session_ready() {
        let (mut s, rec) = session();
        assert_eq!(s.state(), SessionState::Idle);
        s.build_route(START, FINISH, Duration::ZERO).unwrap();
        assert_eq!(s.state(), SessionState::Building);
        assert!(s.is_build_pending());
        assert!(s.wait_idle(WAIT).unwrap());

        assert_eq!(s.state(), SessionState::Ready);
        let route = s.route().unwrap();
        assert_eq!(route.points(), &[START, FINISH]);
        let results = rec.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].code, ResultCode::NoError);
        assert_eq!(results[0].route.as_deref(), Some(route.as_ref()));
    }

    #[test]
    fn progress_and_statistics_reach_listener() {
        let (_s, rec) = ready();
        let log = rec.0.lock().unwrap();
        assert_eq!(log.progress, vec![50.0]);
        assert_eq!(log.stats.len(), 1);
        assert_eq!(log.stats[0].router, RouterType::Vehicle);
        assert_eq!(log.stats[0].code, ResultCode::NoError);
        assert!(log.stats[0].route_len_m.is_some_and(|m| m > 1_000.0));
    }

    #[test]
    fn failure_returns_to_idle() {
        let (mut s, rec) = session();
        s.build_route(START, FAIL, Duration::ZERO).unwrap();
        assert!(s.wait_idle(WAIT).unwrap());
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.route().is_none());
        assert_eq!(rec.results()[0].code, ResultCode::RouteNotFound);
    }

    #[test]
    fn single_point_route_is_not_found() {
        let (mut s, rec) = session();
        s.build_route(START, SINGLE, Duration::ZERO).unwrap();
        assert!(s.wait_idle(WAIT).unwrap());
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.route().is_none());
        let r = &rec.results()[0];
        assert_eq!(r.code, ResultCode::RouteNotFound);
        assert!(r.route.is_none());
    }

    #[test]
    fn timeout_is_terminal_failure() {
        let (mut s, rec) = session();
        s.build_route(START, BLOCK, Duration::from_millis(20)).unwrap();
        assert!(s.wait_idle(WAIT).unwrap());
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(rec.results()[0].code, ResultCode::RouteNotFound);
    }

    #[test]
    fn superseded_build_is_never_reported() {
        let (mut s, rec) = session();
        let first = s.build_route(START, BLOCK, Duration::ZERO).unwrap();
        let second = s.build_route(START, FINISH, Duration::ZERO).unwrap();
        assert_ne!(first, second);
        assert!(s.wait_idle(WAIT).unwrap());
        // Drain anything the cancelled build may still post.
        while s.wait_event(Duration::from_millis(50)).unwrap() {}

        let results = rec.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].code, ResultCode::NoError);
        assert!(results.iter().all(|r| r.code != ResultCode::Cancelled));
        assert_eq!(s.state(), SessionState::Ready);
    }

    #[test]
    fn new_build_drops_current_route() {
        let (mut s, _rec) = ready();
        s.build_route(START, BLOCK, Duration::ZERO).unwrap();
        assert!(s.route().is_none());
        assert_eq!(s.state(), SessionState::Building);
        s.close_routing().unwrap();
    }

    #[test]
    fn need_more_maps_keeps_route() {
        let (mut s, rec) = session();
        s.build_route(START, MORE, Duration::ZERO).unwrap();
        assert!(s.wait_idle(WAIT).unwrap());
        assert_eq!(s.state(), SessionState::Ready);
        let r = &rec.results()[0];
        assert_eq!(r.code, ResultCode::NeedMoreMaps);
        assert!(r.route.is_some());
        assert_eq!(r.absent_maps, vec![GAMMA]);
        assert!(r.absent_routing.is_empty());
    }

    #[test]
    fn absent_files_are_classified() {
        let (mut s, rec) = session();
        s.build_route(START, ABSENT, Duration::ZERO).unwrap();
        assert!(s.wait_idle(WAIT).unwrap());
        let r = &rec.results()[0];
        assert_eq!(r.code, ResultCode::RouteFileNotExist);
        assert_eq!(r.absent_routing, vec![DELTA]);
        assert_eq!(r.absent_maps, vec![GAMMA]);
    }

    #[test]
    fn too_old_files_count_as_maps() {
        let (mut s, rec) = session();
        s.build_route(START, OLD, Duration::ZERO).unwrap();
        assert!(s.wait_idle(WAIT).unwrap());
        let r = &rec.results()[0];
        assert_eq!(r.code, ResultCode::FileTooOld);
        assert_eq!(r.absent_maps, vec![ALPHA]);
        assert!(r.absent_routing.is_empty());
    }

    #[test]
    fn build_from_current_needs_a_fix() {
        let (mut s, rec) = session();
        assert_eq!(s.build_route_from_current(FINISH, Duration::ZERO).unwrap(), None);
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(rec.results()[0].code, ResultCode::NoCurrentPosition);

        s.on_location(nav_follow::LocationFix::new(START)).unwrap();
        assert!(s.build_route_from_current(FINISH, Duration::ZERO).unwrap().is_some());
        assert!(s.wait_idle(WAIT).unwrap());
        assert_eq!(s.route().unwrap().start(), Some(START));
    }

    #[test]
    fn build_remembers_router() {
        let (mut s, _rec) = session();
        s.set_active_router(RouterType::Pedestrian).unwrap();
        s.build_route(START, FINISH, Duration::ZERO).unwrap();
        assert!(s.wait_idle(WAIT).unwrap());
        assert_eq!(s.prefs.get(ROUTER_PREFERENCE_KEY).as_deref(), Some("pedestrian"));
        assert_eq!(s.route().unwrap().router_type(), RouterType::Pedestrian);
    }
}

// ── Router switching and selection ────────────────────────────────────────────

#[cfg(test)]
mod routers {
    use std::time::Duration;

    use nav_core::{GeoPoint, RouterType, RoutingSettings};

    use super::helpers::*;
    use crate::{MemoryPreferences, SessionConfig, SessionError, ROUTER_PREFERENCE_KEY};

    #[test]
    fn switch_rejected_while_building() {
        let (mut s, _rec) = session();
        s.build_route(START, BLOCK, Duration::ZERO).unwrap();
        assert!(matches!(s.set_active_router(RouterType::Pedestrian), Err(SessionError::BuildInFlight)));
        assert_eq!(s.router_type(), RouterType::Vehicle);
        s.close_routing().unwrap();
        s.set_active_router(RouterType::Pedestrian).unwrap();
        assert_eq!(s.router_type(), RouterType::Pedestrian);
        assert_eq!(*s.settings(), RoutingSettings::pedestrian());
    }

    #[test]
    fn stored_preference_picks_initial_router() {
        let prefs = MemoryPreferences::with(ROUTER_PREFERENCE_KEY, "pedestrian");
        let (s, _rec) = session_with(SessionConfig::default(), prefs);
        assert_eq!(s.router_type(), RouterType::Pedestrian);
        assert_eq!(*s.settings(), RoutingSettings::pedestrian());

        let prefs = MemoryPreferences::with(ROUTER_PREFERENCE_KEY, "hovercraft");
        let config = SessionConfig { default_router: RouterType::Pedestrian, ..SessionConfig::default() };
        let (s, _rec) = session_with(config, prefs);
        assert_eq!(s.router_type(), RouterType::Pedestrian);
    }

    #[test]
    fn short_trip_without_routing_files_walks() {
        let (s, _rec) = session();
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.0, 0.0045);
        assert_eq!(s.select_router(a, b), RouterType::Pedestrian);
        assert_eq!(s.select_router(a, GeoPoint::new(0.0, 0.1)), RouterType::Vehicle);
        assert_eq!(s.router_type(), RouterType::Vehicle);
    }

    #[test]
    fn selection_threshold_comes_from_config() {
        let config = SessionConfig { keep_pedestrian_distance_m: 100.0, ..SessionConfig::default() };
        let (s, _rec) = session_with(config, MemoryPreferences::new());
        assert_eq!(s.select_router(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.0045)), RouterType::Vehicle);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let recorder = Recorder::default();
        let config = SessionConfig { cache_capacity: 0, ..SessionConfig::default() };
        assert!(matches!(builder(&recorder).config(config).build(), Err(SessionError::Config(_))));
    }
}

// ── Following ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod following {
    use std::time::Duration;

    use nav_core::{GeoPoint, ResultCode};
    use nav_follow::LocationFix;

    use super::helpers::*;
    use crate::{MemoryPreferences, SessionConfig, SessionError, SessionState};

    fn off_route_fix(lat: f64) -> LocationFix {
        LocationFix::new(GeoPoint::new(lat, 0.006))
    }

    #[test]
    fn follow_requires_a_ready_route() {
        let (mut s, _rec) = session();
        assert!(matches!(
            s.follow_route(),
            Err(SessionError::InvalidState { op: "follow_route", state: SessionState::Idle })
        ));
        let (mut s, _rec) = ready();
        s.follow_route().unwrap();
        assert_eq!(s.state(), SessionState::Navigating);
    }

    #[test]
    fn matching_reports_progress() {
        let (mut s, _rec) = ready();
        assert_eq!(s.distance_from_begin(), (false, 0.0));
        let m = s.on_location(LocationFix::new(GeoPoint::new(0.001, 0.006))).unwrap().unwrap();
        assert!(m.valid);
        let (has, d) = s.distance_from_begin();
        assert!(has);
        assert!((d - START.distance_m(GeoPoint::new(0.001, 0.006))).abs() < 0.5);
        let remaining = s.remaining_distance_m().unwrap();
        assert!((remaining + d - s.route().unwrap().length_m()).abs() < 1e-6);
        // The finish marker is ~556 m ahead, past the 300 m look-ahead.
        assert!(s.next_turn().is_none());
        s.on_location(LocationFix::new(GeoPoint::new(0.001, 0.009))).unwrap();
        assert_eq!(s.next_turn().unwrap().marker.point_index, 1);
    }

    #[test]
    fn no_matching_without_route() {
        let (mut s, _rec) = session();
        assert_eq!(s.on_location(LocationFix::new(START)).unwrap(), None);
        assert_eq!(s.match_location_to_route(&LocationFix::new(START)).unwrap(), None);
        assert_eq!(s.last_fix().map(|f| f.point), Some(START));
    }

    #[test]
    fn persistent_deviation_rebuilds() {
        let (mut s, rec) = ready();
        s.follow_route().unwrap();
        let old = s.route().unwrap();

        // Two far fixes, then one back on the road: no rebuild.
        s.on_location(off_route_fix(0.002)).unwrap();
        s.on_location(off_route_fix(0.002)).unwrap();
        s.on_location(LocationFix::new(GeoPoint::new(0.001, 0.006))).unwrap();
        assert_eq!(s.state(), SessionState::Navigating);

        for _ in 0..s.settings().deviation_window {
            s.on_location(off_route_fix(0.002)).unwrap();
        }
        assert_eq!(s.state(), SessionState::Rebuilding);
        // The old route stays authoritative while rebuilding.
        assert!(s.on_location(LocationFix::new(GeoPoint::new(0.001, 0.007))).unwrap().is_some_and(|m| m.valid));

        assert!(s.wait_idle(WAIT).unwrap());
        assert_eq!(s.state(), SessionState::Navigating);
        let new = s.route().unwrap();
        assert!(!std::sync::Arc::ptr_eq(&old, &new));
        assert_eq!(new.start(), Some(GeoPoint::new(0.002, 0.006)));
        assert_eq!(new.finish(), old.finish());
        assert_eq!(rec.results().len(), 2);
    }

    #[test]
    fn failed_rebuild_keeps_old_route() {
        let (mut s, rec) = ready();
        s.follow_route().unwrap();
        let old = s.route().unwrap();

        for _ in 0..s.settings().deviation_window {
            s.on_location(off_route_fix(0.02)).unwrap();
        }
        assert_eq!(s.state(), SessionState::Rebuilding);
        assert!(s.wait_idle(WAIT).unwrap());

        assert_eq!(s.state(), SessionState::Navigating);
        assert!(std::sync::Arc::ptr_eq(&old, &s.route().unwrap()));
        let last = rec.results().pop().unwrap();
        assert_eq!(last.code, ResultCode::RouteNotFound);
        assert!(last.route.is_none());
    }

    #[test]
    fn rebuild_honours_timeout() {
        let config = SessionConfig { rebuild_timeout: Duration::from_millis(20), ..SessionConfig::default() };
        let (mut s, rec) = session_with(config, MemoryPreferences::new());
        s.build_route(START, FINISH, Duration::ZERO).unwrap();
        assert!(s.wait_idle(WAIT).unwrap());
        s.follow_route().unwrap();

        for _ in 0..s.settings().deviation_window {
            s.on_location(off_route_fix(-0.02)).unwrap();
        }
        assert_eq!(s.state(), SessionState::Rebuilding);
        assert!(s.wait_idle(WAIT).unwrap());
        assert_eq!(s.state(), SessionState::Navigating);
        assert_eq!(rec.results().last().map(|r| r.code), Some(ResultCode::RouteNotFound));
    }
}

// ── Teardown ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod teardown {
    use std::time::Duration;

    use nav_core::GeoPoint;
    use nav_follow::LocationFix;

    use super::helpers::*;
    use crate::{RoutingSession, SessionError, SessionState};

    fn assert_closed_cleanly(s: &mut RoutingSession, rec: &Recorder) {
        let before = rec.results().len();
        s.close_routing().unwrap();
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.route().is_none());
        assert!(!s.is_build_pending());
        assert_eq!(s.distance_from_begin(), (false, 0.0));
        while s.wait_event(Duration::from_millis(50)).unwrap() {}
        assert_eq!(rec.results().len(), before, "nothing delivered after close");
        assert_eq!(s.state(), SessionState::Idle);
    }

    #[test]
    fn close_from_idle() {
        let (mut s, rec) = session();
        assert_closed_cleanly(&mut s, &rec);
    }

    #[test]
    fn close_mid_build() {
        let (mut s, rec) = session();
        s.build_route(START, BLOCK, Duration::ZERO).unwrap();
        assert_closed_cleanly(&mut s, &rec);
    }

    #[test]
    fn close_when_ready_and_navigating() {
        let (mut s, rec) = ready();
        assert_closed_cleanly(&mut s, &rec);

        let (mut s, rec) = ready();
        s.follow_route().unwrap();
        assert_closed_cleanly(&mut s, &rec);
    }

    #[test]
    fn close_mid_rebuild() {
        let (mut s, rec) = ready();
        s.follow_route().unwrap();
        for _ in 0..s.settings().deviation_window {
            s.on_location(LocationFix::new(GeoPoint::new(-0.02, 0.006))).unwrap();
        }
        assert_eq!(s.state(), SessionState::Rebuilding);
        assert_closed_cleanly(&mut s, &rec);
    }

    #[test]
    fn reset_also_closes() {
        let (mut s, _rec) = ready();
        s.reset().unwrap();
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.route().is_none());
    }

    #[test]
    fn remove_route_returns_to_idle() {
        let (mut s, _rec) = ready();
        s.remove_route().unwrap();
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.route().is_none());
    }

    #[test]
    fn closed_session_rejects_everything() {
        let (mut s, _rec) = ready();
        s.shutdown().unwrap();
        assert_eq!(s.state(), SessionState::Closed);
        assert!(s.route().is_none());
        assert!(matches!(s.build_route(START, FINISH, Duration::ZERO), Err(SessionError::SessionClosed)));
        assert!(matches!(s.close_routing(), Err(SessionError::SessionClosed)));
        assert!(matches!(s.process_events(), Err(SessionError::SessionClosed)));
        assert!(matches!(s.on_location(LocationFix::new(START)), Err(SessionError::SessionClosed)));
        assert!(matches!(s.shutdown(), Err(SessionError::SessionClosed)));
    }
}

// ── Preferences ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod prefs {
    use nav_core::RouterType;

    use crate::{last_used_router, set_last_used_router, MemoryPreferences, PreferenceStore, ROUTER_PREFERENCE_KEY};

    #[test]
    fn router_round_trips_through_store() {
        let prefs = MemoryPreferences::new();
        assert_eq!(last_used_router(&prefs), None);
        set_last_used_router(&prefs, RouterType::Pedestrian);
        assert_eq!(prefs.get(ROUTER_PREFERENCE_KEY).as_deref(), Some("pedestrian"));
        assert_eq!(last_used_router(&prefs), Some(RouterType::Pedestrian));
    }

    #[test]
    fn garbage_is_ignored() {
        let prefs = MemoryPreferences::with(ROUTER_PREFERENCE_KEY, "bicycle");
        assert_eq!(last_used_router(&prefs), None);
    }
}
