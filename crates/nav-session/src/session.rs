//! The routing session: one state machine, one owner thread.

use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use nav_core::{GeoPoint, RegionId, ResultCode, Route, RouterType, RoutingSettings};
use nav_follow::{DeviationTracker, LocationFix, MatchResult, RouteMatcher, TurnAhead};
use nav_router::{select_router_within, CancelToken, FileCatalog, RegionResolver, RouterOutcome, RoutingFilesProbe};

use crate::prefs::{last_used_router, set_last_used_router};
use crate::worker::{Command, SessionEvent};
use crate::{
    BuildResult, BuildStats, PreferenceStore, RoutingListener, SessionConfig, SessionError, SessionResult,
    SessionState,
};

/// Whether a build starts a trip or repairs one being navigated.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum BuildKind {
    Fresh,
    Rebuild,
}

pub(crate) struct PendingBuild {
    id:      u64,
    kind:    BuildKind,
    cancel:  CancelToken,
    started: Instant,
}

/// Routing session.
///
/// All state lives here and is mutated only by `&mut self` calls on the
/// owner thread.  Builds run on a worker thread; their progress and results
/// queue up in an inbox and take effect when the owner calls
/// [`process_events`](Self::process_events) or
/// [`wait_event`](Self::wait_event).  Construct with
/// [`SessionBuilder`](crate::SessionBuilder).
pub struct RoutingSession {
    pub(crate) config:      SessionConfig,
    pub(crate) state:       SessionState,
    pub(crate) router_type: RouterType,
    pub(crate) settings:    RoutingSettings,
    pub(crate) route:       Option<Arc<Route>>,
    pub(crate) matcher:     RouteMatcher,
    pub(crate) deviation:   DeviationTracker,
    pub(crate) last_fix:    Option<LocationFix>,
    pub(crate) pending:     Option<PendingBuild>,
    pub(crate) next_id:     u64,

    pub(crate) resolver:    Arc<dyn RegionResolver>,
    pub(crate) catalog:     Arc<dyn FileCatalog>,
    pub(crate) probe:       RoutingFilesProbe,
    pub(crate) listener:    Box<dyn RoutingListener>,
    pub(crate) prefs:       Box<dyn PreferenceStore>,

    pub(crate) commands:    Sender<Command>,
    pub(crate) inbox:       Receiver<SessionEvent>,
    pub(crate) worker:      Option<JoinHandle<()>>,
}

impl RoutingSession {
    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The active route, if any.  Replaced wholesale by each build.
    pub fn route(&self) -> Option<Arc<Route>> {
        self.route.clone()
    }

    pub fn router_type(&self) -> RouterType {
        self.router_type
    }

    pub fn settings(&self) -> &RoutingSettings {
        &self.settings
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn last_fix(&self) -> Option<LocationFix> {
        self.last_fix
    }

    pub fn is_build_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn ensure_open(&self) -> SessionResult<()> {
        if self.state == SessionState::Closed { Err(SessionError::SessionClosed) } else { Ok(()) }
    }

    // ── Building ──────────────────────────────────────────────────────────

    /// Start building a route with the active router.
    ///
    /// Any current route is dropped and a build in flight is cancelled; its
    /// result will be suppressed.  `timeout` of zero means none.  Returns the
    /// id of the new build.
    pub fn build_route(&mut self, start: GeoPoint, finish: GeoPoint, timeout: Duration) -> SessionResult<u64> {
        self.ensure_open()?;
        if self.state.has_route() {
            self.drop_route();
        }
        set_last_used_router(self.prefs.as_ref(), self.router_type);
        Ok(self.launch(BuildKind::Fresh, start, finish, timeout))
    }

    /// [`build_route`](Self::build_route) from the last known fix.
    ///
    /// Without a fix the listener receives `NoCurrentPosition` at once,
    /// nothing else changes, and `None` is returned.
    pub fn build_route_from_current(&mut self, finish: GeoPoint, timeout: Duration) -> SessionResult<Option<u64>> {
        self.ensure_open()?;
        match self.last_fix {
            Some(fix) => self.build_route(fix.point, finish, timeout).map(Some),
            None => {
                info!("no current position for route build");
                self.listener.on_route_built(&BuildResult::failure(ResultCode::NoCurrentPosition));
                Ok(None)
            }
        }
    }

    fn launch(&mut self, kind: BuildKind, start: GeoPoint, finish: GeoPoint, timeout: Duration) -> u64 {
        self.cancel_pending();
        let id = self.next_id;
        self.next_id += 1;
        let cancel = CancelToken::new();
        self.state = match kind {
            BuildKind::Fresh => SessionState::Building,
            BuildKind::Rebuild => SessionState::Rebuilding,
        };
        self.pending = Some(PendingBuild { id, kind, cancel: cancel.clone(), started: Instant::now() });
        info!(id, ?kind, router = %self.router_type, %start, %finish, "route build requested");

        if self.commands.send(Command::Build { id, start, finish, timeout, cancel }).is_err() {
            warn!(id, "build worker is gone");
            self.fail_pending(ResultCode::InternalError);
        }
        id
    }

    /// Cancel the build in flight, if any.  Its result will arrive as
    /// `Cancelled` (or late) and be dropped.
    fn cancel_pending(&mut self) {
        if let Some(p) = self.pending.take() {
            debug!(id = p.id, "cancelling superseded build");
            p.cancel.cancel();
        }
    }

    /// Terminate the pending build with `code` without a router result.
    fn fail_pending(&mut self, code: ResultCode) {
        let Some(p) = self.pending.take() else { return };
        self.state = match p.kind {
            BuildKind::Fresh => SessionState::Idle,
            BuildKind::Rebuild => SessionState::Navigating,
        };
        self.listener.on_route_built(&BuildResult::failure(code));
    }

    // ── Router selection ──────────────────────────────────────────────────

    /// Switch router for subsequent builds and load its settings preset.
    /// Rejected while a build is in flight.
    pub fn set_active_router(&mut self, router: RouterType) -> SessionResult<()> {
        self.ensure_open()?;
        if self.pending.is_some() {
            return Err(SessionError::BuildInFlight);
        }
        if router == self.router_type {
            return Ok(());
        }
        if self.commands.send(Command::SetRouter(router)).is_err() {
            warn!(%router, "build worker is gone; router switch not delivered");
        }
        self.router_type = router;
        self.settings = RoutingSettings::for_router(router);
        Ok(())
    }

    /// Router best suited to the trip, given the stored preference and the
    /// local routing files.  Does not change the active router.
    pub fn select_router(&self, start: GeoPoint, finish: GeoPoint) -> RouterType {
        let preference = last_used_router(self.prefs.as_ref());
        select_router_within(self.config.keep_pedestrian_distance_m, start, finish, preference, &self.probe)
    }

    // ── Following ─────────────────────────────────────────────────────────

    /// Start navigating the ready route.
    pub fn follow_route(&mut self) -> SessionResult<()> {
        self.ensure_open()?;
        if self.state != SessionState::Ready {
            return Err(SessionError::InvalidState { op: "follow_route", state: self.state });
        }
        self.deviation.reset();
        self.state = SessionState::Navigating;
        info!("navigation started");
        Ok(())
    }

    /// Feed a location fix.
    ///
    /// The fix is remembered for
    /// [`build_route_from_current`](Self::build_route_from_current).  With a
    /// route it is matched; while
    /// navigating, a deviation that persists over the configured window
    /// starts a rebuild from the fix to the route finish.
    pub fn on_location(&mut self, fix: LocationFix) -> SessionResult<Option<MatchResult>> {
        self.ensure_open()?;
        self.last_fix = Some(fix);
        let Some(m) = self.match_fix(&fix) else { return Ok(None) };

        if self.state == SessionState::Navigating && self.deviation.record(m.distance_m, &self.settings) {
            if let Some(finish) = self.route.as_ref().and_then(|r| r.finish()) {
                info!(distance_m = m.distance_m, fixes = self.deviation.off_route_count(), "off route, rebuilding");
                self.deviation.reset();
                self.launch(BuildKind::Rebuild, fix.point, finish, self.config.rebuild_timeout);
            }
        }
        Ok(Some(m))
    }

    /// Match a fix against the active route without deviation tracking.
    pub fn match_location_to_route(&mut self, fix: &LocationFix) -> SessionResult<Option<MatchResult>> {
        self.ensure_open()?;
        Ok(self.match_fix(fix))
    }

    fn match_fix(&mut self, fix: &LocationFix) -> Option<MatchResult> {
        if !self.state.has_route() {
            return None;
        }
        let route = self.route.as_ref()?;
        self.matcher.match_location(route, fix, &self.settings)
    }

    /// Arc length from the route start to the last matched point.
    pub fn distance_from_begin(&self) -> (bool, f64) {
        if self.route.is_none() {
            return (false, 0.0);
        }
        self.matcher.distance_from_begin()
    }

    /// Next turn within the settings' look-ahead distance.
    pub fn next_turn(&self) -> Option<TurnAhead> {
        self.matcher.next_turn(self.route.as_ref()?, self.settings.turn_lookahead_m)
    }

    pub fn remaining_distance_m(&self) -> Option<f64> {
        self.matcher.remaining_distance_m(self.route.as_ref()?)
    }

    // ── Teardown ──────────────────────────────────────────────────────────

    /// Cancel any build, drop the route, return to `Idle`.
    pub fn close_routing(&mut self) -> SessionResult<()> {
        self.ensure_open()?;
        self.cancel_pending();
        self.drop_route();
        self.state = SessionState::Idle;
        debug!("routing closed");
        Ok(())
    }

    /// [`close_routing`](Self::close_routing) plus a soft reset of router
    /// caches.  Call after map files changed.
    pub fn reset(&mut self) -> SessionResult<()> {
        self.close_routing()?;
        if self.commands.send(Command::SoftReset).is_err() {
            warn!("build worker is gone; cache reset not delivered");
        }
        Ok(())
    }

    /// Drop the route.  A session holding one returns to `Idle`; a build in
    /// progress is unaffected.
    pub fn remove_route(&mut self) -> SessionResult<()> {
        self.ensure_open()?;
        if self.state.has_route() {
            self.cancel_pending();
            self.state = SessionState::Idle;
        }
        self.drop_route();
        Ok(())
    }

    fn drop_route(&mut self) {
        self.route = None;
        self.matcher.reset();
        self.deviation.reset();
    }

    /// Stop the worker and close the session for good.
    pub fn shutdown(&mut self) -> SessionResult<()> {
        self.ensure_open()?;
        self.cancel_pending();
        self.drop_route();
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("build worker panicked");
            }
        }
        self.state = SessionState::Closed;
        info!("routing session closed");
        Ok(())
    }

    // ── Event delivery ────────────────────────────────────────────────────

    /// Apply every queued worker event.  Returns how many were handled.
    pub fn process_events(&mut self) -> SessionResult<usize> {
        self.ensure_open()?;
        let mut handled = 0;
        loop {
            match self.inbox.try_recv() {
                Ok(event) => {
                    self.handle(event);
                    handled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.worker_lost();
                    break;
                }
            }
        }
        Ok(handled)
    }

    /// Block up to `timeout` for one worker event and apply it.  Returns
    /// `false` when nothing arrived.
    pub fn wait_event(&mut self, timeout: Duration) -> SessionResult<bool> {
        self.ensure_open()?;
        match self.inbox.recv_timeout(timeout) {
            Ok(event) => {
                self.handle(event);
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => {
                self.worker_lost();
                Ok(false)
            }
        }
    }

    /// Wait until no build is pending, handling events as they arrive.
    /// Returns `false` if `timeout` passed first.
    pub fn wait_idle(&mut self, timeout: Duration) -> SessionResult<bool> {
        let deadline = Instant::now() + timeout;
        while self.pending.is_some() {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Ok(false);
            }
            self.wait_event(left)?;
        }
        Ok(true)
    }

    fn worker_lost(&mut self) {
        if self.pending.is_some() {
            warn!("build worker disconnected with a build in flight");
            self.fail_pending(ResultCode::InternalError);
        }
    }

    fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Progress { id, percent } => {
                if self.pending.as_ref().is_some_and(|p| p.id == id) {
                    self.listener.on_progress(percent);
                }
            }
            SessionEvent::Built { id, router, outcome } => self.on_built(id, router, outcome),
        }
    }

    fn on_built(&mut self, id: u64, router: RouterType, outcome: RouterOutcome) {
        if !self.pending.as_ref().is_some_and(|p| p.id == id) {
            debug!(id, code = %outcome.code, "suppressing superseded build result");
            return;
        }
        let Some(pending) = self.pending.take() else { return };
        if outcome.code == ResultCode::Cancelled {
            // Not superseded, yet cancelled: nothing to report.
            debug!(id, "build cancelled");
            self.state = match pending.kind {
                BuildKind::Fresh => SessionState::Idle,
                BuildKind::Rebuild => SessionState::Navigating,
            };
            return;
        }

        let stats = BuildStats {
            router,
            code:        outcome.code,
            elapsed:     pending.started.elapsed(),
            visited:     outcome.stats.visited,
            cache:       outcome.stats.cache,
            route_len_m: outcome.route.as_ref().map(Route::length_m),
        };
        self.listener.on_statistics(&stats);

        let (absent_maps, absent_routing) = self.classify_absent(outcome.code, &outcome.absent_files);
        let route = outcome
            .route
            .filter(|r| outcome.code.has_route() && r.is_valid())
            .map(Arc::new);
        let code = if outcome.code.has_route() && route.is_none() { ResultCode::RouteNotFound } else { outcome.code };

        match (pending.kind, &route) {
            (BuildKind::Fresh, Some(r)) => {
                self.install_route(Arc::clone(r));
                self.state = SessionState::Ready;
            }
            (BuildKind::Fresh, None) => {
                self.drop_route();
                self.state = SessionState::Idle;
            }
            (BuildKind::Rebuild, Some(r)) => {
                self.install_route(Arc::clone(r));
                self.state = SessionState::Navigating;
            }
            (BuildKind::Rebuild, None) => {
                // Keep following the old route; the tracker will ask again.
                self.state = SessionState::Navigating;
            }
        }
        info!(
            id,
            %code,
            state          = %self.state,
            absent_maps    = absent_maps.len(),
            absent_routing = absent_routing.len(),
            elapsed_ms     = stats.elapsed.as_millis() as u64,
            "route build finished",
        );
        self.listener.on_route_built(&BuildResult { code, route, absent_maps, absent_routing });
    }

    fn install_route(&mut self, route: Arc<Route>) {
        self.route = Some(route);
        self.matcher.reset();
        self.deviation.reset();
    }

    /// Split absent file names into (maps to download, routing data to
    /// download).  A file counts as missing routing data only when its map
    /// is present and not too old.
    fn classify_absent(&self, code: ResultCode, files: &[String]) -> (Vec<RegionId>, Vec<RegionId>) {
        let mut maps = Vec::new();
        let mut routing = Vec::new();
        for name in files {
            let Some(region) = self.resolver.region_id(name) else {
                warn!(file = %name, "absent file has no region id");
                continue;
            };
            let list = if self.catalog.local_file(name).is_some() && code != ResultCode::FileTooOld {
                &mut routing
            } else {
                &mut maps
            };
            if !list.contains(&region) {
                list.push(region);
            }
        }
        (maps, routing)
    }
}

impl Drop for RoutingSession {
    fn drop(&mut self) {
        if self.state != SessionState::Closed {
            let _ = self.shutdown();
        }
    }
}
