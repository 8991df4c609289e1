//! Per-build control surface handed to a router: cancellation, deadline,
//! progress.
//!
//! Search loops call [`RouterDelegate::interrupt`] every [`POLL_INTERVAL`]
//! queue pops and unwind with the returned code.  Nothing here mutates router
//! or cache state, so an interrupted search leaves the road-graph cache
//! consistent.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nav_core::{ResultCode, Route};
use nav_graph::CacheStats;

/// Queue pops between two cancellation/deadline checks.
pub const POLL_INTERVAL: u64 = 64;

// ── CancelToken ───────────────────────────────────────────────────────────────

/// Shared cooperative cancellation flag.
///
/// Cloning yields a handle to the same flag: the session keeps one clone and
/// the delegate of the in-flight build holds the other.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ── Progress ──────────────────────────────────────────────────────────────────

/// Receives percent-complete updates from a running search.
pub trait ProgressSink: Send {
    fn on_progress(&self, percent: f32);
}

// ── RouterDelegate ────────────────────────────────────────────────────────────

pub struct RouterDelegate {
    cancel:        CancelToken,
    deadline:      Option<Instant>,
    progress:      Option<Box<dyn ProgressSink>>,
    last_progress: Cell<f32>,
}

impl RouterDelegate {
    pub fn new(cancel: CancelToken) -> Self {
        Self { cancel, deadline: None, progress: None, last_progress: Cell::new(-1.0) }
    }

    /// Abort the search once `timeout` has elapsed from now.  A zero timeout
    /// means "no deadline".
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);
        self
    }

    pub fn with_progress(mut self, sink: Box<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_timed_out(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Code the search must stop with, if any.  Cancellation wins over an
    /// expired deadline; an expired deadline reports `RouteNotFound`.
    pub fn interrupt(&self) -> Option<ResultCode> {
        if self.is_cancelled() {
            Some(ResultCode::Cancelled)
        } else if self.is_timed_out() {
            Some(ResultCode::RouteNotFound)
        } else {
            None
        }
    }

    /// Forward `percent` to the sink when it has grown by at least one point
    /// since the last report.
    pub fn report_progress(&self, percent: f32) {
        let Some(sink) = &self.progress else { return };
        let percent = percent.clamp(0.0, 100.0);
        if percent >= self.last_progress.get() + 1.0 || (percent >= 100.0 && self.last_progress.get() < 100.0) {
            self.last_progress.set(percent);
            sink.on_progress(percent);
        }
    }
}

// ── Outcome ───────────────────────────────────────────────────────────────────

/// Counters describing one router call.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RouterStats {
    /// Queue pops performed by the search.
    pub visited: u64,
    pub elapsed: Duration,
    /// Road-graph cache counters after the search (pedestrian router only).
    pub cache:   Option<CacheStats>,
}

/// Everything a router reports back for one `compute_route` call.
#[derive(Debug, Clone)]
pub struct RouterOutcome {
    pub code:         ResultCode,
    /// Present for `NoError` and `NeedMoreMaps`.
    pub route:        Option<Route>,
    /// Region file names lacking data needed by the trip.
    pub absent_files: Vec<String>,
    pub stats:        RouterStats,
}

impl RouterOutcome {
    pub fn failure(code: ResultCode) -> Self {
        Self { code, route: None, absent_files: Vec::new(), stats: RouterStats::default() }
    }

    pub fn success(route: Route) -> Self {
        Self { code: ResultCode::NoError, route: Some(route), absent_files: Vec::new(), stats: RouterStats::default() }
    }

    pub fn with_absent(mut self, files: Vec<String>) -> Self {
        self.absent_files = files;
        self
    }

    pub fn with_stats(mut self, stats: RouterStats) -> Self {
        self.stats = stats;
        self
    }
}
