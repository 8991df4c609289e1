//! The build worker thread and the messages it exchanges with the session.
//!
//! ```text
//!   session (owner thread)                      worker thread
//!   ──────────────────────                      ─────────────
//!   commands ── Build / SetRouter / … ──────▶  owns both routers,
//!                                              runs one build at a time
//!   inbox    ◀── Progress / Built ───────────  posts results in order
//! ```
//!
//! Nothing crosses the boundary but these values: the worker never touches
//! session state and the session never touches a router.

use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use nav_core::{GeoPoint, ResultCode, RouterType};
use nav_router::{CancelToken, ProgressSink, Router, RouterDelegate, RouterOutcome};

use crate::{SessionError, SessionResult};

/// Work requested by the session.
pub(crate) enum Command {
    Build {
        id:      u64,
        start:   GeoPoint,
        finish:  GeoPoint,
        timeout: Duration,
        cancel:  CancelToken,
    },
    /// Make `RouterType` the router for subsequent builds.
    SetRouter(RouterType),
    /// Drop router caches; map data may have changed.
    SoftReset,
    Shutdown,
}

/// Posted by the worker to the session inbox.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    Progress { id: u64, percent: f32 },
    Built { id: u64, router: RouterType, outcome: RouterOutcome },
}

/// Forwards router progress to the inbox, tagged with the build id.
struct InboxProgress {
    id:    u64,
    inbox: Sender<SessionEvent>,
}

impl ProgressSink for InboxProgress {
    fn on_progress(&self, percent: f32) {
        // A closed inbox means the session is gone; the build result will be
        // dropped as well.
        let _ = self.inbox.send(SessionEvent::Progress { id: self.id, percent });
    }
}

struct Worker {
    vehicle:    Box<dyn Router>,
    pedestrian: Box<dyn Router>,
    active:     RouterType,
    inbox:      Sender<SessionEvent>,
}

impl Worker {
    fn router(&mut self) -> &mut dyn Router {
        match self.active {
            RouterType::Vehicle    => self.vehicle.as_mut(),
            RouterType::Pedestrian => self.pedestrian.as_mut(),
        }
    }

    fn run(mut self, commands: Receiver<Command>) {
        while let Ok(cmd) = commands.recv() {
            match cmd {
                Command::Build { id, start, finish, timeout, cancel } => {
                    let router = self.active;
                    if cancel.is_cancelled() {
                        debug!(id, "build cancelled before it started");
                        let outcome = RouterOutcome::failure(ResultCode::Cancelled);
                        if self.inbox.send(SessionEvent::Built { id, router, outcome }).is_err() {
                            break;
                        }
                        continue;
                    }
                    let delegate = RouterDelegate::new(cancel)
                        .with_timeout(timeout)
                        .with_progress(Box::new(InboxProgress { id, inbox: self.inbox.clone() }));
                    debug!(id, %router, %start, %finish, "build started");
                    let outcome = self.router().compute_route(start, finish, &delegate);
                    if self.inbox.send(SessionEvent::Built { id, router, outcome }).is_err() {
                        break;
                    }
                }
                Command::SetRouter(router) => {
                    if router != self.active {
                        // The outgoing router's caches are dead weight until
                        // the user switches back.
                        self.router().soft_reset();
                        self.active = router;
                        info!(%router, "active router changed");
                    }
                }
                Command::SoftReset => {
                    self.vehicle.soft_reset();
                    self.pedestrian.soft_reset();
                    debug!("router caches reset");
                }
                Command::Shutdown => break,
            }
        }
        debug!("build worker exiting");
    }
}

/// Start the worker thread.
pub(crate) fn spawn(
    vehicle:    Box<dyn Router>,
    pedestrian: Box<dyn Router>,
    active:     RouterType,
    commands:   Receiver<Command>,
    inbox:      Sender<SessionEvent>,
) -> SessionResult<JoinHandle<()>> {
    let worker = Worker { vehicle, pedestrian, active, inbox };
    thread::Builder::new()
        .name("nav-build".into())
        .spawn(move || worker.run(commands))
        .map_err(|e| {
            warn!(error = %e, "cannot start build worker");
            SessionError::Nav(e.into())
        })
}
