//! `nav-session`: the routing session state machine.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                          |
//! |--------------|-------------------------------------------------------------------|
//! | [`session`]  | `RoutingSession`: state, route, matcher, event handling           |
//! | [`builder`]  | `SessionBuilder`                                                  |
//! | [`state`]    | `SessionState`                                                    |
//! | [`config`]   | `SessionConfig`                                                   |
//! | [`listener`] | `RoutingListener`, `NoopListener`, `BuildResult`, `BuildStats`    |
//! | [`prefs`]    | `PreferenceStore`, `MemoryPreferences`, the `"router"` key        |
//! | `worker`     | build thread, `Command` / `SessionEvent` messages                 |
//! | [`error`]    | `SessionError`, `SessionResult<T>`                                |
//!
//! # Threading
//!
//! ```text
//!   owner thread                                   build worker
//!   ────────────                                   ────────────
//!   build_route ─────── Command::Build ─────────▶  router.compute_route
//!   on_location                                      │ progress
//!   process_events ◀─── SessionEvent (inbox) ◀───────┘ result
//!     └─▶ state transition, route swap, listener callbacks
//! ```
//!
//! Every state change happens inside a `&mut self` call on the owner
//! thread, so route replacement and location matching never race.  A new
//! build cancels the one in flight; the superseded result is dropped when
//! it reaches the inbox and never reaches the listener.
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use nav_session::{SessionBuilder, SessionState};
//!
//! let mut session = SessionBuilder::new(store, resolver, catalog).build()?;
//! session.build_route(start, finish, Duration::from_secs(30))?;
//! session.wait_idle(Duration::from_secs(30))?;
//! if session.state() == SessionState::Ready {
//!     session.follow_route()?;
//! }
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod listener;
pub mod prefs;
pub mod session;
pub mod state;
mod worker;

#[cfg(test)]
mod tests;

pub use builder::SessionBuilder;
pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use listener::{BuildResult, BuildStats, NoopListener, RoutingListener};
pub use prefs::{last_used_router, set_last_used_router, MemoryPreferences, PreferenceStore, ROUTER_PREFERENCE_KEY};
pub use session::RoutingSession;
pub use state::SessionState;
