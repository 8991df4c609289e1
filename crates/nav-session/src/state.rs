//! Session lifecycle states.

/// Where the session is in its build/follow cycle.
///
/// ```text
///            build_route                success
///   Idle ───────────────▶ Building ─────────────▶ Ready
///    ▲                       │ failure              │ follow_route
///    └───────────────────────┘                      ▼
///                                   deviation   Navigating ◀──┐
///                                  ┌────────────────┘         │ success / failure
///                                  ▼                          │ (old route kept)
///                              Rebuilding ────────────────────┘
///
///   any state ── close_routing / reset ──▶ Idle      any state ── shutdown ──▶ Closed
/// ```
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SessionState {
    #[default]
    Idle,
    Building,
    Ready,
    Navigating,
    Rebuilding,
    Closed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle       => "idle",
            SessionState::Building   => "building",
            SessionState::Ready      => "ready",
            SessionState::Navigating => "navigating",
            SessionState::Rebuilding => "rebuilding",
            SessionState::Closed     => "closed",
        }
    }

    /// States in which a route is held and fixes are matched against it.
    #[inline]
    pub fn has_route(self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Navigating | SessionState::Rebuilding)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
