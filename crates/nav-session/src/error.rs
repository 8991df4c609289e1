use nav_core::NavError;
use nav_router::RouterError;
use thiserror::Error;

use crate::SessionState;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a route build is in flight")]
    BuildInFlight,

    #[error("{op} is not allowed in state {state}")]
    InvalidState {
        op:    &'static str,
        state: SessionState,
    },

    #[error("the routing session has been shut down")]
    SessionClosed,

    #[error("session configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Nav(#[from] NavError),

    #[error("router error: {0}")]
    Router(#[from] RouterError),
}

pub type SessionResult<T> = Result<T, SessionError>;
