//! Shared error type.
//!
//! Routing *outcomes* (no route, missing files, …) are [`ResultCode`]s and
//! never travel through this type.  `NavError` covers malformed input and
//! configuration problems that sub-crates either wrap or convert.
//!
//! [`ResultCode`]: crate::ResultCode

use thiserror::Error;

/// The base error type for `nav-core` and a common base for sub-crates.
#[derive(Debug, Error)]
pub enum NavError {
    #[error("unknown router type {0:?}")]
    UnknownRouterType(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand result type for `nav-core`.
pub type NavResult<T> = Result<T, NavError>;
