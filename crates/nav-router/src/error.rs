//! Router-subsystem error type.
//!
//! Routing outcomes travel as [`ResultCode`](nav_core::ResultCode); these
//! errors cover building indexes and talking to collaborators.

use thiserror::Error;

use nav_core::RegionId;
use nav_graph::GraphError;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("region {0} is not present in the feature store")]
    UnknownRegion(RegionId),

    #[error("remote region lookup failed: {0}")]
    Lookup(String),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),
}

pub type RouterResult<T> = Result<T, RouterError>;
