//! Graph-subsystem error type.

use thiserror::Error;

use nav_core::{FeatureId, RegionId};

/// Errors produced by `nav-graph`.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("feature {feature} not found in region {region}")]
    FeatureNotFound { region: RegionId, feature: FeatureId },

    #[error("feature {feature} has {points} point(s); a road needs at least 2")]
    Degenerate { feature: FeatureId, points: usize },

    #[error("path is disconnected: geometry of {0} could not be decoded")]
    Disconnected(FeatureId),

    #[error("unknown road class {0:?}")]
    UnknownRoadClass(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GraphResult<T> = Result<T, GraphError>;
