//! `nav-core`: foundational types for the `nav` offline routing workspace.
//!
//! This crate is a dependency of every other `nav-*` crate.  It intentionally
//! has no `nav-*` dependencies and minimal external ones (only `thiserror`,
//! plus optional `serde`).
//!
//! # What lives here
//!
//! | Module          | Contents                                              |
//! |-----------------|-------------------------------------------------------|
//! | [`ids`]         | `RegionId`, `FeatureId`, `NodeId`, `EdgeId`           |
//! | [`geo`]         | `GeoPoint`, haversine distance, bearing, projection   |
//! | [`route`]       | `Route`, `TurnMarker`                                 |
//! | [`router_type`] | `RouterType` enum                                     |
//! | [`result`]      | `ResultCode`, routing outcome taxonomy                |
//! | [`settings`]    | `RoutingSettings`, per-mode matching/turn tuning      |
//! | [`error`]       | `NavError`, `NavResult`                               |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public value types.  |

pub mod error;
pub mod geo;
pub mod ids;
pub mod result;
pub mod route;
pub mod router_type;
pub mod settings;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{NavError, NavResult};
pub use geo::{GeoPoint, Projection};
pub use ids::{EdgeId, FeatureId, NodeId, RegionId};
pub use result::ResultCode;
pub use route::{Route, TurnMarker};
pub use router_type::RouterType;
pub use settings::RoutingSettings;
