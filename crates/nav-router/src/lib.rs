//! `nav-router`: path solvers and the collaborators they consult.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                          |
//! |----------------|-------------------------------------------------------------------|
//! | [`router`]     | `Router` trait                                                    |
//! | [`delegate`]   | `RouterDelegate`, `CancelToken`, `ProgressSink`, `RouterOutcome`  |
//! | [`index`]      | `RoutingIndex` (CH), `RoutingIndexBuilder`, `EdgeSnap`            |
//! | [`vehicle`]    | `VehicleRouter`, `check_routing_ability`, `RoutingFilesProbe`     |
//! | [`pedestrian`] | `PedestrianRouter` (bidirectional A* over `CachedRoadGraph`)      |
//! | [`absent`]     | `AbsentFileResolver`, sampling and online resolvers               |
//! | [`region`]     | `RegionResolver`, `BoxRegionResolver`                             |
//! | [`catalog`]    | `FileCatalog`, `MemoryCatalog`, `LocalRegionFile`                 |
//! | [`select`]     | `select_router`, `FeasibilityProbe`                               |
//! | [`error`]      | `RouterError`, `RouterResult<T>`                                  |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                       |
//! |---------|--------------------------------------------------------------|
//! | `serde` | Derives `Serialize`/`Deserialize` on nav-core value types.   |

pub mod absent;
pub mod catalog;
pub mod delegate;
pub mod error;
pub mod index;
pub mod pedestrian;
pub mod region;
pub mod router;
pub mod select;
pub mod vehicle;


pub use absent::{AbsentFileResolver, OnlineAbsentResolver, RemoteRegionLookup, SamplingAbsentResolver};
pub use catalog::{FileCatalog, LocalRegionFile, MemoryCatalog, RoutingExtension, MIN_ROUTING_FORMAT};
pub use delegate::{CancelToken, ProgressSink, RouterDelegate, RouterOutcome, RouterStats};
pub use error::{RouterError, RouterResult};
pub use index::{EdgeSnap, IndexPath, RoutingIndex, RoutingIndexBuilder};
pub use pedestrian::PedestrianRouter;
pub use region::{BoxRegionResolver, RegionBox, RegionResolver};
pub use router::Router;
pub use select::{select_router, select_router_within, FeasibilityProbe, KEEP_PEDESTRIAN_DISTANCE_M};
pub use vehicle::{check_routing_ability, RoutingFilesProbe, VehicleRouter};
