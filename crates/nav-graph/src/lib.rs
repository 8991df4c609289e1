//! `nav-graph`: road features, speed models, and the cached road graph.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                        |
//! |-------------|-----------------------------------------------------------------|
//! | [`lru`]     | `LruCache<K, V>`, generic fixed-capacity LRU map                |
//! | [`feature`] | `RoadFeature`, `RoadClass`, `FeatureStore`, `MemoryFeatureStore` |
//! | [`loader`]  | `load_features_csv` / `load_features_reader`                    |
//! | [`model`]   | `VehicleModel` trait, `CarModel`, `PedestrianModel`             |
//! | [`graph`]   | `CachedRoadGraph`, `RoadPosition`, `Snap`, `CacheStats`         |
//! | [`error`]   | `GraphError`, `GraphResult<T>`                                  |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                       |
//! |---------|--------------------------------------------------------------|
//! | `serde` | Derives `Serialize`/`Deserialize` on nav-core value types.   |

pub mod error;
pub mod feature;
pub mod graph;
pub mod loader;
pub mod lru;
pub mod model;

#[cfg(test)]
mod tests;

pub use error::{GraphError, GraphResult};
pub use feature::{FeatureStore, FeatureStoreBuilder, MemoryFeatureStore, RoadClass, RoadFeature};
pub use graph::{
    assemble_route, CacheStats, CachedFeature, CachedRoadGraph, RoadPosition, Snap, DEFAULT_STREET_READ_SCALE,
};
pub use loader::{load_features_csv, load_features_reader};
pub use lru::LruCache;
pub use model::{CarModel, PedestrianModel, VehicleModel};
