//! Synthetic two-region street map.
//!
//! ```text
//!  lat 30.78 ┌─────────────────────────────┐
//!            │        northside            │  not downloaded
//!  lat 30.72 ├──────────────┬──────────────┤
//!            │   westside   │   eastside   │
//!  lat 30.66 └──────────────┴──────────────┘
//!        lon -88.10      -88.05         -88.00
//! ```
//!
//! A primary road crosses the border at (30.69, -88.05); every other
//! street stays inside its region.

use std::io::Cursor;
use std::sync::Arc;

use anyhow::Result;

use nav_core::{GeoPoint, RegionId};
use nav_graph::{load_features_reader, CarModel, MemoryFeatureStore};
use nav_router::{BoxRegionResolver, LocalRegionFile, MemoryCatalog, RoutingExtension, RoutingIndexBuilder, MIN_ROUTING_FORMAT};

pub const WESTSIDE:  RegionId = RegionId(1);
pub const EASTSIDE:  RegionId = RegionId(2);
pub const NORTHSIDE: RegionId = RegionId(3);

const MAP_VERSION: u64 = 231_015;

const STREETS_CSV: &str = "\
region,feature,class,oneway,min_scale,maxspeed_kmh,points\n\
1,1,residential,false,12,,30.67 -88.09;30.67 -88.08;30.67 -88.07;30.67 -88.06\n\
1,2,residential,false,12,,30.71 -88.09;30.71 -88.08;30.71 -88.07;30.71 -88.06\n\
1,3,primary,false,8,60,30.69 -88.09;30.69 -88.08;30.69 -88.07;30.69 -88.06;30.69 -88.05\n\
1,4,residential,false,12,,30.67 -88.09;30.69 -88.09;30.71 -88.09\n\
1,5,residential,false,12,,30.67 -88.07;30.69 -88.07;30.71 -88.07\n\
1,6,tertiary,true,10,,30.67 -88.06;30.69 -88.06;30.71 -88.06\n\
2,10,primary,false,8,60,30.69 -88.05;30.69 -88.04;30.69 -88.03;30.69 -88.02\n\
2,11,residential,false,12,,30.67 -88.03;30.69 -88.03;30.71 -88.03\n\
2,12,residential,false,12,,30.71 -88.04;30.71 -88.03;30.71 -88.02\n\
2,13,footway,false,16,,30.69 -88.02;30.70 -88.02;30.71 -88.02\n\
";

pub struct Network {
    pub store:    Arc<MemoryFeatureStore>,
    pub resolver: Arc<BoxRegionResolver>,
    pub catalog:  Arc<MemoryCatalog>,
}

/// Load the streets, build both routing indexes, and register westside and
/// eastside as downloaded.
pub fn build_network() -> Result<Network> {
    let store = Arc::new(load_features_reader(Cursor::new(STREETS_CSV))?);

    let mut resolver = BoxRegionResolver::new();
    resolver
        .add("westside", WESTSIDE, GeoPoint::new(30.66, -88.10), GeoPoint::new(30.72, -88.05))
        .add("eastside", EASTSIDE, GeoPoint::new(30.66, -88.05), GeoPoint::new(30.72, -88.00))
        .add("northside", NORTHSIDE, GeoPoint::new(30.72, -88.10), GeoPoint::new(30.78, -88.00));

    let catalog = MemoryCatalog::new();
    for (name, region) in [("westside", WESTSIDE), ("eastside", EASTSIDE)] {
        let index = RoutingIndexBuilder::new(region).cross_region(true).build(store.as_ref(), &CarModel)?;
        println!(
            "  {name:<9}: {} nodes, {} edges, {} shortcuts",
            index.node_count(),
            index.edge_count(),
            index.shortcut_count(),
        );
        catalog.insert(LocalRegionFile {
            name:        name.into(),
            region,
            map_version: MAP_VERSION,
            routing:     Some(RoutingExtension {
                data_version: MAP_VERSION,
                format:       MIN_ROUTING_FORMAT,
                index:        Arc::new(index),
            }),
        });
    }

    Ok(Network { store, resolver: Arc::new(resolver), catalog: Arc::new(catalog) })
}
