//! CSV feature loader.
//!
//! # CSV format
//!
//! One row per road feature:
//!
//! ```csv
//! region,feature,class,oneway,min_scale,maxspeed_kmh,points
//! 0,1,residential,false,10,,55.7500 37.6000;55.7500 37.6100
//! 0,2,primary,true,5,60,55.7500 37.6100;55.7600 37.6100;55.7600 37.6200
//! ```
//!
//! `points` is a `;`-separated list of `lat lon` pairs.  `maxspeed_kmh` may
//! be empty.  A row with fewer than two points is kept as-is: the road graph
//! treats it as undecodable at query time, the same way it treats a damaged
//! record in a packed map file.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use nav_core::{FeatureId, GeoPoint, RegionId};

use crate::feature::{FeatureStoreBuilder, MemoryFeatureStore, RoadClass, RoadFeature};
use crate::{GraphError, GraphResult};

// ── CSV record ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct FeatureRecord {
    region:       u32,
    feature:      u32,
    class:        String,
    oneway:       bool,
    min_scale:    u8,
    maxspeed_kmh: Option<f64>,
    points:       String,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Load a [`MemoryFeatureStore`] from a CSV file.
pub fn load_features_csv(path: &Path) -> GraphResult<MemoryFeatureStore> {
    let file = std::fs::File::open(path)?;
    load_features_reader(file)
}

/// Like [`load_features_csv`] but accepts any `Read` source.
pub fn load_features_reader<R: Read>(reader: R) -> GraphResult<MemoryFeatureStore> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut builder = FeatureStoreBuilder::new();

    for (line, result) in csv_reader.deserialize::<FeatureRecord>().enumerate() {
        let row = result.map_err(|e| GraphError::Parse(e.to_string()))?;
        let feature = RoadFeature {
            id:           FeatureId(row.feature),
            class:        row.class.parse::<RoadClass>()?,
            oneway:       row.oneway,
            min_scale:    row.min_scale,
            maxspeed_kmh: row.maxspeed_kmh,
            points:       parse_points(&row.points)
                .map_err(|e| GraphError::Parse(format!("record {}: {e}", line + 1)))?,
        };
        builder.add_feature(RegionId(row.region), feature);
    }

    Ok(builder.build())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn parse_points(s: &str) -> Result<Vec<GeoPoint>, String> {
    s.split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let mut it = pair.split_whitespace();
            let (Some(lat), Some(lon), None) = (it.next(), it.next(), it.next()) else {
                return Err(format!("invalid point {pair:?}: expected \"lat lon\""));
            };
            let lat = lat.parse::<f64>().map_err(|e| format!("invalid latitude {lat:?}: {e}"))?;
            let lon = lon.parse::<f64>().map_err(|e| format!("invalid longitude {lon:?}: {e}"))?;
            Ok(GeoPoint::new(lat, lon))
        })
        .collect()
}
