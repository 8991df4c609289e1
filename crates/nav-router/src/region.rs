//! Region files and the resolver that maps points onto them.

use nav_core::{GeoPoint, RegionId};

/// Geographic point → governing region file, and file name → region id.
pub trait RegionResolver: Send + Sync {
    /// Name of the region file covering `point`, if any region does.
    fn file_at(&self, point: GeoPoint) -> Option<String>;

    fn region_id(&self, file: &str) -> Option<RegionId>;
}

/// Region as a lat/lon bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionBox {
    pub name: String,
    pub id:   RegionId,
    pub min:  GeoPoint,
    pub max:  GeoPoint,
}

impl RegionBox {
    pub fn contains(&self, p: GeoPoint) -> bool {
        p.lat >= self.min.lat && p.lat <= self.max.lat && p.lon >= self.min.lon && p.lon <= self.max.lon
    }
}

/// [`RegionResolver`] over a list of bounding boxes.  Boxes are tested in
/// insertion order, so on a shared border the first-added region wins.
#[derive(Debug, Clone, Default)]
pub struct BoxRegionResolver {
    regions: Vec<RegionBox>,
}

impl BoxRegionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, id: RegionId, min: GeoPoint, max: GeoPoint) -> &mut Self {
        self.regions.push(RegionBox { name: name.into(), id, min, max });
        self
    }

    pub fn regions(&self) -> &[RegionBox] {
        &self.regions
    }
}

impl RegionResolver for BoxRegionResolver {
    fn file_at(&self, point: GeoPoint) -> Option<String> {
        self.regions.iter().find(|r| r.contains(point)).map(|r| r.name.clone())
    }

    fn region_id(&self, file: &str) -> Option<RegionId> {
        self.regions.iter().find(|r| r.name == file).map(|r| r.id)
    }
}
