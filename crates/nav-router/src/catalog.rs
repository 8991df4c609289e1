//! Catalog of region files present on the device.

use std::sync::{Arc, PoisonError, RwLock};

use rustc_hash::FxHashMap;

use nav_core::RegionId;

use crate::index::RoutingIndex;

/// Oldest routing-extension format the vehicle router still reads.
pub const MIN_ROUTING_FORMAT: u32 = 3;

/// The routing section of a region file.
#[derive(Clone)]
pub struct RoutingExtension {
    /// Map version the index was built against.
    pub data_version: u64,
    pub format:       u32,
    pub index:        Arc<RoutingIndex>,
}

/// A region file present on the device.
#[derive(Clone)]
pub struct LocalRegionFile {
    pub name:        String,
    pub region:      RegionId,
    pub map_version: u64,
    /// `None` for a map downloaded without routing data.
    pub routing:     Option<RoutingExtension>,
}

impl LocalRegionFile {
    pub fn has_routing(&self) -> bool {
        self.routing.is_some()
    }
}

pub trait FileCatalog: Send + Sync {
    /// The local file descriptor for `name`, or `None` if not downloaded.
    fn local_file(&self, name: &str) -> Option<Arc<LocalRegionFile>>;
}

/// In-memory [`FileCatalog`].  Files can be added and removed while routers
/// hold the catalog, the way downloads land on a device.
#[derive(Default)]
pub struct MemoryCatalog {
    files: RwLock<FxHashMap<String, Arc<LocalRegionFile>>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, file: LocalRegionFile) {
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        files.insert(file.name.clone(), Arc::new(file));
    }

    pub fn remove(&self, name: &str) -> Option<Arc<LocalRegionFile>> {
        self.files.write().unwrap_or_else(PoisonError::into_inner).remove(name)
    }

    pub fn len(&self) -> usize {
        self.files.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FileCatalog for MemoryCatalog {
    fn local_file(&self, name: &str) -> Option<Arc<LocalRegionFile>> {
        self.files.read().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }
}
