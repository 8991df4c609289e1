//! Persisted key/value preferences.

use std::sync::{Mutex, PoisonError};

use rustc_hash::FxHashMap;
use tracing::warn;

use nav_core::RouterType;

/// Key under which the last used router type is stored.
pub const ROUTER_PREFERENCE_KEY: &str = "router";

/// Platform settings store.  Writes must be durable by the time `set`
/// returns; the session never batches them.
pub trait PreferenceStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// In-memory store; nothing survives the process.
#[derive(Default)]
pub struct MemoryPreferences {
    values: Mutex<FxHashMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with one entry.
    pub fn with(key: &str, value: &str) -> Self {
        let prefs = Self::new();
        prefs.set(key, value);
        prefs
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).insert(key.to_owned(), value.to_owned());
    }
}

/// The stored router preference.  An unparsable value is logged and
/// treated as absent.
pub fn last_used_router(prefs: &dyn PreferenceStore) -> Option<RouterType> {
    let raw = prefs.get(ROUTER_PREFERENCE_KEY)?;
    match raw.parse() {
        Ok(router) => Some(router),
        Err(e) => {
            warn!(value = %raw, error = %e, "ignoring stored router preference");
            None
        }
    }
}

pub fn set_last_used_router(prefs: &dyn PreferenceStore, router: RouterType) {
    prefs.set(ROUTER_PREFERENCE_KEY, router.as_str());
}
