//! Fluent builder for constructing a [`RoutingSession`].

use std::num::NonZeroUsize;
use std::sync::mpsc;
use std::sync::Arc;

use tracing::info;

use nav_core::RoutingSettings;
use nav_follow::{DeviationTracker, RouteMatcher};
use nav_graph::FeatureStore;
use nav_router::{
    AbsentFileResolver, FileCatalog, OnlineAbsentResolver, PedestrianRouter, RegionResolver, RemoteRegionLookup,
    Router, RoutingFilesProbe, SamplingAbsentResolver, VehicleRouter,
};

use crate::prefs::last_used_router;
use crate::{
    worker, MemoryPreferences, NoopListener, PreferenceStore, RoutingListener, RoutingSession, SessionConfig,
    SessionError, SessionResult, SessionState,
};

/// Fluent builder for [`RoutingSession`].
///
/// # Required inputs
///
/// - `FeatureStore`: road geometry for the pedestrian router
/// - `RegionResolver`: point → region file
/// - `FileCatalog`: locally present region files and their routing data
///
/// # Optional inputs (have defaults)
///
/// | Method                  | Default                                         |
/// |-------------------------|-------------------------------------------------|
/// | `.config(c)`            | `SessionConfig::default()`                      |
/// | `.listener(l)`          | `NoopListener`                                  |
/// | `.preferences(p)`       | empty `MemoryPreferences`                       |
/// | `.remote_lookup(l)`     | none: absent files found by sampling            |
/// | `.absent_resolver(r)`   | derived from `remote_lookup`                    |
/// | `.vehicle_router(r)`    | `VehicleRouter` over the resolver and catalog   |
/// | `.pedestrian_router(r)` | `PedestrianRouter` over the feature store       |
///
/// # Example
///
/// ```rust,ignore
/// let mut session = SessionBuilder::new(store, resolver, catalog)
///     .listener(Box::new(MyListener))
///     .build()?;
/// session.build_route(start, finish, Duration::from_secs(30))?;
/// session.wait_idle(Duration::from_secs(30))?;
/// ```
pub struct SessionBuilder {
    store:      Arc<dyn FeatureStore>,
    resolver:   Arc<dyn RegionResolver>,
    catalog:    Arc<dyn FileCatalog>,
    config:     SessionConfig,
    listener:   Option<Box<dyn RoutingListener>>,
    prefs:      Option<Box<dyn PreferenceStore>>,
    lookup:     Option<Box<dyn RemoteRegionLookup>>,
    absent:     Option<Box<dyn AbsentFileResolver>>,
    vehicle:    Option<Box<dyn Router>>,
    pedestrian: Option<Box<dyn Router>>,
}

impl SessionBuilder {
    pub fn new(
        store:    Arc<dyn FeatureStore>,
        resolver: Arc<dyn RegionResolver>,
        catalog:  Arc<dyn FileCatalog>,
    ) -> Self {
        Self {
            store,
            resolver,
            catalog,
            config:     SessionConfig::default(),
            listener:   None,
            prefs:      None,
            lookup:     None,
            absent:     None,
            vehicle:    None,
            pedestrian: None,
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn listener(mut self, listener: Box<dyn RoutingListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Store holding the last used router.  Its value, if any, picks the
    /// initial router instead of `config.default_router`.
    pub fn preferences(mut self, prefs: Box<dyn PreferenceStore>) -> Self {
        self.prefs = Some(prefs);
        self
    }

    /// Network lookup the vehicle router consults for missing files.
    pub fn remote_lookup(mut self, lookup: Box<dyn RemoteRegionLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Replace the vehicle router's absent-file resolver outright.
    pub fn absent_resolver(mut self, absent: Box<dyn AbsentFileResolver>) -> Self {
        self.absent = Some(absent);
        self
    }

    pub fn vehicle_router(mut self, router: Box<dyn Router>) -> Self {
        self.vehicle = Some(router);
        self
    }

    pub fn pedestrian_router(mut self, router: Box<dyn Router>) -> Self {
        self.pedestrian = Some(router);
        self
    }

    /// Validate the configuration, start the build worker, and return an
    /// idle session.
    pub fn build(self) -> SessionResult<RoutingSession> {
        self.config.validate()?;
        let capacity = NonZeroUsize::new(self.config.cache_capacity)
            .ok_or_else(|| SessionError::Config("cache_capacity must be non-zero".into()))?;

        // ── Routers ───────────────────────────────────────────────────────
        let vehicle: Box<dyn Router> = match self.vehicle {
            Some(r) => r,
            None => {
                let absent: Box<dyn AbsentFileResolver> = match (self.absent, self.lookup) {
                    (Some(a), _) => a,
                    (None, Some(lookup)) => Box::new(OnlineAbsentResolver::new(
                        lookup,
                        Arc::clone(&self.resolver),
                        Arc::clone(&self.catalog),
                    )),
                    (None, None) => {
                        Box::new(SamplingAbsentResolver::new(Arc::clone(&self.resolver), Arc::clone(&self.catalog)))
                    }
                };
                Box::new(VehicleRouter::new(Arc::clone(&self.resolver), Arc::clone(&self.catalog), absent))
            }
        };
        let pedestrian: Box<dyn Router> = match self.pedestrian {
            Some(r) => r,
            None => Box::new(
                PedestrianRouter::new(Arc::clone(&self.store), Arc::clone(&self.resolver), Arc::clone(&self.catalog))
                    .with_cache_capacity(capacity)
                    .with_read_scale(self.config.street_read_scale),
            ),
        };

        // ── Initial router ────────────────────────────────────────────────
        let prefs: Box<dyn PreferenceStore> = self.prefs.unwrap_or_else(|| Box::new(MemoryPreferences::new()));
        let router_type = last_used_router(prefs.as_ref()).unwrap_or(self.config.default_router);

        // ── Worker ────────────────────────────────────────────────────────
        let (commands, command_rx) = mpsc::channel();
        let (inbox_tx, inbox) = mpsc::channel();
        let handle = worker::spawn(vehicle, pedestrian, router_type, command_rx, inbox_tx)?;
        info!(router = %router_type, cache_capacity = capacity.get(), "routing session started");

        Ok(RoutingSession {
            probe:       RoutingFilesProbe::new(Arc::clone(&self.resolver), Arc::clone(&self.catalog)),
            config:      self.config,
            state:       SessionState::Idle,
            router_type,
            settings:    RoutingSettings::for_router(router_type),
            route:       None,
            matcher:     RouteMatcher::new(),
            deviation:   DeviationTracker::new(),
            last_fix:    None,
            pending:     None,
            next_id:     1,
            resolver:    self.resolver,
            catalog:     self.catalog,
            listener:    self.listener.unwrap_or_else(|| Box::new(NoopListener)),
            prefs,
            commands,
            inbox,
            worker:      Some(handle),
        })
    }
}
