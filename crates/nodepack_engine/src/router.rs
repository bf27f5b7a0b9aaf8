//! Routers: how an operation's requirements get bound to a chunk.
//!
//! [`DirectRouter`] hashes every lookup on every run. [`CacheRouter`] records
//! one [`Route`] per structure and replays it on later runs, and remembers
//! mismatching structures so they are rejected without calling
//! `requirements` at all.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use nodepack_foundation::StructureId;
use nodepack_storage::{ChunkAccess, Structure};

use crate::config::EngineConfig;
use crate::operation::Operation;
use crate::request::BindRequest;
use crate::route::{RecordRequest, ReplayRequest, Route};

/// Binds an operation's requirements against one chunk access.
pub trait Router<Op: Operation + ?Sized> {
    /// Runs `op.requirements` against `access`, filling `binding`.
    ///
    /// Returns false without touching `binding` when `access` is null.
    fn route<'c>(&self, op: &Op, binding: &mut Op::Binding<'c>, access: &ChunkAccess<'c>)
    -> bool;
}

/// Uncached router: a hash lookup per requested component per run.
#[derive(Copy, Clone, Debug, Default)]
pub struct DirectRouter;

impl<Op: Operation + ?Sized> Router<Op> for DirectRouter {
    fn route<'c>(
        &self,
        op: &Op,
        binding: &mut Op::Binding<'c>,
        access: &ChunkAccess<'c>,
    ) -> bool {
        if access.is_null() {
            return false;
        }
        let mut request = BindRequest::new(access);
        op.requirements(binding, &mut request) && request.is_complete()
    }
}

/// Counters kept by a [`CacheRouter`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// Runs that replayed a recorded route.
    pub hits: u64,
    /// Runs that recorded a new route.
    pub misses: u64,
    /// Runs rejected by a recorded mismatch.
    pub mismatch_skips: u64,
    /// Routes currently recorded.
    pub routes: usize,
}

/// Router that records a route per structure and replays it afterwards.
///
/// Routes live in a vector indexed through a structure map; a route never
/// moves from its index. The caches use interior mutability, so a router
/// serves one thread, and an operation's `requirements` must not route
/// through the router that is routing it: the route being replayed stays
/// borrowed until `requirements` returns.
///
/// Structure ids are never reused, so routes of dropped structures stay
/// until [`clear`](Self::clear) is called.
pub struct CacheRouter<Op: ?Sized> {
    routes: RefCell<Vec<Route>>,
    index: RefCell<HashMap<StructureId, usize>>,
    stats: Cell<RouterStats>,
    config: EngineConfig,
    _op: PhantomData<fn(&Op)>,
}

impl<Op: ?Sized> CacheRouter<Op> {
    /// Creates an empty router with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an empty router.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            routes: RefCell::new(Vec::new()),
            index: RefCell::new(HashMap::new()),
            stats: Cell::new(RouterStats::default()),
            config,
            _op: PhantomData,
        }
    }

    /// Configuration this router was built with.
    #[must_use]
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> RouterStats {
        self.stats.get()
    }

    /// Copy of the route recorded for `structure`, if any.
    #[must_use]
    pub fn route_for(&self, structure: &Structure) -> Option<Route> {
        let slot = self.index.borrow().get(&structure.id()).copied()?;
        self.routes.borrow().get(slot).cloned()
    }

    /// Drops every recorded route. Counters other than `routes` are kept.
    pub fn clear(&self) {
        self.routes.borrow_mut().clear();
        self.index.borrow_mut().clear();
        self.update(|stats| stats.routes = 0);
    }

    fn update(&self, f: impl FnOnce(&mut RouterStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

impl<Op: ?Sized> Default for CacheRouter<Op> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Op: Operation + ?Sized> Router<Op> for CacheRouter<Op> {
    fn route<'c>(
        &self,
        op: &Op,
        binding: &mut Op::Binding<'c>,
        access: &ChunkAccess<'c>,
    ) -> bool {
        let Some(structure) = access.structure() else {
            return false;
        };
        let id = structure.id();
        let cached = self.index.borrow().get(&id).copied();

        let Some(slot) = cached else {
            let mut request = RecordRequest::new(access);
            let matched = op.requirements(binding, &mut request);
            let route = request.into_route();
            let matched = matched && !route.is_mismatch();
            log::debug!(
                "recorded route for {id}: {} steps, mismatch={}",
                route.len(),
                route.is_mismatch()
            );

            let mut routes = self.routes.borrow_mut();
            routes.push(route);
            self.index.borrow_mut().insert(id, routes.len() - 1);
            self.update(|stats| {
                stats.misses += 1;
                stats.routes += 1;
            });
            return matched;
        };

        let mut routes = self.routes.borrow_mut();
        let route = &mut routes[slot];
        if route.is_mismatch() {
            if self.config.trace_routing {
                log::trace!("skipping {id}: recorded mismatch");
            }
            self.update(|stats| stats.mismatch_skips += 1);
            return false;
        }

        if self.config.trace_routing {
            log::trace!("replaying {} steps for {id}", route.len());
        }
        let mut request = ReplayRequest::new(access, route, self.config.validate_replay);
        let matched = op.requirements(binding, &mut request);
        if route.is_mismatch() {
            log::debug!("route for {id} became a mismatch while extending");
        }
        self.update(|stats| stats.hits += 1);
        matched && !route.is_mismatch()
    }
}

impl<Op: ?Sized> fmt::Debug for CacheRouter<Op> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRouter")
            .field("operation", &std::any::type_name::<Op>())
            .field("stats", &self.stats.get())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
