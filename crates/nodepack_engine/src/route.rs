//! Recorded routes and the requests that record and replay them.
//!
//! The sequence of component lookups an operation's `requirements` makes
//! depends only on the structure it runs against. The first run against a
//! structure records the slot found for each lookup; later runs replay the
//! slots in call order without hashing.

use std::any::{TypeId, type_name};

use nodepack_foundation::{Component, invariant};
use nodepack_storage::{ChunkAccess, ChunkView};

use crate::column::Column;
use crate::request::{Binder, Request};

/// One recorded component lookup.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RouteStep {
    /// Component type the operation asked for.
    pub type_id: TypeId,
    /// Slot it was found at, `None` if the structure lacks it.
    pub slot: Option<usize>,
}

/// Recorded lookups of one operation against one structure.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Route {
    steps: Vec<RouteStep>,
    mismatch: bool,
}

impl Route {
    /// The recorded lookups, in call order.
    #[must_use]
    pub fn steps(&self) -> &[RouteStep] {
        &self.steps
    }

    /// Returns true if the structure lacks a required component.
    ///
    /// Mismatching routes are never replayed.
    #[must_use]
    pub fn is_mismatch(&self) -> bool {
        self.mismatch
    }

    /// Number of recorded lookups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if no lookup was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Looks `T` up, appends the outcome, and binds it if present.
    fn extend<'c, T: Component>(
        &mut self,
        binder: &mut Binder<'_, 'c>,
        column: &mut Column<'c, T>,
    ) -> bool {
        let type_id = TypeId::of::<T>();
        let slot = binder.lookup(column);
        self.steps.push(RouteStep { type_id, slot });
        if slot.is_none() {
            self.mismatch = true;
        }
        slot.is_some()
    }
}

// =============================================================================
// Recording
// =============================================================================

/// Cache-miss request: hashes each lookup and records its outcome.
///
/// A missing component marks the route as a mismatch and fails at once.
pub struct RecordRequest<'r, 'c> {
    binder: Binder<'r, 'c>,
    route: Route,
}

impl<'r, 'c> RecordRequest<'r, 'c> {
    /// Creates a request that binds columns of `access` and records a route.
    ///
    /// # Panics
    ///
    /// Panics if `access` is null or its columns are already bound.
    #[must_use]
    pub fn new(access: &'r ChunkAccess<'c>) -> Self {
        Self {
            binder: Binder::new(access),
            route: Route::default(),
        }
    }

    /// The route recorded so far.
    #[must_use]
    pub fn into_route(self) -> Route {
        self.route
    }
}

impl<'c> Request<'c> for RecordRequest<'_, 'c> {
    fn component<T: Component>(&mut self, column: &mut Column<'c, T>) -> bool {
        if self.route.mismatch {
            return false;
        }
        self.route.extend(&mut self.binder, column)
    }

    fn parent_component<T: Component>(&mut self, column: &mut Option<&'c [T]>) -> bool {
        self.binder.parent_component(column)
    }

    fn chunk_index(&mut self, index: &mut usize) -> bool {
        *index = 0;
        true
    }

    fn parent_chunk(&mut self, parent: &mut Option<ChunkView<'c>>) -> bool {
        self.binder.parent_chunk(parent)
    }

    fn children_chunk(&mut self, children: &mut Option<ChunkView<'c>>) -> bool {
        self.binder.children_chunk(children)
    }
}

// =============================================================================
// Replay
// =============================================================================

/// Cache-hit request: the `i`-th lookup takes the `i`-th recorded slot.
///
/// Lookups past the recorded end (the recording run stopped early on a
/// non-component capability) are hashed and appended to the route.
pub struct ReplayRequest<'r, 'c> {
    binder: Binder<'r, 'c>,
    route: &'r mut Route,
    cursor: usize,
    validate: bool,
}

impl<'r, 'c> ReplayRequest<'r, 'c> {
    /// Creates a request that binds columns of `access` from `route`.
    ///
    /// With `validate`, every replayed step is checked against the type
    /// being requested.
    ///
    /// # Panics
    ///
    /// Panics if `access` is null, its columns are already bound, or `route`
    /// is a mismatch.
    #[must_use]
    pub fn new(access: &'r ChunkAccess<'c>, route: &'r mut Route, validate: bool) -> Self {
        invariant!(!route.mismatch, "cannot replay a mismatching route");
        Self {
            binder: Binder::new(access),
            route,
            cursor: 0,
            validate,
        }
    }

    /// Number of lookups replayed or appended so far.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl<'c> Request<'c> for ReplayRequest<'_, 'c> {
    fn component<T: Component>(&mut self, column: &mut Column<'c, T>) -> bool {
        if self.route.mismatch {
            return false;
        }
        let position = self.cursor;
        self.cursor += 1;

        let Some(step) = self.route.steps.get(position).copied() else {
            log::debug!(
                "extending route past step {position} for {}",
                type_name::<T>()
            );
            return self.route.extend(&mut self.binder, column);
        };
        if self.validate {
            invariant!(
                step.type_id == TypeId::of::<T>(),
                "route replay desynced at step {position}: requested {}",
                type_name::<T>()
            );
        }
        match step.slot {
            Some(slot) => {
                self.binder.bind(slot, column);
                true
            }
            None => false,
        }
    }

    fn parent_component<T: Component>(&mut self, column: &mut Option<&'c [T]>) -> bool {
        self.binder.parent_component(column)
    }

    fn chunk_index(&mut self, index: &mut usize) -> bool {
        *index = 0;
        true
    }

    fn parent_chunk(&mut self, parent: &mut Option<ChunkView<'c>>) -> bool {
        self.binder.parent_chunk(parent)
    }

    fn children_chunk(&mut self, children: &mut Option<ChunkView<'c>>) -> bool {
        self.binder.children_chunk(children)
    }
}
