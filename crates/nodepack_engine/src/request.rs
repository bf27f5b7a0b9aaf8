//! Capability requests: what an operation's `requirements` talks to.
//!
//! An operation never sees a chunk directly. Its `requirements` asks a
//! [`Request`] for each column or tree neighbour it needs, and the request
//! decides where the answer comes from: a hash lookup ([`BindRequest`]), a
//! recorded route ([`RecordRequest`](crate::RecordRequest) and
//! [`ReplayRequest`](crate::ReplayRequest)), the previous sub-chunk's binding
//! ([`OffsetRequest`]), or the structure alone ([`MatchRequest`]).

use std::any::{TypeId, type_name};

use nodepack_foundation::{Component, Ownership, fatal, invariant};
use nodepack_storage::{ChunkAccess, ChunkView, Structure};

use crate::column::Column;

/// Capabilities an operation can ask for while declaring its requirements.
///
/// Every method reports whether the capability is available. The defaults
/// report that it is not. A component that is absent fails the whole binding,
/// even when `requirements` ignores the `false` and carries on.
pub trait Request<'c> {
    /// Binds `column` to the component `T` of the target chunk.
    fn component<T: Component>(&mut self, column: &mut Column<'c, T>) -> bool {
        let _ = column;
        false
    }

    /// Binds `column` to the component `T` of the target's tree parent.
    fn parent_component<T: Component>(&mut self, column: &mut Option<&'c [T]>) -> bool {
        let _ = column;
        false
    }

    /// Stores the index of the sub-chunk being run.
    fn chunk_index(&mut self, index: &mut usize) -> bool {
        let _ = index;
        false
    }

    /// Stores a view of the target's tree parent.
    fn parent_chunk(&mut self, parent: &mut Option<ChunkView<'c>>) -> bool {
        let _ = parent;
        false
    }

    /// Stores a view of the target's first tree child.
    fn children_chunk(&mut self, children: &mut Option<ChunkView<'c>>) -> bool {
        let _ = children;
        false
    }
}

// =============================================================================
// Binding
// =============================================================================

/// Binds columns of one claimed chunk access.
///
/// Shared by every request that hands out columns.
pub(crate) struct Binder<'r, 'c> {
    access: &'r ChunkAccess<'c>,
    bound: Vec<usize>,
}

impl<'r, 'c> Binder<'r, 'c> {
    /// Claims `access` for one binding.
    ///
    /// # Panics
    ///
    /// Panics if `access` is null or was already claimed.
    pub(crate) fn new(access: &'r ChunkAccess<'c>) -> Self {
        invariant!(!access.is_null(), "cannot bind columns of a null chunk");
        invariant!(
            access.claim(),
            "columns of this {} are already bound",
            access.kind()
        );
        Self {
            access,
            bound: Vec::new(),
        }
    }

    pub(crate) fn structure(&self) -> &'c Structure {
        match self.access.structure() {
            Some(structure) => structure,
            None => fatal(format_args!("claimed access has no structure")),
        }
    }

    /// Binds `column` to `slot` of sub-chunk 0.
    pub(crate) fn bind<T: Component>(&mut self, slot: usize, column: &mut Column<'c, T>) {
        invariant!(
            !self.bound.contains(&slot),
            "component {} requested twice in one binding",
            type_name::<T>()
        );
        let ty = self.structure().component_at(slot);
        invariant!(
            ty.layout_matches::<T>(),
            "route slot {slot} holds {ty:?}, which cannot be read as {}",
            type_name::<T>()
        );
        self.bound.push(slot);
        let len = match ty.ownership() {
            Ownership::PerNode => self.access.node_count(0),
            Ownership::PerChunk => 1,
        };
        column.bind(self.access.block(slot), len, ty.ownership());
    }

    /// Looks `T` up by hash and binds it if present.
    pub(crate) fn lookup<T: Component>(&mut self, column: &mut Column<'c, T>) -> Option<usize> {
        let slot = self.structure().index_of(TypeId::of::<T>())?;
        self.bind(slot, column);
        Some(slot)
    }

    pub(crate) fn parent_component<T: Component>(&self, column: &mut Option<&'c [T]>) -> bool {
        *column = if self.access.kind().is_tree() {
            self.access.parent().and_then(|parent| parent.column::<T>())
        } else {
            None
        };
        column.is_some()
    }

    pub(crate) fn parent_chunk(&self, parent: &mut Option<ChunkView<'c>>) -> bool {
        *parent = if self.access.kind().is_tree() {
            self.access.parent()
        } else {
            None
        };
        parent.is_some()
    }

    pub(crate) fn children_chunk(&self, children: &mut Option<ChunkView<'c>>) -> bool {
        *children = if self.access.kind().is_tree() {
            self.access.children()
        } else {
            None
        };
        children.is_some()
    }
}

/// Uncached request: hashes every component type against the structure.
pub struct BindRequest<'r, 'c> {
    binder: Binder<'r, 'c>,
    missing: bool,
}

impl<'r, 'c> BindRequest<'r, 'c> {
    /// Creates a request that binds columns of `access`.
    ///
    /// # Panics
    ///
    /// Panics if `access` is null or its columns are already bound.
    #[must_use]
    pub fn new(access: &'r ChunkAccess<'c>) -> Self {
        Self {
            binder: Binder::new(access),
            missing: false,
        }
    }

    /// Returns false once a requested component was absent.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.missing
    }
}

impl<'c> Request<'c> for BindRequest<'_, 'c> {
    fn component<T: Component>(&mut self, column: &mut Column<'c, T>) -> bool {
        if self.missing {
            return false;
        }
        let found = self.binder.lookup(column).is_some();
        self.missing = !found;
        found
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
// Array Stepping
// =============================================================================

/// Moves an existing binding from one sub-chunk to the next.
///
/// Per-node columns move by the per-chunk node capacity and take the next
/// sub-chunk's node count; per-chunk columns move by one record. Unbound
/// columns stay unbound. Every other capability is left as it was.
pub struct OffsetRequest<'r, 'c> {
    access: &'r ChunkAccess<'c>,
    index: usize,
    moved: Vec<usize>,
}

impl<'r, 'c> OffsetRequest<'r, 'c> {
    /// Creates a request that moves columns onto sub-chunk `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is 0 or not an active sub-chunk of `access`.
    pub(crate) fn new(access: &'r ChunkAccess<'c>, index: usize) -> Self {
        invariant!(
            index > 0 && index < access.sub_chunk_count(),
            "cannot step onto sub-chunk {index} of {}",
            access.sub_chunk_count()
        );
        Self {
            access,
            index,
            moved: Vec::new(),
        }
    }

    /// Sub-chunk the binding is being moved onto.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<'c> Request<'c> for OffsetRequest<'_, 'c> {
    fn component<T: Component>(&mut self, column: &mut Column<'c, T>) -> bool {
        if !column.is_bound() {
            return true;
        }
        let address = std::ptr::from_mut(column) as usize;
        invariant!(
            !self.moved.contains(&address),
            "column {} stepped twice onto sub-chunk {}",
            type_name::<T>(),
            self.index
        );
        self.moved.push(address);
        match column.ownership() {
            Ownership::PerNode => column.advance(
                self.access.node_capacity(),
                self.access.node_count(self.index),
            ),
            Ownership::PerChunk => column.advance(1, 1),
        }
        true
    }

    fn parent_component<T: Component>(&mut self, _column: &mut Option<&'c [T]>) -> bool {
        true
    }

    fn chunk_index(&mut self, index: &mut usize) -> bool {
        *index += 1;
        true
    }

    fn parent_chunk(&mut self, _parent: &mut Option<ChunkView<'c>>) -> bool {
        true
    }

    fn children_chunk(&mut self, _children: &mut Option<ChunkView<'c>>) -> bool {
        true
    }
}

// =============================================================================
// Matching
// =============================================================================

/// Structure-only check: does every requested component exist?
///
/// Binds nothing. Neighbour and index capabilities are assumed available.
pub struct MatchRequest<'s> {
    structure: &'s Structure,
    missing: bool,
}

impl<'s> MatchRequest<'s> {
    /// Creates a request that checks `structure`.
    #[must_use]
    pub fn new(structure: &'s Structure) -> Self {
        Self {
            structure,
            missing: false,
        }
    }

    /// Returns false once a requested component was absent.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.missing
    }
}

impl<'c> Request<'c> for MatchRequest<'_> {
    fn component<T: Component>(&mut self, _column: &mut Column<'c, T>) -> bool {
        if !self.structure.contains::<T>() {
            self.missing = true;
        }
        !self.missing
    }

    fn parent_component<T: Component>(&mut self, _column: &mut Option<&'c [T]>) -> bool {
        true
    }

    fn chunk_index(&mut self, _index: &mut usize) -> bool {
        true
    }

    fn parent_chunk(&mut self, _parent: &mut Option<ChunkView<'c>>) -> bool {
        true
    }

    fn children_chunk(&mut self, _children: &mut Option<ChunkView<'c>>) -> bool {
        true
    }
}
