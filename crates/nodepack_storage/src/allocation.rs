//! Owning chunk allocations.
//!
//! A [`ChunkAllocation`] owns one zeroed block per component of its
//! structure, sized for a fixed node capacity. Per-node columns get one
//! record per node, per-chunk columns a single record.

use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use nodepack_foundation::{
    BlockAllocator, Component, Error, ErrorContext, Result, SystemAllocator, allocate_block,
    free_block, invariant,
};

use crate::access::ChunkAccess;
use crate::chunk::{ChunkView, ChunkViewMut, copy_records};
use crate::kind::ChunkKind;
use crate::structure::Structure;

/// One chunk together with the memory behind it.
pub struct ChunkAllocation {
    structure: Option<Arc<Structure>>,
    blocks: Vec<NonNull<u8>>,
    node_count: usize,
    node_capacity: usize,
    allocator: Arc<dyn BlockAllocator>,
}

impl ChunkAllocation {
    /// Allocates a chunk of `structure` with room for `node_capacity` nodes,
    /// `node_count` of them live.
    ///
    /// # Panics
    ///
    /// Panics if `node_count` exceeds `node_capacity`.
    #[must_use]
    pub fn new(structure: Arc<Structure>, node_capacity: usize, node_count: usize) -> Self {
        Self::new_in(structure, node_capacity, node_count, Arc::new(SystemAllocator))
    }

    /// Same as [`ChunkAllocation::new`], drawing blocks from `allocator`.
    ///
    /// # Panics
    ///
    /// Panics if `node_count` exceeds `node_capacity`.
    #[must_use]
    pub fn new_in(
        structure: Arc<Structure>,
        node_capacity: usize,
        node_count: usize,
        allocator: Arc<dyn BlockAllocator>,
    ) -> Self {
        invariant!(
            node_count <= node_capacity,
            "node count {node_count} exceeds capacity {node_capacity}"
        );
        let blocks = structure
            .components()
            .iter()
            .map(|ty| allocate_block(&*allocator, ty.layout_for(ty.records_for(node_capacity))))
            .collect();
        Self {
            structure: Some(structure),
            blocks,
            node_count,
            node_capacity,
            allocator,
        }
    }

    /// A chunk with no structure and no memory.
    #[must_use]
    pub fn null() -> Self {
        Self {
            structure: None,
            blocks: Vec::new(),
            node_count: 0,
            node_capacity: 0,
            allocator: Arc::new(SystemAllocator),
        }
    }

    /// Returns true if this chunk has no structure.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.structure.is_none()
    }

    /// Structure of the chunk.
    #[must_use]
    pub fn structure(&self) -> Option<&Arc<Structure>> {
        self.structure.as_ref()
    }

    /// Number of live nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Fixed node capacity.
    #[must_use]
    pub fn node_capacity(&self) -> usize {
        self.node_capacity
    }

    /// Sets the number of live nodes.
    ///
    /// # Panics
    ///
    /// Panics if `count` exceeds the node capacity.
    pub fn set_node_count(&mut self, count: usize) {
        invariant!(
            count <= self.node_capacity,
            "node count {count} exceeds capacity {}",
            self.node_capacity
        );
        self.node_count = count;
    }

    /// Allocator the blocks came from.
    #[must_use]
    pub fn allocator(&self) -> &Arc<dyn BlockAllocator> {
        &self.allocator
    }

    /// Raw block of the column at `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is out of range.
    #[must_use]
    pub fn component_data(&self, slot: usize) -> NonNull<u8> {
        self.view().block(slot)
    }

    /// Read-only view of the chunk.
    #[must_use]
    pub fn view(&self) -> ChunkView<'_> {
        match &self.structure {
            Some(structure) => ChunkView::from_parts(structure, &self.blocks, self.node_count),
            None => ChunkView::null(),
        }
    }

    /// Mutable view of the chunk.
    #[must_use]
    pub fn view_mut(&mut self) -> ChunkViewMut<'_> {
        ChunkViewMut::from_parts(
            self.structure.as_deref(),
            &self.blocks,
            &mut self.node_count,
            self.node_capacity,
        )
    }

    /// Exclusive column access for running operations.
    #[must_use]
    pub fn access(&mut self) -> ChunkAccess<'_> {
        self.access_as(ChunkKind::Chunk)
    }

    /// Exclusive access tagged with `kind`. Callers must hold the chunk exclusively.
    pub(crate) fn access_as(&self, kind: ChunkKind) -> ChunkAccess<'_> {
        match &self.structure {
            Some(structure) => ChunkAccess::from_parts(
                kind,
                structure,
                &self.blocks,
                std::slice::from_ref(&self.node_count),
                self.node_capacity,
            ),
            None => ChunkAccess::null(kind),
        }
    }

    /// Live records of component `T`.
    #[must_use]
    pub fn column<T: Component>(&self) -> Option<&[T]> {
        self.view().column::<T>()
    }

    /// Live records of component `T`, mutably.
    pub fn column_mut<T: Component>(&mut self) -> Option<&mut [T]> {
        self.view_mut().into_column_mut::<T>()
    }

    /// Copies live records from `source`, which must share this chunk's structure.
    ///
    /// Copies `min(capacity, source count)` node records and sets the node
    /// count to that number, which is returned.
    pub fn copy_from(&mut self, source: &ChunkView<'_>) -> Result<usize> {
        let context = ErrorContext::new().with_operation("copy_from");
        let (Some(structure), Some(source_structure)) = (&self.structure, source.structure())
        else {
            return Err(Error::null_chunk().with_context(context));
        };
        if !Structure::same(structure, source_structure) {
            return Err(
                Error::structure_mismatch(structure.id(), source_structure.id())
                    .with_context(context.with_structure(structure.id())),
            );
        }
        let count = self.node_capacity.min(source.node_count());
        // SAFETY: same structure, the destination has room for `count` nodes,
        // and `&mut self` cannot alias the borrowed source.
        unsafe { copy_records(structure, &self.blocks, source.blocks(), count) };
        self.node_count = count;
        Ok(count)
    }

    /// Frees the blocks and leaves a null chunk. Does nothing on a null chunk.
    pub fn deallocate(&mut self) {
        let Some(structure) = self.structure.take() else {
            return;
        };
        for (ty, block) in structure.components().iter().zip(self.blocks.drain(..)) {
            let layout = ty.layout_for(ty.records_for(self.node_capacity));
            // SAFETY: the block was allocated from this allocator with this
            // layout and is removed from the chunk here.
            unsafe { free_block(&*self.allocator, block, layout) };
        }
        self.node_count = 0;
        self.node_capacity = 0;
    }
}

impl Clone for ChunkAllocation {
    fn clone(&self) -> Self {
        let Some(structure) = &self.structure else {
            return Self::null();
        };
        let copy = Self::new_in(
            Arc::clone(structure),
            self.node_capacity,
            self.node_count,
            Arc::clone(&self.allocator),
        );
        // SAFETY: fresh blocks of the same structure and capacity.
        unsafe { copy_records(structure, &copy.blocks, &self.blocks, self.node_count) };
        copy
    }
}

impl Drop for ChunkAllocation {
    fn drop(&mut self) {
        self.deallocate();
    }
}

impl Default for ChunkAllocation {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for ChunkAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkAllocation")
            .field("structure", &self.structure.as_ref().map(|s| s.id()))
            .field("node_count", &self.node_count)
            .field("node_capacity", &self.node_capacity)
            .finish_non_exhaustive()
    }
}
