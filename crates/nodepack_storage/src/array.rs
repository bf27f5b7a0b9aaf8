//! Chunk arrays: many same-structure chunks in one allocation.
//!
//! Each component gets a single block holding every sub-chunk's records back
//! to back. Sub-chunk `i` of a per-node column starts at record
//! `i * node_capacity_per_chunk`; sub-chunk `i` of a per-chunk column is
//! record `i`. The per-sub-chunk block pointers are computed once at
//! construction.

use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use nodepack_foundation::{
    BlockAllocator, ComponentType, SystemAllocator, allocate_block, fatal, free_block, invariant,
};

use crate::access::ChunkAccess;
use crate::chunk::{ChunkView, ChunkViewMut, copy_records};
use crate::kind::ChunkKind;
use crate::structure::Structure;

/// A batch of adjacent sub-chunks sharing one structure and one allocation.
pub struct ChunkArray {
    structure: Option<Arc<Structure>>,
    /// One block per component, covering every sub-chunk.
    blocks: Vec<NonNull<u8>>,
    /// `chunk_capacity * component_count` pre-offset pointers; sub-chunk `i`
    /// owns `sub_blocks[i * component_count..(i + 1) * component_count]`.
    sub_blocks: Vec<NonNull<u8>>,
    /// Live node count of every sub-chunk, active or not.
    sub_counts: Vec<usize>,
    node_capacity_per_chunk: usize,
    chunk_capacity: usize,
    chunk_count: usize,
    allocator: Arc<dyn BlockAllocator>,
}

impl ChunkArray {
    /// Allocates `chunk_capacity` sub-chunks of `node_capacity_per_chunk`
    /// nodes each. The first `chunk_count` are active, each with
    /// `node_count_per_chunk` live nodes.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_capacity` is zero, `chunk_count` exceeds
    /// `chunk_capacity`, or `node_count_per_chunk` exceeds
    /// `node_capacity_per_chunk`.
    #[must_use]
    pub fn new(
        structure: Arc<Structure>,
        node_capacity_per_chunk: usize,
        chunk_capacity: usize,
        chunk_count: usize,
        node_count_per_chunk: usize,
    ) -> Self {
        Self::new_in(
            structure,
            node_capacity_per_chunk,
            chunk_capacity,
            chunk_count,
            node_count_per_chunk,
            Arc::new(SystemAllocator),
        )
    }

    /// Same as [`ChunkArray::new`], drawing blocks from `allocator`.
    ///
    /// # Panics
    ///
    /// Same conditions as [`ChunkArray::new`].
    #[must_use]
    pub fn new_in(
        structure: Arc<Structure>,
        node_capacity_per_chunk: usize,
        chunk_capacity: usize,
        chunk_count: usize,
        node_count_per_chunk: usize,
        allocator: Arc<dyn BlockAllocator>,
    ) -> Self {
        invariant!(chunk_capacity > 0, "chunk array needs at least one sub-chunk");
        invariant!(
            chunk_count <= chunk_capacity,
            "chunk count {chunk_count} exceeds capacity {chunk_capacity}"
        );
        invariant!(
            node_count_per_chunk <= node_capacity_per_chunk,
            "node count {node_count_per_chunk} exceeds capacity {node_capacity_per_chunk}"
        );
        invariant!(
            node_capacity_per_chunk.checked_mul(chunk_capacity).is_some(),
            "{chunk_capacity} sub-chunks of {node_capacity_per_chunk} nodes overflow"
        );

        let blocks: Vec<_> = structure
            .components()
            .iter()
            .map(|ty| {
                let records = block_records(ty, node_capacity_per_chunk, chunk_capacity);
                allocate_block(&*allocator, ty.layout_for(records))
            })
            .collect();

        let mut sub_blocks = Vec::with_capacity(chunk_capacity * blocks.len());
        for index in 0..chunk_capacity {
            for (ty, base) in structure.components().iter().zip(&blocks) {
                // Bounded by the block's record count and byte length, both
                // checked above.
                let offset = ty.byte_len(index * ty.records_for(node_capacity_per_chunk));
                // SAFETY: `offset` is at most the block length, which was
                // sized for `chunk_capacity` strides.
                sub_blocks.push(unsafe { base.add(offset) });
            }
        }

        let mut sub_counts = vec![0; chunk_capacity];
        sub_counts[..chunk_count].fill(node_count_per_chunk);

        Self {
            structure: Some(structure),
            blocks,
            sub_blocks,
            sub_counts,
            node_capacity_per_chunk,
            chunk_capacity,
            chunk_count,
            allocator,
        }
    }

    /// An array with no structure and no memory.
    #[must_use]
    pub fn null() -> Self {
        Self {
            structure: None,
            blocks: Vec::new(),
            sub_blocks: Vec::new(),
            sub_counts: Vec::new(),
            node_capacity_per_chunk: 0,
            chunk_capacity: 0,
            chunk_count: 0,
            allocator: Arc::new(SystemAllocator),
        }
    }

    /// Returns true if this array has no structure.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.structure.is_none()
    }

    /// Structure shared by every sub-chunk.
    #[must_use]
    pub fn structure(&self) -> Option<&Arc<Structure>> {
        self.structure.as_ref()
    }

    /// Node capacity of each sub-chunk.
    #[must_use]
    pub fn node_capacity_per_chunk(&self) -> usize {
        self.node_capacity_per_chunk
    }

    /// Number of sub-chunks the allocation has room for.
    #[must_use]
    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    /// Number of active sub-chunks.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Node capacity across every sub-chunk.
    #[must_use]
    pub fn node_capacity_total(&self) -> usize {
        // Checked at construction.
        self.node_capacity_per_chunk * self.chunk_capacity
    }

    /// Live nodes across the active sub-chunks.
    #[must_use]
    pub fn total_node_count(&self) -> usize {
        self.sub_counts[..self.chunk_count].iter().sum()
    }

    /// Sets the number of active sub-chunks.
    ///
    /// Sub-chunks keep their node counts while inactive.
    ///
    /// # Panics
    ///
    /// Panics if `count` exceeds the chunk capacity.
    pub fn set_chunk_count(&mut self, count: usize) {
        invariant!(
            count <= self.chunk_capacity,
            "chunk count {count} exceeds capacity {}",
            self.chunk_capacity
        );
        self.chunk_count = count;
    }

    /// Sets the live node count of sub-chunk `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not an active sub-chunk or `count` exceeds the
    /// per-chunk node capacity.
    pub fn set_node_count(&mut self, index: usize, count: usize) {
        self.check_index(index);
        invariant!(
            count <= self.node_capacity_per_chunk,
            "node count {count} exceeds capacity {}",
            self.node_capacity_per_chunk
        );
        self.sub_counts[index] = count;
    }

    /// View of active sub-chunk `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= chunk_count`.
    #[must_use]
    pub fn sub_chunk(&self, index: usize) -> ChunkView<'_> {
        self.check_index(index);
        match &self.structure {
            Some(structure) => ChunkView::from_parts(
                structure,
                self.sub_blocks_of(index),
                self.sub_counts[index],
            ),
            None => ChunkView::null(),
        }
    }

    /// Mutable view of active sub-chunk `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= chunk_count`.
    #[must_use]
    pub fn sub_chunk_mut(&mut self, index: usize) -> ChunkViewMut<'_> {
        self.check_index(index);
        let width = self.blocks.len();
        ChunkViewMut::from_parts(
            self.structure.as_deref(),
            &self.sub_blocks[index * width..(index + 1) * width],
            &mut self.sub_counts[index],
            self.node_capacity_per_chunk,
        )
    }

    /// Views of every active sub-chunk, in order.
    pub fn sub_chunks(&self) -> impl Iterator<Item = ChunkView<'_>> + '_ {
        (0..self.chunk_count).map(move |index| self.sub_chunk(index))
    }

    /// View of sub-chunk 0, whether active or not. Null for a null array.
    #[must_use]
    pub fn base(&self) -> ChunkView<'_> {
        match &self.structure {
            Some(structure) => {
                ChunkView::from_parts(structure, self.sub_blocks_of(0), self.sub_counts[0])
            }
            None => ChunkView::null(),
        }
    }

    /// Exclusive column access over the active sub-chunks.
    #[must_use]
    pub fn access(&mut self) -> ChunkAccess<'_> {
        self.access_as(ChunkKind::ChunkArray)
    }

    /// Exclusive access tagged with `kind`. Callers must hold the array exclusively.
    pub(crate) fn access_as(&self, kind: ChunkKind) -> ChunkAccess<'_> {
        match &self.structure {
            Some(structure) => ChunkAccess::from_parts(
                kind,
                structure,
                self.sub_blocks_of(0),
                &self.sub_counts[..self.chunk_count],
                self.node_capacity_per_chunk,
            ),
            None => ChunkAccess::null(kind),
        }
    }

    /// Frees the shared blocks and leaves a null array. Does nothing on a null array.
    pub fn deallocate(&mut self) {
        let Some(structure) = self.structure.take() else {
            return;
        };
        for (ty, block) in structure.components().iter().zip(self.blocks.drain(..)) {
            let records = block_records(ty, self.node_capacity_per_chunk, self.chunk_capacity);
            // SAFETY: allocated from this allocator with this layout and
            // removed from the array here.
            unsafe { free_block(&*self.allocator, block, ty.layout_for(records)) };
        }
        self.sub_blocks.clear();
        self.sub_counts.clear();
        self.node_capacity_per_chunk = 0;
        self.chunk_capacity = 0;
        self.chunk_count = 0;
    }

    fn sub_blocks_of(&self, index: usize) -> &[NonNull<u8>] {
        let width = self.blocks.len();
        &self.sub_blocks[index * width..(index + 1) * width]
    }

    fn check_index(&self, index: usize) {
        invariant!(
            index < self.chunk_count,
            "sub-chunk {index} out of range ({} active)",
            self.chunk_count
        );
    }
}

/// Records of `ty` in one block covering `chunk_capacity` sub-chunks.
fn block_records(
    ty: &ComponentType,
    node_capacity_per_chunk: usize,
    chunk_capacity: usize,
) -> usize {
    match ty.records_for(node_capacity_per_chunk).checked_mul(chunk_capacity) {
        Some(records) => records,
        None => fatal(format_args!(
            "{chunk_capacity} sub-chunks of {node_capacity_per_chunk} {} records overflow",
            ty.name()
        )),
    }
}

impl Clone for ChunkArray {
    fn clone(&self) -> Self {
        let Some(structure) = &self.structure else {
            return Self::null();
        };
        let mut copy = Self::new_in(
            Arc::clone(structure),
            self.node_capacity_per_chunk,
            self.chunk_capacity,
            self.chunk_count,
            0,
            Arc::clone(&self.allocator),
        );
        copy.sub_counts.copy_from_slice(&self.sub_counts);
        for index in 0..self.chunk_capacity {
            // SAFETY: fresh blocks of the same structure and capacities; each
            // sub-chunk has room for its own live count.
            unsafe {
                copy_records(
                    structure,
                    copy.sub_blocks_of(index),
                    self.sub_blocks_of(index),
                    self.sub_counts[index],
                );
            }
        }
        copy
    }
}

impl Drop for ChunkArray {
    fn drop(&mut self) {
        self.deallocate();
    }
}

impl Default for ChunkArray {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for ChunkArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkArray")
            .field("structure", &self.structure.as_ref().map(|s| s.id()))
            .field("node_capacity_per_chunk", &self.node_capacity_per_chunk)
            .field("chunk_count", &self.chunk_count)
            .field("chunk_capacity", &self.chunk_capacity)
            .field("sub_counts", &&self.sub_counts[..self.chunk_count])
            .finish_non_exhaustive()
    }
}
