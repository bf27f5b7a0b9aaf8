//! Exclusive column access for running operations.
//!
//! A [`ChunkAccess`] is what every chunk shape reduces to before an operation
//! runs on it: the columns of sub-chunk 0, the node count of each sub-chunk,
//! and, for tree nodes, read-only views of the parent and first child. A plain
//! chunk is the one-sub-chunk case.

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use nodepack_foundation::invariant;

use crate::chunk::ChunkView;
use crate::kind::ChunkKind;
use crate::structure::Structure;

/// Exclusive access to the columns of one chunk or one chunk array.
///
/// Holding a `ChunkAccess<'a>` means nothing else reads or writes the target's
/// columns for `'a`. Parent and child views are shared reads of other chunks.
pub struct ChunkAccess<'a> {
    kind: ChunkKind,
    structure: Option<&'a Structure>,
    base: &'a [NonNull<u8>],
    counts: &'a [usize],
    node_capacity: usize,
    parent: Option<ChunkView<'a>>,
    children: Option<ChunkView<'a>>,
    claimed: Cell<bool>,
    _exclusive: PhantomData<&'a mut [u8]>,
}

impl<'a> ChunkAccess<'a> {
    /// Access to nothing.
    #[must_use]
    pub fn null(kind: ChunkKind) -> Self {
        Self {
            kind,
            structure: None,
            base: &[],
            counts: &[],
            node_capacity: 0,
            parent: None,
            children: None,
            claimed: Cell::new(false),
            _exclusive: PhantomData,
        }
    }

    /// Assembles access from parts of an allocation the caller holds exclusively.
    ///
    /// `base` holds sub-chunk 0's blocks; sub-chunk `i` of a per-node column
    /// starts `i * node_capacity` records further, of a per-chunk column `i`
    /// records further.
    pub(crate) fn from_parts(
        kind: ChunkKind,
        structure: &'a Structure,
        base: &'a [NonNull<u8>],
        counts: &'a [usize],
        node_capacity: usize,
    ) -> Self {
        debug_assert_eq!(structure.len(), base.len());
        Self {
            kind,
            structure: Some(structure),
            base,
            counts,
            node_capacity,
            parent: None,
            children: None,
            claimed: Cell::new(false),
            _exclusive: PhantomData,
        }
    }

    /// Attaches tree neighbour views.
    pub(crate) fn with_neighbours(
        mut self,
        parent: Option<ChunkView<'a>>,
        children: Option<ChunkView<'a>>,
    ) -> Self {
        self.parent = parent;
        self.children = children;
        self
    }

    /// Shape of the target.
    #[must_use]
    pub fn kind(&self) -> ChunkKind {
        self.kind
    }

    /// Returns true if there is nothing to run on.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.structure.is_none()
    }

    /// Structure shared by every sub-chunk.
    #[must_use]
    pub fn structure(&self) -> Option<&'a Structure> {
        self.structure
    }

    /// Number of active sub-chunks (1 for a plain chunk).
    #[must_use]
    pub fn sub_chunk_count(&self) -> usize {
        self.counts.len()
    }

    /// Live nodes in sub-chunk `index`, 0 past the last active sub-chunk.
    #[must_use]
    pub fn node_count(&self, index: usize) -> usize {
        self.counts.get(index).copied().unwrap_or(0)
    }

    /// Node capacity of each sub-chunk.
    #[must_use]
    pub fn node_capacity(&self) -> usize {
        self.node_capacity
    }

    /// Block of the column at `slot` in sub-chunk 0.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is out of range.
    #[must_use]
    pub fn block(&self, slot: usize) -> NonNull<u8> {
        invariant!(
            slot < self.base.len(),
            "slot {slot} out of range ({} columns)",
            self.base.len()
        );
        self.base[slot]
    }

    /// Records between the starts of two adjacent sub-chunks in the column at `slot`.
    #[must_use]
    pub fn stride(&self, slot: usize) -> usize {
        match self.structure {
            Some(structure) => structure.component_at(slot).records_for(self.node_capacity),
            None => 0,
        }
    }

    /// Marks the columns as handed out to a binding.
    ///
    /// Returns false if they already were; binding them again would alias
    /// the first binding's mutable columns.
    #[must_use]
    pub fn claim(&self) -> bool {
        !self.claimed.replace(true)
    }

    /// Read-only view of the parent tree node, if any.
    #[must_use]
    pub fn parent(&self) -> Option<ChunkView<'a>> {
        self.parent
    }

    /// Read-only view of the first child tree node, if any.
    #[must_use]
    pub fn children(&self) -> Option<ChunkView<'a>> {
        self.children
    }
}

impl fmt::Debug for ChunkAccess<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkAccess")
            .field("kind", &self.kind)
            .field("structure", &self.structure.map(Structure::id))
            .field("counts", &self.counts)
            .field("node_capacity", &self.node_capacity)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .finish()
    }
}
