//! Chunk views: non-owning access to one structure's worth of columns.
//!
//! A view is the triple (structure, column blocks, node count). Copying a view
//! never copies records. Views borrow the allocation they were taken from, so
//! they cannot outlive it.

use std::fmt;
use std::ptr::{self, NonNull};
use std::slice;

use nodepack_foundation::{Component, ComponentType, Error, ErrorContext, Result, fatal, invariant};

use crate::structure::Structure;

/// Read-only view of one chunk.
#[derive(Clone, Copy)]
pub struct ChunkView<'a> {
    structure: Option<&'a Structure>,
    blocks: &'a [NonNull<u8>],
    node_count: usize,
}

impl<'a> ChunkView<'a> {
    /// A view of no chunk.
    #[must_use]
    pub const fn null() -> Self {
        Self {
            structure: None,
            blocks: &[],
            node_count: 0,
        }
    }

    /// Assembles a view from parts owned by an allocation.
    ///
    /// `blocks` must hold one block per component of `structure`, each with
    /// at least `node_count` valid records (one for per-chunk components),
    /// and must stay unmodified for `'a`.
    pub(crate) fn from_parts(
        structure: &'a Structure,
        blocks: &'a [NonNull<u8>],
        node_count: usize,
    ) -> Self {
        debug_assert_eq!(structure.len(), blocks.len());
        Self {
            structure: Some(structure),
            blocks,
            node_count,
        }
    }

    /// Returns true if this view has no structure.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.structure.is_none()
    }

    /// Structure of the chunk, or `None` for a null view.
    #[must_use]
    pub fn structure(&self) -> Option<&'a Structure> {
        self.structure
    }

    /// Number of live nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Raw column blocks in slot order.
    #[must_use]
    pub fn blocks(&self) -> &'a [NonNull<u8>] {
        self.blocks
    }

    /// Raw block of the column at `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is out of range.
    #[must_use]
    pub fn block(&self, slot: usize) -> NonNull<u8> {
        invariant!(
            slot < self.blocks.len(),
            "slot {slot} out of range ({} columns)",
            self.blocks.len()
        );
        self.blocks[slot]
    }

    /// Live records of component `T`, or `None` if the chunk has no such column.
    #[must_use]
    pub fn column<T: Component>(&self) -> Option<&'a [T]> {
        let slot = self.structure?.index_of_component::<T>()?;
        Some(self.column_at(slot))
    }

    /// Live records of the column at `slot`, read as `T`.
    ///
    /// # Panics
    ///
    /// Panics if the view is null, `slot` is out of range, or the column's
    /// layout does not fit `T`.
    #[must_use]
    pub fn column_at<T: Component>(&self, slot: usize) -> &'a [T] {
        let Some(structure) = self.structure else {
            fatal(format_args!("column read on a null chunk"))
        };
        let ty = structure.component_at(slot);
        check_layout::<T>(ty);
        let len = ty.records_for(self.node_count);
        // SAFETY: the block holds at least `len` initialized records of this
        // layout, `T` is `Pod` with matching size and alignment, and the
        // allocation is not mutated while `'a` lasts.
        unsafe { slice::from_raw_parts(self.blocks[slot].cast::<T>().as_ptr(), len) }
    }
}

impl Default for ChunkView<'_> {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for ChunkView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.structure {
            None => write!(f, "ChunkView(null)"),
            Some(s) => write!(f, "ChunkView({}, {} nodes)", s.id(), self.node_count),
        }
    }
}

/// Mutable view of one chunk.
///
/// Writes through this view go to the allocation it was taken from, including
/// node count changes.
pub struct ChunkViewMut<'a> {
    structure: Option<&'a Structure>,
    blocks: &'a [NonNull<u8>],
    node_count: &'a mut usize,
    node_capacity: usize,
}

impl<'a> ChunkViewMut<'a> {
    /// Assembles a mutable view from parts owned by an allocation.
    ///
    /// Same requirements as [`ChunkView::from_parts`], with `node_capacity`
    /// records per column and exclusive access for `'a`.
    pub(crate) fn from_parts(
        structure: Option<&'a Structure>,
        blocks: &'a [NonNull<u8>],
        node_count: &'a mut usize,
        node_capacity: usize,
    ) -> Self {
        Self {
            structure,
            blocks,
            node_count,
            node_capacity,
        }
    }

    /// Returns true if this view has no structure.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.structure.is_none()
    }

    /// Structure of the chunk, or `None` for a null view.
    #[must_use]
    pub fn structure(&self) -> Option<&'a Structure> {
        self.structure
    }

    /// Number of live nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        *self.node_count
    }

    /// Number of nodes the columns have room for.
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
        *self.node_count = count;
    }

    /// Read-only view of the same chunk.
    #[must_use]
    pub fn as_view(&self) -> ChunkView<'_> {
        ChunkView {
            structure: self.structure,
            blocks: self.blocks,
            node_count: *self.node_count,
        }
    }

    /// Live records of component `T`, or `None` if the chunk has no such column.
    pub fn column_mut<T: Component>(&mut self) -> Option<&mut [T]> {
        let slot = self.structure?.index_of_component::<T>()?;
        Some(self.column_mut_at(slot))
    }

    /// Live records of the column at `slot`, read as `T`.
    ///
    /// # Panics
    ///
    /// Panics if the view is null, `slot` is out of range, or the column's
    /// layout does not fit `T`.
    pub fn column_mut_at<T: Component>(&mut self, slot: usize) -> &mut [T] {
        let (records, len) = self.raw_column::<T>(slot);
        // SAFETY: as in `ChunkView::column_at`; the view is exclusive and the
        // returned slice borrows it mutably.
        unsafe { slice::from_raw_parts_mut(records, len) }
    }

    /// Consumes the view, returning the live records of component `T` for the
    /// whole borrow.
    #[must_use]
    pub fn into_column_mut<T: Component>(self) -> Option<&'a mut [T]> {
        let slot = self.structure?.index_of_component::<T>()?;
        let (records, len) = self.raw_column::<T>(slot);
        // SAFETY: the view held exclusive access for `'a` and is consumed here.
        Some(unsafe { slice::from_raw_parts_mut(records, len) })
    }

    fn raw_column<T: Component>(&self, slot: usize) -> (*mut T, usize) {
        let Some(structure) = self.structure else {
            fatal(format_args!("column write on a null chunk"))
        };
        let ty = structure.component_at(slot);
        check_layout::<T>(ty);
        (
            self.blocks[slot].cast::<T>().as_ptr(),
            ty.records_for(*self.node_count),
        )
    }
}

impl fmt::Debug for ChunkViewMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.structure {
            None => write!(f, "ChunkViewMut(null)"),
            Some(s) => write!(
                f,
                "ChunkViewMut({}, {}/{} nodes)",
                s.id(),
                self.node_count,
                self.node_capacity
            ),
        }
    }
}

/// Copies records between two chunks of the same structure.
///
/// Copies `min(destination count, source count)` records of every per-node
/// column and the single record of every per-chunk column, then sets the
/// destination's node count to that minimum.
///
/// Returns the number of node records copied, or `Err` if either side is null
/// or the two chunks do not share one structure instance.
pub fn copy_data(destination: &mut ChunkViewMut<'_>, source: &ChunkView<'_>) -> Result<usize> {
    let context = ErrorContext::new().with_operation("copy_data");
    let (Some(dst_structure), Some(src_structure)) = (destination.structure, source.structure)
    else {
        return Err(Error::null_chunk().with_context(context));
    };
    if !Structure::same(dst_structure, src_structure) {
        return Err(
            Error::structure_mismatch(dst_structure.id(), src_structure.id())
                .with_context(context.with_structure(dst_structure.id())),
        );
    }
    let count = destination.node_count().min(source.node_count);
    // SAFETY: same structure, so both sides have matching column layouts and
    // at least `count` live records; the destination is exclusive, so the
    // two cannot overlap.
    unsafe { copy_records(dst_structure, destination.blocks, source.blocks, count) };
    *destination.node_count = count;
    Ok(count)
}

/// Copies `count` node records of every column from `source` to `destination`.
///
/// # Safety
///
/// Both block lists must belong to chunks of `structure`, hold at least
/// `count` records per per-node column, and must not overlap.
pub(crate) unsafe fn copy_records(
    structure: &Structure,
    destination: &[NonNull<u8>],
    source: &[NonNull<u8>],
    count: usize,
) {
    for (slot, ty) in structure.components().iter().enumerate() {
        let bytes = ty.byte_len(ty.records_for(count));
        // SAFETY: forwarded from the caller.
        unsafe {
            ptr::copy_nonoverlapping(
                source[slot].as_ptr(),
                destination[slot].as_ptr(),
                bytes,
            );
        }
    }
}

/// Aborts if a column of `ty` cannot be read as `T`.
pub(crate) fn check_layout<T>(ty: &ComponentType) {
    invariant!(
        ty.layout_matches::<T>(),
        "column {} cannot be read as {}",
        ty.name(),
        std::any::type_name::<T>()
    );
}
