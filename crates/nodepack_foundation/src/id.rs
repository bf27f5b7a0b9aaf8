//! Identifiers for structures and chunk tree nodes.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of process-unique structure identities. Starts at 1 so that 0 can
/// never be handed out.
static NEXT_STRUCTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one structure instance.
///
/// Two structures with the same components in the same order are still
/// different structures. Identities are never reused, so a cache keyed by
/// `StructureId` cannot confuse a dropped structure with a later one.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct StructureId(u64);

impl StructureId {
    /// Wraps a raw identity value.
    ///
    /// Only [`StructureId::next`] hands out fresh identities; this exists for
    /// tests and diagnostics.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Draws the next unused identity.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_STRUCTURE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identity value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for StructureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StructureId({})", self.0)
    }
}

impl fmt::Display for StructureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Structure({})", self.0)
    }
}

/// Chunk tree node handle with generational index for stale reference detection.
///
/// The generation counter increments when an arena slot is reused after
/// removal, so handles to removed nodes are rejected instead of aliasing
/// whatever node took the slot.
///
/// # Layout
/// - `index`: 32-bit slot index into the forest arena
/// - `generation`: 32-bit generation counter (odd = live)
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct NodeId {
    /// Slot index into the forest arena.
    pub index: u32,
    /// Generation counter for stale reference detection.
    pub generation: u32,
}

impl NodeId {
    /// Creates a node handle with the given index and generation.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns a sentinel value representing "no node".
    #[must_use]
    pub const fn null() -> Self {
        Self {
            index: u32::MAX,
            generation: 0,
        }
    }

    /// Returns true if this is the null sentinel value.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.index == u32::MAX
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "NodeId(null)")
        } else {
            write!(f, "NodeId({}v{})", self.index, self.generation)
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Node(null)")
        } else {
            write!(f, "Node({})", self.index)
        }
    }
}
