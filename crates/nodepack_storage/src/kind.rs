//! Chunk kinds and the borrowed sum type over every chunk shape.

use std::fmt;

use nodepack_foundation::NodeId;

use crate::access::ChunkAccess;
use crate::allocation::ChunkAllocation;
use crate::array::ChunkArray;
use crate::forest::ChunkForest;
use crate::structure::Structure;

/// Runtime tag of a chunk shape.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    /// A single chunk.
    Chunk,
    /// An array of sub-chunks.
    ChunkArray,
    /// A single chunk linked into a tree.
    ChunkTree,
    /// An array of sub-chunks linked into a tree.
    ChunkArrayTree,
}

impl ChunkKind {
    /// Returns true for the tree-linked kinds.
    #[must_use]
    pub const fn is_tree(self) -> bool {
        matches!(self, Self::ChunkTree | Self::ChunkArrayTree)
    }

    /// Returns true for the array kinds.
    #[must_use]
    pub const fn is_array(self) -> bool {
        matches!(self, Self::ChunkArray | Self::ChunkArrayTree)
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Chunk => "chunk",
            Self::ChunkArray => "chunk array",
            Self::ChunkTree => "chunk tree",
            Self::ChunkArrayTree => "chunk array tree",
        };
        f.write_str(name)
    }
}

/// Exclusive borrow of one tree node within its forest.
pub struct TreeRef<'a> {
    forest: &'a mut ChunkForest,
    node: NodeId,
}

impl<'a> TreeRef<'a> {
    /// Borrows `node` of `forest`.
    ///
    /// # Panics
    ///
    /// Panics if `node` is not live in `forest`.
    #[must_use]
    pub fn new(forest: &'a mut ChunkForest, node: NodeId) -> Self {
        forest.check_live(node);
        Self { forest, node }
    }

    /// Handle of the borrowed node.
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The forest the node lives in.
    #[must_use]
    pub fn forest(&self) -> &ChunkForest {
        self.forest
    }

    /// Tree kind of the node's payload.
    #[must_use]
    pub fn kind(&self) -> ChunkKind {
        self.forest.chunk(self.node).kind()
    }

    /// Structure of the node's payload.
    #[must_use]
    pub fn structure(&self) -> Option<&Structure> {
        self.forest.chunk(self.node).structure()
    }

    /// Exclusive column access to the node, with parent and first-child views.
    #[must_use]
    pub fn access(&mut self) -> ChunkAccess<'_> {
        self.forest.access(self.node)
    }

    /// Shorter-lived borrow of the same node.
    #[must_use]
    pub fn reborrow(&mut self) -> TreeRef<'_> {
        TreeRef {
            forest: self.forest,
            node: self.node,
        }
    }
}

impl fmt::Debug for TreeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TreeRef({:?})", self.node)
    }
}

/// Exclusive borrow of any chunk shape.
///
/// Runners match on this to pick the single-chunk or array path.
#[derive(Debug)]
pub enum KindRef<'a> {
    /// A single chunk.
    Chunk(&'a mut ChunkAllocation),
    /// An array of sub-chunks.
    ChunkArray(&'a mut ChunkArray),
    /// A tree node holding a single chunk.
    ChunkTree(TreeRef<'a>),
    /// A tree node holding an array of sub-chunks.
    ChunkArrayTree(TreeRef<'a>),
}

impl KindRef<'_> {
    /// Runtime tag of the borrowed shape.
    #[must_use]
    pub fn kind(&self) -> ChunkKind {
        match self {
            Self::Chunk(_) => ChunkKind::Chunk,
            Self::ChunkArray(_) => ChunkKind::ChunkArray,
            Self::ChunkTree(_) => ChunkKind::ChunkTree,
            Self::ChunkArrayTree(_) => ChunkKind::ChunkArrayTree,
        }
    }

    /// Returns true for the tree-linked kinds.
    #[must_use]
    pub fn is_tree(&self) -> bool {
        self.kind().is_tree()
    }

    /// Returns true for the array kinds.
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.kind().is_array()
    }

    /// Structure of the borrowed chunk, or `None` if it is null.
    #[must_use]
    pub fn structure(&self) -> Option<&Structure> {
        match self {
            Self::Chunk(chunk) => chunk.structure().map(|s| &**s),
            Self::ChunkArray(array) => array.structure().map(|s| &**s),
            Self::ChunkTree(tree) | Self::ChunkArrayTree(tree) => tree.structure(),
        }
    }

    /// Returns true if the borrowed chunk has no structure.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.structure().is_none()
    }

    /// Shorter-lived borrow of the same chunk.
    #[must_use]
    pub fn reborrow(&mut self) -> KindRef<'_> {
        match self {
            Self::Chunk(chunk) => KindRef::Chunk(chunk),
            Self::ChunkArray(array) => KindRef::ChunkArray(array),
            Self::ChunkTree(tree) => KindRef::ChunkTree(tree.reborrow()),
            Self::ChunkArrayTree(tree) => KindRef::ChunkArrayTree(tree.reborrow()),
        }
    }
}

impl<'a> From<&'a mut ChunkAllocation> for KindRef<'a> {
    fn from(chunk: &'a mut ChunkAllocation) -> Self {
        Self::Chunk(chunk)
    }
}

impl<'a> From<&'a mut ChunkArray> for KindRef<'a> {
    fn from(array: &'a mut ChunkArray) -> Self {
        Self::ChunkArray(array)
    }
}

impl<'a> From<TreeRef<'a>> for KindRef<'a> {
    fn from(tree: TreeRef<'a>) -> Self {
        match tree.kind() {
            ChunkKind::ChunkArrayTree => Self::ChunkArrayTree(tree),
            _ => Self::ChunkTree(tree),
        }
    }
}
