//! Chunk trees: chunks linked by parent, first child, and a circular sibling ring.
//!
//! Tree nodes live in a [`ChunkForest`] arena and are addressed by
//! generational [`NodeId`] handles. Every node is in one of two states:
//!
//! - **Extracted**: no sibling links and no parent. Fresh nodes start here.
//! - **Attached**: both sibling links set. A node that is alone in its ring
//!   links to itself in both directions.
//!
//! Extracting a node splices it out of its ring in O(1) and leaves its own
//! children attached to it.

// Allow u32 to usize casts - arena indices fit in u32
#![allow(clippy::cast_possible_truncation)]

use std::fmt;

use nodepack_foundation::{Error, NodeId, Result, fatal, invariant};

use crate::access::ChunkAccess;
use crate::allocation::ChunkAllocation;
use crate::array::ChunkArray;
use crate::chunk::ChunkView;
use crate::kind::{ChunkKind, KindRef, TreeRef};
use crate::structure::Structure;

/// Payload of a tree node.
#[derive(Debug, Clone)]
pub enum TreeChunk {
    /// A single chunk.
    Chunk(ChunkAllocation),
    /// An array of sub-chunks.
    Array(ChunkArray),
}

impl TreeChunk {
    /// Tree kind of this payload.
    #[must_use]
    pub fn kind(&self) -> ChunkKind {
        match self {
            Self::Chunk(_) => ChunkKind::ChunkTree,
            Self::Array(_) => ChunkKind::ChunkArrayTree,
        }
    }

    /// Structure of the payload, or `None` if it is null.
    #[must_use]
    pub fn structure(&self) -> Option<&Structure> {
        match self {
            Self::Chunk(chunk) => chunk.structure().map(|s| &**s),
            Self::Array(array) => array.structure().map(|s| &**s),
        }
    }

    /// View of the payload; sub-chunk 0 for arrays.
    #[must_use]
    pub fn view(&self) -> ChunkView<'_> {
        match self {
            Self::Chunk(chunk) => chunk.view(),
            Self::Array(array) => array.base(),
        }
    }

    /// The single chunk, if this payload is one.
    #[must_use]
    pub fn as_chunk(&self) -> Option<&ChunkAllocation> {
        match self {
            Self::Chunk(chunk) => Some(chunk),
            Self::Array(_) => None,
        }
    }

    /// The single chunk, mutably.
    pub fn as_chunk_mut(&mut self) -> Option<&mut ChunkAllocation> {
        match self {
            Self::Chunk(chunk) => Some(chunk),
            Self::Array(_) => None,
        }
    }

    /// The chunk array, if this payload is one.
    #[must_use]
    pub fn as_array(&self) -> Option<&ChunkArray> {
        match self {
            Self::Array(array) => Some(array),
            Self::Chunk(_) => None,
        }
    }

    /// The chunk array, mutably.
    pub fn as_array_mut(&mut self) -> Option<&mut ChunkArray> {
        match self {
            Self::Array(array) => Some(array),
            Self::Chunk(_) => None,
        }
    }

    fn access(&self) -> ChunkAccess<'_> {
        match self {
            Self::Chunk(chunk) => chunk.access_as(ChunkKind::ChunkTree),
            Self::Array(array) => array.access_as(ChunkKind::ChunkArrayTree),
        }
    }
}

impl From<ChunkAllocation> for TreeChunk {
    fn from(chunk: ChunkAllocation) -> Self {
        Self::Chunk(chunk)
    }
}

impl From<ChunkArray> for TreeChunk {
    fn from(array: ChunkArray) -> Self {
        Self::Array(array)
    }
}

/// Linkage of one tree node.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeLinks {
    /// Parent node, `None` for roots.
    pub parent: Option<NodeId>,
    /// Head of the children ring.
    pub first_child: Option<NodeId>,
    /// Previous node in the sibling ring.
    pub previous_sibling: Option<NodeId>,
    /// Next node in the sibling ring.
    pub next_sibling: Option<NodeId>,
}

#[derive(Debug)]
struct TreeNode {
    chunk: TreeChunk,
    links: TreeLinks,
}

/// Arena of chunk tree nodes.
///
/// Slots are reused from a free list; the generation of a slot is odd while
/// it holds a node and even while free, so stale handles never resolve.
#[derive(Default)]
pub struct ChunkForest {
    nodes: Vec<Option<TreeNode>>,
    generations: Vec<u32>,
    free_list: Vec<u32>,
    live_count: usize,
}

impl ChunkForest {
    /// Creates an empty forest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Node Lifecycle
    // =========================================================================

    /// Adds an extracted root node holding `chunk`.
    pub fn insert(&mut self, chunk: impl Into<TreeChunk>) -> NodeId {
        let node = TreeNode {
            chunk: chunk.into(),
            links: TreeLinks::default(),
        };
        self.live_count += 1;

        if let Some(index) = self.free_list.pop() {
            let idx = index as usize;
            // Was even/free, now odd/alive
            self.generations[idx] += 1;
            self.nodes[idx] = Some(node);
            NodeId::new(index, self.generations[idx])
        } else {
            let index = self.nodes.len() as u32;
            self.generations.push(1);
            self.nodes.push(Some(node));
            NodeId::new(index, 1)
        }
    }

    /// Adds an extracted root node holding a single chunk.
    pub fn insert_chunk(&mut self, chunk: ChunkAllocation) -> NodeId {
        self.insert(TreeChunk::Chunk(chunk))
    }

    /// Adds an extracted root node holding a chunk array.
    pub fn insert_array(&mut self, array: ChunkArray) -> NodeId {
        self.insert(TreeChunk::Array(array))
    }

    /// Removes a node and returns its payload.
    ///
    /// The node is extracted first if attached. Its children stay linked to
    /// each other but lose their parent. Returns `None` for stale handles.
    pub fn remove(&mut self, id: NodeId) -> Option<TreeChunk> {
        if !self.contains(id) {
            return None;
        }
        if self.is_attached(id) {
            self.extract(id);
        }
        let children: Vec<_> = self.children(id).collect();
        for child in children {
            self.links_mut(child).parent = None;
        }

        let idx = id.index as usize;
        // Was odd/alive, now even/free
        self.generations[idx] += 1;
        self.free_list.push(id.index);
        self.live_count -= 1;
        self.nodes[idx].take().map(|node| node.chunk)
    }

    /// Returns true if `id` refers to a live node.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        let idx = id.index as usize;
        idx < self.generations.len()
            && self.generations[idx] == id.generation
            && id.generation % 2 == 1
    }

    /// Validates that `id` refers to a live node.
    pub fn validate(&self, id: NodeId) -> Result<()> {
        let idx = id.index as usize;
        if idx >= self.generations.len() {
            return Err(Error::node_not_found(id));
        }
        let current = self.generations[idx];
        if current != id.generation {
            return Err(Error::stale_node(id));
        }
        if current % 2 == 0 {
            return Err(Error::node_not_found(id));
        }
        Ok(())
    }

    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live_count
    }

    /// Returns true if the forest has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    /// Handles of every live node, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.generations
            .iter()
            .enumerate()
            .filter(|(_, generation)| *generation % 2 == 1)
            .map(|(idx, generation)| NodeId::new(idx as u32, *generation))
    }

    /// Payload of a node.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&TreeChunk> {
        if !self.contains(id) {
            return None;
        }
        self.nodes[id.index as usize].as_ref().map(|node| &node.chunk)
    }

    /// Payload of a node, mutably.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut TreeChunk> {
        if !self.contains(id) {
            return None;
        }
        self.nodes[id.index as usize]
            .as_mut()
            .map(|node| &mut node.chunk)
    }

    /// Tree kind of a node's payload.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> Option<ChunkKind> {
        self.get(id).map(TreeChunk::kind)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Linkage of a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[must_use]
    pub fn links(&self, id: NodeId) -> TreeLinks {
        self.node(id).links
    }

    /// Parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).links.parent
    }

    /// Head of a node's children ring.
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).links.first_child
    }

    /// Next node in the sibling ring.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).links.next_sibling
    }

    /// Previous node in the sibling ring.
    #[must_use]
    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).links.previous_sibling
    }

    /// Returns true if the node is in no sibling ring.
    #[must_use]
    pub fn is_extracted(&self, id: NodeId) -> bool {
        self.node(id).links.next_sibling.is_none()
    }

    /// Returns true if the node is in a sibling ring.
    #[must_use]
    pub fn is_attached(&self, id: NodeId) -> bool {
        !self.is_extracted(id)
    }

    /// Returns true if the node has no parent.
    #[must_use]
    pub fn is_root(&self, id: NodeId) -> bool {
        self.node(id).links.parent.is_none()
    }

    /// Returns true if the node has a parent.
    #[must_use]
    pub fn has_parent(&self, id: NodeId) -> bool {
        !self.is_root(id)
    }

    /// Returns true if the node has no children.
    #[must_use]
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.node(id).links.first_child.is_none()
    }

    /// Returns true if the node has children.
    #[must_use]
    pub fn has_children(&self, id: NodeId) -> bool {
        !self.is_leaf(id)
    }

    /// Nodes in `id`'s sibling ring, itself included; 1 when extracted.
    #[must_use]
    pub fn sibling_count(&self, id: NodeId) -> usize {
        self.siblings(id).count()
    }

    /// Children of `id`, starting at the first child.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Ring<'_> {
        let first = self.first_child(id);
        Ring {
            forest: self,
            first,
            next: first,
        }
    }

    /// The sibling ring of `id`, starting at `id`.
    #[must_use]
    pub fn siblings(&self, id: NodeId) -> Ring<'_> {
        self.check_live(id);
        Ring {
            forest: self,
            first: Some(id),
            next: Some(id),
        }
    }

    /// Parent chain of `id`, nearest first.
    #[must_use]
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            forest: self,
            next: self.parent(id),
        }
    }

    /// Every node below `id`, in pre-order.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            forest: self,
            root: id,
            next: self.first_child(id),
        }
    }

    // =========================================================================
    // Linking
    // =========================================================================

    /// Attaches extracted `child` as the new first child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `child` is attached, or is `parent` or one of its ancestors.
    pub fn insert_first_child(&mut self, parent: NodeId, child: NodeId) {
        self.check_insertable(child, parent);
        self.attach_child(parent, child);
        self.links_mut(parent).first_child = Some(child);
    }

    /// Attaches extracted `child` as the last child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `child` is attached, or is `parent` or one of its ancestors.
    pub fn insert_last_child(&mut self, parent: NodeId, child: NodeId) {
        self.check_insertable(child, parent);
        self.attach_child(parent, child);
    }

    /// Splices extracted `node` into `at`'s ring just before `at`.
    ///
    /// Inserting before the first child makes `node` the last child.
    ///
    /// # Panics
    ///
    /// Panics if `at` is extracted, `node` is attached, or `node` is `at` or
    /// one of its ancestors.
    pub fn insert_previous_sibling(&mut self, at: NodeId, node: NodeId) {
        invariant!(
            self.is_attached(at),
            "cannot insert a sibling of extracted {at:?}"
        );
        self.check_insertable(node, at);
        self.links_mut(node).parent = self.parent(at);
        self.splice_before(at, node);
    }

    /// Splices extracted `node` into `at`'s ring just after `at`.
    ///
    /// # Panics
    ///
    /// Same conditions as [`ChunkForest::insert_previous_sibling`].
    pub fn insert_next_sibling(&mut self, at: NodeId, node: NodeId) {
        invariant!(
            self.is_attached(at),
            "cannot insert a sibling of extracted {at:?}"
        );
        let next = self.ring_next(at);
        self.insert_previous_sibling(next, node);
    }

    /// Makes `child` the first child of `parent`, extracting it first if attached.
    ///
    /// # Panics
    ///
    /// Panics if `child` is `parent` or one of its ancestors.
    pub fn move_to_first_child(&mut self, parent: NodeId, child: NodeId) {
        self.check_acyclic(child, parent);
        self.detach(child);
        self.insert_first_child(parent, child);
    }

    /// Makes `child` the last child of `parent`, extracting it first if attached.
    ///
    /// # Panics
    ///
    /// Panics if `child` is `parent` or one of its ancestors.
    pub fn move_to_last_child(&mut self, parent: NodeId, child: NodeId) {
        self.check_acyclic(child, parent);
        self.detach(child);
        self.insert_last_child(parent, child);
    }

    /// Moves `node` just before `at`, extracting it first if attached.
    ///
    /// # Panics
    ///
    /// Panics if `at` is extracted, or `node` is `at` or one of its ancestors.
    pub fn move_to_previous_sibling(&mut self, at: NodeId, node: NodeId) {
        self.check_acyclic(node, at);
        self.detach(node);
        self.insert_previous_sibling(at, node);
    }

    /// Moves `node` just after `at`, extracting it first if attached.
    ///
    /// # Panics
    ///
    /// Panics if `at` is extracted, or `node` is `at` or one of its ancestors.
    pub fn move_to_next_sibling(&mut self, at: NodeId, node: NodeId) {
        self.check_acyclic(node, at);
        self.detach(node);
        self.insert_next_sibling(at, node);
    }

    /// Splices `id` out of its sibling ring.
    ///
    /// If `id` headed its parent's children, the next sibling takes over, or
    /// the parent becomes a leaf. The node keeps its own children.
    ///
    /// # Panics
    ///
    /// Panics if `id` is already extracted.
    pub fn extract(&mut self, id: NodeId) {
        invariant!(self.is_attached(id), "{id:?} is already extracted");
        let links = self.links(id);
        let next = self.ring_next(id);
        let previous = self.ring_previous(id);

        let successor = if next == id {
            None
        } else {
            self.links_mut(previous).next_sibling = Some(next);
            self.links_mut(next).previous_sibling = Some(previous);
            Some(next)
        };
        if let Some(parent) = links.parent {
            if self.first_child(parent) == Some(id) {
                self.links_mut(parent).first_child = successor;
            }
        }

        let own = self.links_mut(id);
        own.parent = None;
        own.previous_sibling = None;
        own.next_sibling = None;
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Exclusive column access to a node, with parent and first-child views.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[must_use]
    pub fn access(&mut self, id: NodeId) -> ChunkAccess<'_> {
        let this: &Self = self;
        let node = this.node(id);
        let parent = node.links.parent.map(|p| this.node(p).chunk.view());
        let children = node.links.first_child.map(|c| this.node(c).chunk.view());
        node.chunk.access().with_neighbours(parent, children)
    }

    /// Tree-tagged dispatch handle for a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[must_use]
    pub fn kind_ref(&mut self, id: NodeId) -> KindRef<'_> {
        KindRef::from(TreeRef::new(self, id))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    pub(crate) fn check_live(&self, id: NodeId) {
        invariant!(self.contains(id), "stale or unknown node {id:?}");
    }

    pub(crate) fn chunk(&self, id: NodeId) -> &TreeChunk {
        &self.node(id).chunk
    }

    fn node(&self, id: NodeId) -> &TreeNode {
        self.check_live(id);
        match &self.nodes[id.index as usize] {
            Some(node) => node,
            None => fatal(format_args!("live slot {id:?} is empty")),
        }
    }

    fn links_mut(&mut self, id: NodeId) -> &mut TreeLinks {
        self.check_live(id);
        match &mut self.nodes[id.index as usize] {
            Some(node) => &mut node.links,
            None => fatal(format_args!("live slot {id:?} is empty")),
        }
    }

    fn ring_next(&self, id: NodeId) -> NodeId {
        match self.next_sibling(id) {
            Some(next) => next,
            None => fatal(format_args!("{id:?} is extracted")),
        }
    }

    fn ring_previous(&self, id: NodeId) -> NodeId {
        match self.previous_sibling(id) {
            Some(previous) => previous,
            None => fatal(format_args!("{id:?} is extracted")),
        }
    }

    /// Links `child` under `parent`, at the end of the ring if one exists.
    fn attach_child(&mut self, parent: NodeId, child: NodeId) {
        self.links_mut(child).parent = Some(parent);
        match self.first_child(parent) {
            Some(head) => self.splice_before(head, child),
            None => {
                let links = self.links_mut(child);
                links.previous_sibling = Some(child);
                links.next_sibling = Some(child);
                self.links_mut(parent).first_child = Some(child);
            }
        }
    }

    fn splice_before(&mut self, at: NodeId, node: NodeId) {
        let previous = self.ring_previous(at);
        let links = self.links_mut(node);
        links.previous_sibling = Some(previous);
        links.next_sibling = Some(at);
        self.links_mut(previous).next_sibling = Some(node);
        self.links_mut(at).previous_sibling = Some(node);
    }

    fn detach(&mut self, id: NodeId) {
        if self.is_attached(id) {
            self.extract(id);
        }
    }

    fn check_insertable(&self, node: NodeId, target: NodeId) {
        invariant!(
            self.is_extracted(node),
            "{node:?} must be extracted before insertion"
        );
        self.check_acyclic(node, target);
    }

    /// Aborts if linking `node` relative to `target` would put `node` inside
    /// its own subtree.
    fn check_acyclic(&self, node: NodeId, target: NodeId) {
        invariant!(node != target, "cannot link {node:?} relative to itself");
        invariant!(
            !self.ancestors(target).any(|ancestor| ancestor == node),
            "cannot link {node:?} below its own descendant {target:?}"
        );
    }
}

impl fmt::Debug for ChunkForest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for id in self.iter() {
            map.entry(&id, &self.links(id));
        }
        map.finish()
    }
}

/// Iterator over a sibling ring.
#[derive(Debug, Clone)]
pub struct Ring<'f> {
    forest: &'f ChunkForest,
    first: Option<NodeId>,
    next: Option<NodeId>,
}

impl Iterator for Ring<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        let following = self.forest.next_sibling(current);
        self.next = if following == self.first {
            None
        } else {
            following
        };
        Some(current)
    }
}

/// Iterator over a node's parent chain.
#[derive(Debug, Clone)]
pub struct Ancestors<'f> {
    forest: &'f ChunkForest,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.forest.parent(current);
        Some(current)
    }
}

/// Pre-order iterator over a node's subtree, the node itself excluded.
#[derive(Debug, Clone)]
pub struct Descendants<'f> {
    forest: &'f ChunkForest,
    root: NodeId,
    next: Option<NodeId>,
}

impl Descendants<'_> {
    fn advance(&self, current: NodeId) -> Option<NodeId> {
        if let Some(child) = self.forest.first_child(current) {
            return Some(child);
        }
        let mut node = current;
        while node != self.root {
            let parent = self.forest.parent(node)?;
            let sibling = self.forest.next_sibling(node);
            if sibling != self.forest.first_child(parent) {
                return sibling;
            }
            node = parent;
        }
        None
    }
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.advance(current);
        Some(current)
    }
}
