//! Integration tests for tree neighbour capabilities

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use nodepack_engine::{CacheRouter, Column, EngineConfig, Operation, Request, Route, RunTarget};
use nodepack_foundation::{Component, ComponentType, NodeId};
use nodepack_storage::{ChunkAllocation, ChunkForest, ChunkView, Structure, TreeChunk};

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Depth(u32);
impl Component for Depth {}

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Weight(f32);
impl Component for Weight {}

#[derive(Default)]
struct Inherited<'c> {
    depth: Column<'c, Depth>,
    parent_depth: Option<&'c [Depth]>,
}

/// Sets every node's depth to one below its parent chunk's first node.
struct Deepen;

impl Operation for Deepen {
    type Binding<'c> = Inherited<'c>;

    fn requirements<'c, R: Request<'c>>(&self, binding: &mut Inherited<'c>, request: &mut R) -> bool {
        request.component(&mut binding.depth)
            && request.parent_component(&mut binding.parent_depth)
    }

    fn execute(&mut self, binding: &mut Inherited<'_>, _node_count: usize) {
        let base = binding
            .parent_depth
            .and_then(<[Depth]>::first)
            .map_or(0, |depth| depth.0);
        for depth in binding.depth.iter_mut() {
            depth.0 = base + 1;
        }
    }
}

#[derive(Default)]
struct Family<'c> {
    parent: Option<ChunkView<'c>>,
    children: Option<ChunkView<'c>>,
}

/// Records the node counts of the neighbours it sees.
#[derive(Default)]
struct Census {
    seen: Vec<(Option<usize>, Option<usize>)>,
}

impl Operation for Census {
    type Binding<'c> = Family<'c>;

    fn requirements<'c, R: Request<'c>>(&self, binding: &mut Family<'c>, request: &mut R) -> bool {
        request.parent_chunk(&mut binding.parent);
        request.children_chunk(&mut binding.children);
        true
    }

    fn execute(&mut self, binding: &mut Family<'_>, _node_count: usize) {
        self.seen.push((
            binding.parent.map(|view| view.node_count()),
            binding.children.map(|view| view.node_count()),
        ));
    }
}

#[derive(Default)]
struct Anchor<'c> {
    depth: Column<'c, Depth>,
    parent: Option<ChunkView<'c>>,
    weight: Column<'c, Weight>,
}

/// Needs a parent between its two component lookups.
#[derive(Default)]
struct Anchored {
    runs: usize,
}

impl Operation for Anchored {
    type Binding<'c> = Anchor<'c>;

    fn requirements<'c, R: Request<'c>>(&self, binding: &mut Anchor<'c>, request: &mut R) -> bool {
        request.component(&mut binding.depth)
            && request.parent_chunk(&mut binding.parent)
            && request.component(&mut binding.weight)
    }

    fn execute(&mut self, binding: &mut Anchor<'_>, _node_count: usize) {
        self.runs += 1;
        for weight in binding.weight.iter_mut() {
            weight.0 += 0.5;
        }
    }
}

fn structure() -> Arc<Structure> {
    Structure::shared([ComponentType::of::<Weight>(), ComponentType::of::<Depth>()])
}

fn depth_of(forest: &ChunkForest, id: NodeId) -> Vec<Depth> {
    forest
        .get(id)
        .unwrap()
        .view()
        .column::<Depth>()
        .unwrap()
        .to_vec()
}

/// Root with two nodes, a child with three, a grandchild with one.
fn family() -> (ChunkForest, [NodeId; 3]) {
    let s = structure();
    let mut forest = ChunkForest::new();
    let root = forest.insert_chunk(ChunkAllocation::new(Arc::clone(&s), 4, 2));
    let child = forest.insert_chunk(ChunkAllocation::new(Arc::clone(&s), 4, 3));
    let grandchild = forest.insert_chunk(ChunkAllocation::new(Arc::clone(&s), 4, 1));
    forest.insert_last_child(root, child);
    forest.insert_last_child(child, grandchild);
    (forest, [root, child, grandchild])
}

#[test]
fn parent_component_reads_the_parent_chunk() {
    let (mut forest, [root, child, grandchild]) = family();
    forest
        .get_mut(root)
        .and_then(TreeChunk::as_chunk_mut)
        .unwrap()
        .column_mut::<Depth>()
        .unwrap()
        .fill(Depth(7));

    assert!(forest.kind_ref(child).try_run(&mut Deepen));
    assert!(forest.kind_ref(grandchild).try_run(&mut Deepen));

    assert_eq!(depth_of(&forest, child), vec![Depth(8); 3]);
    assert_eq!(depth_of(&forest, grandchild), vec![Depth(9)]);
}

#[test]
fn roots_have_no_parent_component() {
    let (mut forest, [root, ..]) = family();
    assert!(!forest.kind_ref(root).try_run(&mut Deepen));
    assert_eq!(depth_of(&forest, root), vec![Depth(0); 2]);
}

#[test]
fn plain_chunks_have_no_neighbours() {
    let mut chunk = ChunkAllocation::new(structure(), 4, 4);
    assert!(!chunk.try_run(&mut Deepen));

    let mut census = Census::default();
    assert!(chunk.try_run(&mut census));
    assert_eq!(census.seen, vec![(None, None)]);
}

#[test]
fn neighbour_views_follow_the_links() {
    let (mut forest, [root, child, grandchild]) = family();
    let mut census = Census::default();
    for id in [root, child, grandchild] {
        assert!(forest.kind_ref(id).try_run(&mut census));
    }
    assert_eq!(
        census.seen,
        vec![(None, Some(3)), (Some(2), Some(1)), (Some(3), None)]
    );
}

#[test]
fn replay_extends_a_route_cut_short_by_a_root() {
    let (mut forest, [root, child, _]) = family();
    let router = CacheRouter::<Anchored>::with_config(EngineConfig::development());
    let mut op = Anchored::default();

    // The root fails on its parent, after one component lookup.
    assert!(!forest.kind_ref(root).try_run_with_router(&mut op, &router));
    let recorded = recorded_route(&router, &forest, root);
    assert_eq!(recorded.len(), 1);
    assert!(!recorded.is_mismatch());

    // The child gets past the parent; the weight lookup is appended.
    assert!(forest.kind_ref(child).try_run_with_router(&mut op, &router));
    let extended = recorded_route(&router, &forest, child);
    assert_eq!(extended.len(), 2);
    assert_eq!(extended.steps()[0].slot, Some(1));
    assert_eq!(extended.steps()[1].slot, Some(0));

    assert_eq!(op.runs, 1);
    assert_eq!(router.stats().misses, 1);
    assert_eq!(router.stats().hits, 1);

    let weights = forest.get(child).unwrap().view().column::<Weight>().unwrap().to_vec();
    assert_eq!(weights, vec![Weight(0.5); 3]);
}

fn recorded_route(router: &CacheRouter<Anchored>, forest: &ChunkForest, id: NodeId) -> Route {
    let structure = forest.get(id).unwrap().structure().unwrap();
    router.route_for(structure).unwrap()
}
