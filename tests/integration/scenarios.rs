//! End-to-end scenarios across storage and engine

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use nodepack_engine::{CacheRouter, Column, Operation, Pipeline, Request, RunTarget};
use nodepack_foundation::{Component, ComponentType, NodeId, SystemAllocator, TrackingAllocator};
use nodepack_storage::{ChunkAllocation, ChunkArray, ChunkForest, ChunkKind, Structure};

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Position {
    x: f32,
    y: f32,
}
impl Component for Position {}

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Velocity {
    x: f32,
    y: f32,
}
impl Component for Velocity {}

#[derive(Default)]
struct Motion<'c> {
    position: Column<'c, Position>,
    velocity: Column<'c, Velocity>,
}

#[derive(Default)]
struct MoveOp {
    executed: Vec<usize>,
}

impl Operation for MoveOp {
    type Binding<'c> = Motion<'c>;

    fn requirements<'c, R: Request<'c>>(&self, binding: &mut Motion<'c>, request: &mut R) -> bool {
        request.component(&mut binding.position) && request.component(&mut binding.velocity)
    }

    fn execute(&mut self, binding: &mut Motion<'_>, node_count: usize) {
        self.executed.push(node_count);
        for (p, v) in binding.position.iter_mut().zip(binding.velocity.iter()) {
            p.x += v.x;
            p.y += v.y;
        }
    }
}

fn moving() -> Arc<Structure> {
    Structure::shared([ComponentType::of::<Position>(), ComponentType::of::<Velocity>()])
}

fn still() -> Arc<Structure> {
    Structure::shared([ComponentType::of::<Position>()])
}

// =============================================================================
// Operations
// =============================================================================

#[test]
fn move_op_runs_on_matching_chunks_only() {
    let s1 = moving();
    let s2 = still();
    let router = CacheRouter::<MoveOp>::new();
    let mut op = MoveOp::default();

    let mut matching = ChunkAllocation::new(Arc::clone(&s1), 4, 3);
    matching.column_mut::<Velocity>().unwrap().fill(Velocity { x: 1.0, y: -1.0 });
    assert!(matching.try_run_with_router(&mut op, &router));
    assert_eq!(op.executed, vec![3]);
    assert_eq!(
        matching.column::<Position>().unwrap(),
        &[Position { x: 1.0, y: -1.0 }; 3]
    );

    let mut other = ChunkAllocation::new(Arc::clone(&s2), 8, 5);
    assert!(!other.try_run_with_router(&mut op, &router));
    assert_eq!(op.executed, vec![3]);
    assert!(router.route_for(&s2).unwrap().is_mismatch());
    assert!(!router.route_for(&s1).unwrap().is_mismatch());
}

#[test]
fn null_targets_of_every_kind_are_rejected() {
    let mut op = MoveOp::default();
    let mut forest = ChunkForest::new();
    let tree = forest.insert_chunk(ChunkAllocation::null());
    let array_tree = forest.insert_array(ChunkArray::null());

    assert_eq!(forest.kind(tree), Some(ChunkKind::ChunkTree));
    assert_eq!(forest.kind(array_tree), Some(ChunkKind::ChunkArrayTree));

    assert!(!ChunkAllocation::null().try_run(&mut op));
    assert!(!ChunkArray::null().try_run(&mut op));
    assert!(!forest.kind_ref(tree).try_run(&mut op));
    assert!(!forest.kind_ref(array_tree).try_run(&mut op));

    let mut pipeline = Pipeline::new().with_operation(MoveOp::default());
    assert!(!pipeline.try_run(&mut forest.kind_ref(tree)));
    assert!(op.executed.is_empty());
}

#[test]
#[should_panic(expected = "does not match this chunk array")]
fn run_on_a_mismatching_array_is_fatal() {
    let mut array = ChunkArray::new(still(), 4, 2, 2, 4);
    array.run(&mut MoveOp::default());
}

// =============================================================================
// Trees
// =============================================================================

fn ring_from(forest: &ChunkForest, start: NodeId) -> Vec<NodeId> {
    let mut ring = vec![start];
    let mut next = forest.next_sibling(start).unwrap();
    while next != start {
        ring.push(next);
        next = forest.next_sibling(next).unwrap();
    }
    ring
}

#[test]
fn tree_of_moving_chunks() {
    let s = moving();
    let mut forest = ChunkForest::new();
    let [r, a, b, c] = [3, 1, 2, 4].map(|count| {
        forest.insert_chunk(ChunkAllocation::new(Arc::clone(&s), 4, count))
    });
    for child in [a, b, c] {
        forest.insert_last_child(r, child);
    }

    assert_eq!(forest.first_child(r), Some(a));
    assert_eq!(ring_from(&forest, a), vec![a, b, c]);
    assert_eq!(forest.next_sibling(c), Some(a));

    forest.extract(b);
    assert_eq!(ring_from(&forest, a), vec![a, c]);
    assert_eq!(forest.next_sibling(c), Some(a));

    let router = CacheRouter::<MoveOp>::new();
    let mut op = MoveOp::default();
    let nodes: Vec<_> = std::iter::once(r).chain(forest.children(r)).collect();
    for id in nodes {
        assert!(forest.kind_ref(id).try_run_with_router(&mut op, &router));
    }
    assert!(forest.kind_ref(b).try_run_with_router(&mut op, &router));

    assert_eq!(op.executed, vec![3, 1, 4, 2]);
    assert_eq!(router.stats().misses, 1);
    assert_eq!(router.stats().hits, 3);
}

// =============================================================================
// Memory
// =============================================================================

#[test]
fn every_block_is_returned() {
    let tracker = Arc::new(TrackingAllocator::new(SystemAllocator));
    {
        let s = moving();
        let mut forest = ChunkForest::new();
        let root = forest.insert_chunk(ChunkAllocation::new_in(
            Arc::clone(&s),
            16,
            16,
            tracker.clone(),
        ));
        let batch = forest.insert_array(ChunkArray::new_in(
            Arc::clone(&s),
            16,
            4,
            4,
            16,
            tracker.clone(),
        ));
        forest.insert_first_child(root, batch);

        let mut pipeline = Pipeline::new().with_operation(MoveOp::default());
        assert!(pipeline.try_run(&mut forest.kind_ref(root)));
        assert!(pipeline.try_run(&mut forest.kind_ref(batch)));
        assert_eq!(pipeline.operation::<MoveOp>(0).unwrap().executed, vec![16; 5]);

        let clone = forest.get(batch).and_then(|chunk| chunk.as_array()).unwrap().clone();
        assert!(tracker.stats().live_blocks > 0);
        drop(clone);
        assert!(forest.remove(batch).is_some());
    }
    assert!(tracker.stats().is_balanced());
}
