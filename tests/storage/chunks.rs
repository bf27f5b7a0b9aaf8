//! Integration tests for structures and single chunks

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use nodepack_foundation::{
    BlockAllocator, Component, ComponentType, ErrorKind, Ownership, SystemAllocator,
    TrackingAllocator,
};
use nodepack_storage::{ChunkAllocation, ChunkKind, Structure, copy_data};
use proptest::prelude::*;

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

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Region(u64);
impl Component for Region {
    const OWNERSHIP: Ownership = Ownership::PerChunk;
}

fn moving() -> Arc<Structure> {
    Structure::shared([
        ComponentType::of::<Position>(),
        ComponentType::of::<Velocity>(),
        ComponentType::of::<Region>(),
    ])
}

fn fill(chunk: &mut ChunkAllocation) {
    for (i, p) in chunk.column_mut::<Position>().unwrap().iter_mut().enumerate() {
        let i = i as f32;
        *p = Position { x: i, y: -i };
    }
    for (i, v) in chunk.column_mut::<Velocity>().unwrap().iter_mut().enumerate() {
        *v = Velocity {
            x: i as f32 * 0.5,
            y: 1.0,
        };
    }
    chunk.column_mut::<Region>().unwrap()[0] = Region(77);
}

// =============================================================================
// Structure
// =============================================================================

#[test]
fn structure_slots_follow_construction_order() {
    let s = moving();
    assert_eq!(s.len(), 3);
    assert_eq!(s.index_of_component::<Position>(), Some(0));
    assert_eq!(s.index_of_component::<Velocity>(), Some(1));
    assert_eq!(s.index_of_component::<Region>(), Some(2));
    assert!(s.contains::<Region>());
}

#[test]
fn structures_compare_by_identity() {
    let a = moving();
    let b = moving();
    assert_ne!(*a, *b);
    assert!(Structure::same(&a, &a));
    assert!(!Structure::same(&a, &b));
}

#[test]
fn duplicate_components_keep_first_slot() {
    let s = Structure::new([
        ComponentType::of::<Velocity>(),
        ComponentType::of::<Position>(),
        ComponentType::of::<Velocity>(),
    ]);
    assert_eq!(s.len(), 2);
    assert_eq!(s.index_of_component::<Velocity>(), Some(0));
}

// =============================================================================
// Chunk Allocation
// =============================================================================

#[test]
fn new_chunk_is_zeroed() {
    let chunk = ChunkAllocation::new(moving(), 16, 4);
    assert_eq!(chunk.node_count(), 4);
    assert_eq!(chunk.node_capacity(), 16);
    assert!(chunk
        .column::<Position>()
        .unwrap()
        .iter()
        .all(|p| *p == Position { x: 0.0, y: 0.0 }));
    assert_eq!(chunk.column::<Region>().unwrap(), &[Region(0)]);
}

#[test]
fn access_reports_chunk_kind() {
    let mut chunk = ChunkAllocation::new(moving(), 16, 4);
    assert_eq!(chunk.access().kind(), ChunkKind::Chunk);
}

#[test]
fn clone_copies_live_records() {
    let mut original = ChunkAllocation::new(moving(), 8, 5);
    fill(&mut original);
    let copy = original.clone();

    assert!(Structure::same(
        copy.structure().unwrap(),
        original.structure().unwrap()
    ));
    assert_eq!(copy.node_count(), 5);
    assert_eq!(copy.column::<Position>(), original.column::<Position>());
    assert_eq!(copy.column::<Velocity>(), original.column::<Velocity>());
    assert_eq!(copy.column::<Region>().unwrap(), &[Region(77)]);
}

#[test]
fn copy_data_takes_the_smaller_count() {
    let s = moving();
    let mut source = ChunkAllocation::new(Arc::clone(&s), 8, 6);
    fill(&mut source);
    let mut destination = ChunkAllocation::new(Arc::clone(&s), 8, 4);

    let copied = copy_data(&mut destination.view_mut(), &source.view()).unwrap();
    assert_eq!(copied, 4);
    assert_eq!(destination.node_count(), 4);
    assert_eq!(
        destination.column::<Position>().unwrap(),
        &source.column::<Position>().unwrap()[..4]
    );
    assert_eq!(destination.column::<Region>().unwrap(), &[Region(77)]);
}

#[test]
fn copy_data_rejects_other_structures() {
    let mut source = ChunkAllocation::new(moving(), 4, 4);
    let mut destination = ChunkAllocation::new(moving(), 4, 4);
    let err = copy_data(&mut destination.view_mut(), &source.view()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::StructureMismatch { .. }));
    let context = err.context.unwrap();
    assert_eq!(context.operation.as_deref(), Some("copy_data"));
    assert_eq!(context.structure, destination.structure().map(|s| s.id()));

    let null = ChunkAllocation::null();
    let err = copy_data(&mut source.view_mut(), &null.view()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::NullChunk));
    assert!(err.context.unwrap().structure.is_none());
}

#[test]
fn copy_from_errors_name_the_call() {
    let source = ChunkAllocation::new(moving(), 4, 4);
    let mut destination = ChunkAllocation::new(moving(), 4, 4);
    let err = destination.copy_from(&source.view()).unwrap_err();
    let context = err.context.unwrap();
    assert_eq!(context.operation.as_deref(), Some("copy_from"));
    assert!(format!("{context}").contains("copy_from"));
}

#[test]
fn copy_from_is_limited_by_capacity() {
    let s = moving();
    let mut source = ChunkAllocation::new(Arc::clone(&s), 10, 10);
    fill(&mut source);
    let mut destination = ChunkAllocation::new(Arc::clone(&s), 3, 0);

    assert_eq!(destination.copy_from(&source.view()).unwrap(), 3);
    assert_eq!(destination.node_count(), 3);
    assert_eq!(
        destination.column::<Velocity>().unwrap(),
        &source.column::<Velocity>().unwrap()[..3]
    );
}

#[test]
fn deallocate_is_idempotent_and_balanced() {
    let tracker = Arc::new(TrackingAllocator::new(SystemAllocator));
    let allocator: Arc<dyn BlockAllocator> = tracker.clone();
    {
        let mut chunk = ChunkAllocation::new_in(moving(), 32, 0, allocator);
        assert_eq!(tracker.stats().live_blocks, 3);
        chunk.deallocate();
        chunk.deallocate();
        assert!(chunk.is_null());
        assert!(chunk.view().is_null());
    }
    assert!(tracker.stats().is_balanced());
}

#[test]
fn clones_are_freed_independently() {
    let tracker = Arc::new(TrackingAllocator::new(SystemAllocator));
    let allocator: Arc<dyn BlockAllocator> = tracker.clone();
    let chunk = ChunkAllocation::new_in(moving(), 32, 8, allocator);
    let copy = chunk.clone();
    assert_eq!(tracker.stats().live_blocks, 6);
    drop(chunk);
    assert_eq!(tracker.stats().live_blocks, 3);
    drop(copy);
    assert!(tracker.stats().is_balanced());
}

#[test]
#[should_panic(expected = "exceeds capacity")]
fn count_past_capacity_is_fatal() {
    let mut chunk = ChunkAllocation::new(moving(), 4, 0);
    chunk.set_node_count(5);
}

proptest! {
    #[test]
    fn copy_round_trip(capacity in 1usize..64, count_seed in 0usize..64, extra in 0usize..8) {
        let count = count_seed % (capacity + 1);
        let s = moving();
        let mut source = ChunkAllocation::new(Arc::clone(&s), capacity, count);
        fill(&mut source);
        let mut destination = ChunkAllocation::new(Arc::clone(&s), capacity + extra, capacity + extra);

        let copied = copy_data(&mut destination.view_mut(), &source.view()).unwrap();
        prop_assert_eq!(copied, count);
        prop_assert_eq!(destination.node_count(), source.node_count());
        prop_assert_eq!(destination.column::<Position>(), source.column::<Position>());
        prop_assert_eq!(destination.column::<Velocity>(), source.column::<Velocity>());
        prop_assert_eq!(destination.column::<Region>(), source.column::<Region>());
    }

    #[test]
    fn slots_are_stable(lookups in 1usize..32) {
        let s = moving();
        let first = s.index_of_component::<Velocity>();
        for _ in 0..lookups {
            prop_assert_eq!(s.index_of_component::<Velocity>(), first);
        }
    }
}
