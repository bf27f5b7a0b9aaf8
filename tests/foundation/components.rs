//! Integration tests for component descriptors and ids

use std::any::TypeId;

use bytemuck::{Pod, Zeroable};
use nodepack_foundation::{Component, ComponentType, ErrorKind, NodeId, Ownership, StructureId};

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}
impl Component for Position {}

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct Palette {
    colors: [u32; 4],
}
impl Component for Palette {
    const OWNERSHIP: Ownership = Ownership::PerChunk;
}

// =============================================================================
// ComponentType
// =============================================================================

#[test]
fn describes_layout_and_ownership() {
    let position = ComponentType::of::<Position>();
    assert_eq!(position.size(), 12);
    assert_eq!(position.align(), 4);
    assert_eq!(position.ownership(), Ownership::PerNode);
    assert!(position.is::<Position>());
    assert!(!position.is::<Palette>());

    let palette = ComponentType::of::<Palette>();
    assert_eq!(palette.ownership(), Ownership::PerChunk);
}

#[test]
fn records_follow_ownership() {
    let position = ComponentType::of::<Position>();
    let palette = ComponentType::of::<Palette>();
    assert_eq!(position.records_for(64), 64);
    assert_eq!(palette.records_for(64), 1);
    assert_eq!(position.layout_for(10).size(), 120);
    assert_eq!(palette.layout_for(palette.records_for(10)).size(), 16);
}

#[test]
fn equal_descriptors_for_equal_types() {
    assert_eq!(ComponentType::of::<Position>(), ComponentType::of::<Position>());
    assert_ne!(ComponentType::of::<Position>(), ComponentType::of::<Palette>());
}

#[test]
fn raw_descriptor_validation() {
    let id = TypeId::of::<Position>();
    assert!(ComponentType::new(id, "Position", 12, 4, Ownership::PerNode).is_ok());

    let zero = ComponentType::new(id, "Empty", 0, 1, Ownership::PerNode).unwrap_err();
    assert!(matches!(zero.kind, ErrorKind::InvalidComponentType { .. }));

    let odd_align = ComponentType::new(id, "Odd", 12, 3, Ownership::PerNode).unwrap_err();
    assert!(format!("{odd_align}").contains("power of two"));

    let ragged = ComponentType::new(id, "Ragged", 6, 4, Ownership::PerNode).unwrap_err();
    assert!(format!("{ragged}").contains("multiple"));
}

// =============================================================================
// Ids
// =============================================================================

#[test]
fn structure_ids_are_unique() {
    let a = StructureId::next();
    let b = StructureId::next();
    assert_ne!(a, b);
    assert!(b.raw() > a.raw());
}

#[test]
fn node_id_null() {
    assert!(NodeId::null().is_null());
    assert!(!NodeId::new(0, 1).is_null());
    assert_eq!(format!("{}", NodeId::new(7, 3)), "Node(7)");
}
