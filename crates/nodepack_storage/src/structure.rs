//! Chunk structures: the ordered component layout shared by chunks.
//!
//! A structure is built once and never changes. Its slot order fixes where
//! each component's block lives in every chunk that uses it, and its
//! [`StructureId`] is what routing caches key on.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use nodepack_foundation::{Component, ComponentType, StructureId, invariant};

/// Ordered, deduplicated set of component types with O(1) slot lookup.
///
/// Structures compare by identity, not by contents: two structures built from
/// the same component list are different structures.
pub struct Structure {
    id: StructureId,
    components: Vec<ComponentType>,
    slots: HashMap<TypeId, usize>,
}

impl Structure {
    /// Builds a structure from component types, in order.
    ///
    /// Repeated component types keep their first slot.
    #[must_use]
    pub fn new(components: impl IntoIterator<Item = ComponentType>) -> Self {
        let id = StructureId::next();
        let mut ordered = Vec::new();
        let mut slots = HashMap::new();
        for component in components {
            if slots.contains_key(&component.type_id()) {
                log::debug!("{id}: dropping duplicate component {}", component.name());
                continue;
            }
            slots.insert(component.type_id(), ordered.len());
            ordered.push(component);
        }
        log::debug!("{id}: created with {} components", ordered.len());
        Self {
            id,
            components: ordered,
            slots,
        }
    }

    /// Builds a structure already wrapped for sharing between chunks.
    #[must_use]
    pub fn shared(components: impl IntoIterator<Item = ComponentType>) -> Arc<Self> {
        Arc::new(Self::new(components))
    }

    /// Process-unique identity of this structure.
    #[must_use]
    pub fn id(&self) -> StructureId {
        self.id
    }

    /// Slot of the component with the given type identity.
    #[must_use]
    pub fn index_of(&self, type_id: TypeId) -> Option<usize> {
        self.slots.get(&type_id).copied()
    }

    /// Slot of component `T`.
    #[must_use]
    pub fn index_of_component<T: Component>(&self) -> Option<usize> {
        self.index_of(TypeId::of::<T>())
    }

    /// Returns true if the structure has a slot for `T`.
    #[must_use]
    pub fn contains<T: Component>(&self) -> bool {
        self.slots.contains_key(&TypeId::of::<T>())
    }

    /// Number of component slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns true if the structure has no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Component descriptor at `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is past the last component.
    #[must_use]
    pub fn component_at(&self, slot: usize) -> &ComponentType {
        invariant!(
            slot < self.components.len(),
            "slot {slot} out of range for {} ({} components)",
            self.id,
            self.components.len()
        );
        &self.components[slot]
    }

    /// Component descriptors in slot order.
    #[must_use]
    pub fn components(&self) -> &[ComponentType] {
        &self.components
    }

    /// Returns true if `a` and `b` are the same structure instance.
    #[must_use]
    pub fn same(a: &Self, b: &Self) -> bool {
        a.id == b.id
    }
}

impl PartialEq for Structure {
    fn eq(&self, other: &Self) -> bool {
        Self::same(self, other)
    }
}

impl Eq for Structure {}

impl fmt::Debug for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Structure")
            .field("id", &self.id)
            .field("components", &self.components)
            .finish()
    }
}
