//! Component identity, layout, and ownership.
//!
//! A component is one column of a node record. Its descriptor carries the
//! runtime type identity, byte size and alignment, and whether one record
//! exists per node or one per chunk.

use std::alloc::Layout;
use std::any::{TypeId, type_name};
use std::fmt;
use std::mem::{align_of, size_of};

use bytemuck::Pod;

use crate::error::{Error, Result};
use crate::invariant;

/// How many records of a component a chunk holds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// One record per node; the column has node-capacity records.
    PerNode,
    /// One record shared by every node of the chunk.
    PerChunk,
}

impl Ownership {
    /// Number of records a column of this ownership needs for `node_capacity` nodes.
    #[must_use]
    pub const fn records(self, node_capacity: usize) -> usize {
        match self {
            Self::PerNode => node_capacity,
            Self::PerChunk => 1,
        }
    }

    /// Returns true for per-node ownership.
    #[must_use]
    pub const fn is_per_node(self) -> bool {
        matches!(self, Self::PerNode)
    }
}

impl fmt::Display for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerNode => write!(f, "per-node"),
            Self::PerChunk => write!(f, "per-chunk"),
        }
    }
}

/// A type that can be stored as a chunk column.
///
/// Components are plain old data: freshly allocated columns are zeroed, and
/// chunk copies move bytes without running any code, so both must produce
/// valid values.
///
/// ```
/// use bytemuck::{Pod, Zeroable};
/// use nodepack_foundation::{Component, Ownership};
///
/// #[derive(Clone, Copy, Pod, Zeroable)]
/// #[repr(C)]
/// struct Position { x: f32, y: f32 }
/// impl Component for Position {}
///
/// #[derive(Clone, Copy, Pod, Zeroable)]
/// #[repr(C)]
/// struct Tint { rgba: u32 }
/// impl Component for Tint {
///     const OWNERSHIP: Ownership = Ownership::PerChunk;
/// }
/// ```
pub trait Component: Pod + 'static {
    /// Whether the component is stored once per node or once per chunk.
    const OWNERSHIP: Ownership = Ownership::PerNode;
}

/// Immutable descriptor of one component kind.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ComponentType {
    type_id: TypeId,
    name: &'static str,
    size: usize,
    align: usize,
    ownership: Ownership,
}

impl ComponentType {
    /// Describes the component type `T`.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized; zero-sized columns carry no data.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        invariant!(
            size_of::<T>() > 0,
            "component {} is zero-sized",
            type_name::<T>()
        );
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
            size: size_of::<T>(),
            align: align_of::<T>(),
            ownership: T::OWNERSHIP,
        }
    }

    /// Builds a descriptor from raw parts.
    ///
    /// Returns `Err` if `size` is zero or `align` is not a power of two.
    pub fn new(
        type_id: TypeId,
        name: &'static str,
        size: usize,
        align: usize,
        ownership: Ownership,
    ) -> Result<Self> {
        if size == 0 {
            return Err(Error::invalid_component_type(name, "size must be non-zero"));
        }
        if !align.is_power_of_two() {
            return Err(Error::invalid_component_type(
                name,
                format!("alignment {align} is not a power of two"),
            ));
        }
        if size % align != 0 {
            return Err(Error::invalid_component_type(
                name,
                format!("size {size} is not a multiple of alignment {align}"),
            ));
        }
        Ok(Self {
            type_id,
            name,
            size,
            align,
            ownership,
        })
    }

    /// Runtime identity token of the component type.
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Diagnostic name of the component type.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Size of one record in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Alignment of one record in bytes.
    #[must_use]
    pub const fn align(&self) -> usize {
        self.align
    }

    /// Per-node or per-chunk.
    #[must_use]
    pub const fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Returns true if this descriptor identifies `T`.
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Returns true if records of this descriptor can be read as `T`.
    ///
    /// Holds when `T` has the same size and no stricter alignment.
    #[must_use]
    pub fn layout_matches<T>(&self) -> bool {
        self.size == size_of::<T>() && self.align >= align_of::<T>()
    }

    /// Number of records one chunk of `node_capacity` nodes holds.
    #[must_use]
    pub const fn records_for(&self, node_capacity: usize) -> usize {
        self.ownership.records(node_capacity)
    }

    /// Byte length of `records` consecutive records.
    #[must_use]
    pub const fn byte_len(&self, records: usize) -> usize {
        self.size * records
    }

    /// Memory layout of a block of `records` records.
    ///
    /// # Panics
    ///
    /// Panics if the block size overflows `isize`.
    #[must_use]
    pub fn layout_for(&self, records: usize) -> Layout {
        let bytes = self.size.checked_mul(records);
        match bytes.map(|bytes| Layout::from_size_align(bytes, self.align)) {
            Some(Ok(layout)) => layout,
            _ => crate::fatal(format_args!(
                "block of {records} {} records overflows",
                self.name
            )),
        }
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ComponentType({}, {}B align {}, {})",
            self.name, self.size, self.align, self.ownership
        )
    }
}
