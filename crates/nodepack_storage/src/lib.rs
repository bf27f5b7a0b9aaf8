//! Chunk allocations, chunk arrays, and chunk trees for Nodepack.
//!
//! This crate provides:
//! - [`Structure`] - Ordered, deduplicated set of component types
//! - [`ChunkAllocation`] - One block per component, sized for a node capacity
//! - [`ChunkArray`] - Several equal sub-chunks sharing one block per component
//! - [`ChunkForest`] - Arena of tree nodes linked by parent, first child, and sibling ring
//! - [`ChunkView`] / [`ChunkViewMut`] - Borrowed column views and [`copy_data`]
//! - [`ChunkAccess`] and [`KindRef`] - What operations run against

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod access;
mod allocation;
mod array;
mod chunk;
mod forest;
mod kind;
mod structure;

pub use access::ChunkAccess;
pub use allocation::ChunkAllocation;
pub use array::ChunkArray;
pub use chunk::{ChunkView, ChunkViewMut, copy_data};
pub use forest::{Ancestors, ChunkForest, Descendants, Ring, TreeChunk, TreeLinks};
pub use kind::{ChunkKind, KindRef, TreeRef};
pub use structure::Structure;
