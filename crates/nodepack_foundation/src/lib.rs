//! Component identity, block allocation, and error types for Nodepack.
//!
//! This crate provides:
//! - [`ComponentType`] - Runtime identity, layout, and [`Ownership`] of a component
//! - [`Component`] - Trait implemented by plain-old-data column types
//! - [`BlockAllocator`] - Zeroed block source, with [`SystemAllocator`] and [`TrackingAllocator`]
//! - [`StructureId`] and [`NodeId`] - Structure identities and generational tree handles
//! - [`Error`] - Rich error types with context
//! - [`invariant!`] - Fatal assertion for contract violations

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod allocator;
mod component;
mod error;
mod id;
mod invariant;

pub use allocator::{
    AllocationStats, BlockAllocator, SystemAllocator, TrackingAllocator, allocate_block,
    free_block,
};
pub use component::{Component, ComponentType, Ownership};
pub use error::{Error, ErrorContext, ErrorKind, Result};
pub use id::{NodeId, StructureId};
pub use invariant::fatal;
