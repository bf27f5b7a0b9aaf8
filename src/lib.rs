//! Nodepack - Chunked node storage with cached operation routing
//!
//! This crate re-exports all layers of the Nodepack system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 2: nodepack_engine     - Operations, routing cache, pipelines
//! Layer 1: nodepack_storage    - Structures, chunks, chunk arrays, chunk trees
//! Layer 0: nodepack_foundation - Component types, block allocators, errors
//! ```

pub use nodepack_engine as engine;
pub use nodepack_foundation as foundation;
pub use nodepack_storage as storage;
