//! Integration tests for Layer 2: Engine
//!
//! Tests for operation routing, tree neighbour capabilities, array stepping,
//! and pipelines.

mod neighbours;
mod pipelines;
