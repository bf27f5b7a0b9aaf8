//! Integration tests for Layer 1: Storage
//!
//! Tests for structures, chunk allocations, chunk arrays, and chunk trees.

mod chunks;
