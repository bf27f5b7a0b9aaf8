//! Integration tests for Layer 0: Foundation
//!
//! Tests for core types: ComponentType, block allocators, ids, and Error.

mod components;
