//! Cross-layer integration tests
//!
//! End-to-end scenarios that build chunks, link them into trees, and run
//! operations and pipelines across every chunk shape.

mod scenarios;
