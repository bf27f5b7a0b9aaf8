//! Error types for the Nodepack system.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.
//!
//! Only recoverable misuse of data-moving calls surfaces here. Expected
//! mismatches are reported as `bool`, and contract violations go through
//! [`invariant!`](crate::invariant).

use std::fmt;

use thiserror::Error;

use crate::id::{NodeId, StructureId};

/// The main error type for Nodepack operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates an invalid component type error.
    #[must_use]
    pub fn invalid_component_type(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidComponentType {
            name: name.into(),
            reason: reason.into(),
        })
    }

    /// Creates a structure mismatch error.
    #[must_use]
    pub fn structure_mismatch(expected: StructureId, actual: StructureId) -> Self {
        Self::new(ErrorKind::StructureMismatch { expected, actual })
    }

    /// Creates a null chunk error.
    #[must_use]
    pub fn null_chunk() -> Self {
        Self::new(ErrorKind::NullChunk)
    }

    /// Creates a node not found error.
    #[must_use]
    pub fn node_not_found(id: NodeId) -> Self {
        Self::new(ErrorKind::NodeNotFound(id))
    }

    /// Creates a stale node handle error.
    #[must_use]
    pub fn stale_node(id: NodeId) -> Self {
        Self::new(ErrorKind::StaleNode(id))
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// A component descriptor had an unusable size or alignment.
    #[error("invalid component type {name}: {reason}")]
    InvalidComponentType {
        /// Name of the offending component type.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Two chunks were combined that do not share one structure instance.
    #[error("structure mismatch: expected {expected}, got {actual}")]
    StructureMismatch {
        /// The structure of the destination.
        expected: StructureId,
        /// The structure of the source.
        actual: StructureId,
    },

    /// A null chunk was used where data was required.
    #[error("null chunk")]
    NullChunk,

    /// Tree node was never allocated.
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Tree node handle is stale (generation mismatch).
    #[error("stale node reference: {0:?}")]
    StaleNode(NodeId),
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Name of the operation that failed.
    pub operation: Option<String>,
    /// Structure involved, if any.
    pub structure: Option<StructureId>,
    /// Tree node involved, if any.
    pub node: Option<NodeId>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the operation name.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Sets the structure involved.
    #[must_use]
    pub fn with_structure(mut self, structure: StructureId) -> Self {
        self.structure = Some(structure);
        self
    }

    /// Sets the tree node involved.
    #[must_use]
    pub fn with_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(operation) = &self.operation {
            write!(f, "in {operation}")?;
        }
        if let Some(structure) = self.structure {
            write!(f, " [{structure}]")?;
        }
        if let Some(node) = self.node {
            write!(f, " [{node}]")?;
        }
        Ok(())
    }
}

/// Result type alias for Nodepack operations.
pub type Result<T> = std::result::Result<T, Error>;
