//! Error types for the highlight engine
//!
//! The anchoring core (indexing, resolution, rendering) never fails loudly:
//! it reports degraded results instead. These types cover the edges that can
//! genuinely fail: tree mutation, markup parsing, configuration, persistence,
//! and selections that cannot become anchors.

use thiserror::Error;

use crate::dom::NodeId;

/// Tree operation errors (the DOM's `IndexSizeError`, `HierarchyRequestError`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("offset {offset} exceeds node length {length}")]
    IndexSize { offset: usize, length: usize },

    #[error("node {0:?} does not exist")]
    UnknownNode(NodeId),

    #[error("node {0:?} cannot hold children")]
    NotAContainer(NodeId),

    #[error("node {0:?} is not a text node")]
    NotAText(NodeId),

    #[error("node {0:?} is not an element")]
    NotAnElement(NodeId),

    #[error("node {child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("inserting {child:?} under {parent:?} would create a cycle")]
    Hierarchy { parent: NodeId, child: NodeId },

    #[error("node {0:?} has no parent")]
    Detached(NodeId),
}

/// Markup that could not be turned into a document
#[derive(Debug, Clone, Error)]
pub enum HtmlError {
    #[error("malformed markup at byte {position}: {reason}")]
    Malformed { position: usize, reason: String },

    #[error("tree construction failed: {0}")]
    Tree(#[from] DomError),
}

/// Engine options that could not be read
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid options JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid option `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Persistence collaborator failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("highlight not found: {id}")]
    NotFound { id: String },

    #[error("highlight store unavailable: {0}")]
    Unavailable(String),
}

/// Why a user selection did not become an anchor
///
/// These are rejected silently at the session level; the reason only
/// reaches the log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionRejected {
    #[error("selection is collapsed")]
    Collapsed,

    #[error("selection contains only whitespace")]
    WhitespaceOnly,

    #[error("selection boundary is outside the indexed content")]
    Unmappable,
}

/// Umbrella error for session and API operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Html(#[from] HtmlError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dom(#[from] DomError),

    #[error("selection rejected: {0}")]
    Selection(#[from] SelectionRejected),

    #[error("selection was captured against content that has since changed")]
    StaleSelection,

    #[error("invalid selection path: {0}")]
    InvalidPath(String),
}
