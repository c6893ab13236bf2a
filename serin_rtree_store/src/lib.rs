//! Graph store adapter consumed by `serin_rtree`.
//!
//! The R-tree core never touches a concrete storage engine; it only talks to
//! whatever implements [`GraphStore`]. This crate defines that seam plus a
//! synchronous in-memory reference implementation ([`memory::MemoryStore`])
//! used by the core's test suite and usable as a default for callers who do
//! not have a durable graph store of their own.
#![deny(missing_docs)]

pub mod memory;

use serde::{Deserialize, Serialize};

/// Stable identifier of a node in the graph store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Typed directed edge kinds the R-tree core creates and follows.
///
/// `Root` and `Metadata` are only ever attached to the caller's `LayerRoot`
/// node; `Child` links an index node to its subtree children; `Reference`
/// links a leaf index node to the geometry records it indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// LayerRoot -> IndexRoot.
    Root,
    /// LayerRoot -> Metadata.
    Metadata,
    /// IndexNode -> IndexNode (subtree child).
    Child,
    /// IndexNode (leaf) -> Geometry.
    Reference,
}

/// Errors surfaced by the store adapter.
///
/// These correspond to the `StoreError` kind in the core's error taxonomy;
/// the core wraps them via `#[from]` rather than inventing a parallel set.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Operation referenced a node id that does not exist in the store.
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),
    /// Operation referenced an edge that does not exist in the store.
    #[error("edge not found: {from:?} -{kind:?}-> {to:?}")]
    EdgeNotFound {
        /// Source of the missing edge.
        from: NodeId,
        /// Kind of the missing edge.
        kind: EdgeKind,
        /// Destination of the missing edge.
        to: NodeId,
    },
}

/// Result alias for store adapter operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Minimal contract the R-tree core needs from an external graph store.
///
/// Implementations are expected to provide single-writer semantics within a
/// [`GraphStore::transaction`] scope; the core never interleaves mutations
/// from two concurrent callers itself (see the crate's concurrency notes).
pub trait GraphStore {
    /// Create a new, otherwise empty node and return its id.
    fn create_node(&self) -> NodeId;

    /// Delete a node and every edge incident to it (incoming or outgoing).
    fn delete_node(&self, node: NodeId) -> Result<()>;

    /// Add a typed directed edge `from -kind-> to`.
    fn add_edge(&self, from: NodeId, kind: EdgeKind, to: NodeId) -> Result<()>;

    /// Remove a typed directed edge `from -kind-> to`.
    fn remove_edge(&self, from: NodeId, kind: EdgeKind, to: NodeId) -> Result<()>;

    /// Enumerate the targets of `node`'s outgoing edges of the given kind.
    fn edges_out(&self, node: NodeId, kind: EdgeKind) -> Vec<NodeId>;

    /// Enumerate the sources of `node`'s incoming edges of the given kind.
    fn edges_in(&self, node: NodeId, kind: EdgeKind) -> Vec<NodeId>;

    /// True iff `node` currently exists in the store.
    fn node_exists(&self, node: NodeId) -> bool;

    /// Read the `bbox` property (absent iff the node has no children yet).
    fn get_bbox(&self, node: NodeId) -> Option<[f64; 4]>;

    /// Write the `bbox` property.
    fn set_bbox(&self, node: NodeId, bbox: [f64; 4]) -> Result<()>;

    /// Clear the `bbox` property (node has become empty).
    fn clear_bbox(&self, node: NodeId) -> Result<()>;

    /// Read the `maxNodeReferences` property of a Metadata node.
    fn get_max_node_references(&self, node: NodeId) -> Option<u32>;

    /// Write the `maxNodeReferences` property of a Metadata node.
    fn set_max_node_references(&self, node: NodeId, value: u32) -> Result<()>;

    /// Read the `totalGeometryCount` property of a Metadata node.
    fn get_total_geometry_count(&self, node: NodeId) -> Option<u64>;

    /// Write the `totalGeometryCount` property of a Metadata node.
    fn set_total_geometry_count(&self, node: NodeId, value: u64) -> Result<()>;

    /// Run `f` inside a scoped transaction, guaranteeing the scope is
    /// released whether `f` returns `Ok` or `Err`.
    ///
    /// Generic over the caller's own error type so the store adapter does
    /// not need to know about the core's `RTreeError`.
    fn transaction<F, R, E>(&self, f: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&Self) -> std::result::Result<R, E>,
        Self: Sized;
}
