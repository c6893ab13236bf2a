//! Metadata node bookkeeping: `maxNodeReferences` and `totalGeometryCount`.

use serin_rtree_store::{GraphStore, NodeId};

/// Default `maxNodeReferences` when a tree is created without an explicit
/// override.
pub const DEFAULT_MAX_NODE_REFERENCES: u32 = 100;

/// Fixed loading factor used by the bulk loader (§4.6). The spec pins this
/// rather than exposing it as a runtime knob, but it is named here so the
/// value is discoverable and the bulk loader does not carry a magic number.
pub const DEFAULT_LOADING_FACTOR: f64 = 0.7;

/// Read `maxNodeReferences` from the metadata node, defaulting if absent.
pub fn read_max_node_references<S: GraphStore>(store: &S, metadata_node: NodeId) -> u32 {
    store
        .get_max_node_references(metadata_node)
        .unwrap_or(DEFAULT_MAX_NODE_REFERENCES)
}

/// Persist `maxNodeReferences` on the metadata node.
pub fn write_max_node_references<S: GraphStore>(
    store: &S,
    metadata_node: NodeId,
    value: u32,
) -> serin_rtree_store::Result<()> {
    store.set_max_node_references(metadata_node, value)
}

/// Read `totalGeometryCount` from the metadata node, defaulting to zero.
pub fn read_total_geometry_count<S: GraphStore>(store: &S, metadata_node: NodeId) -> u64 {
    store.get_total_geometry_count(metadata_node).unwrap_or(0)
}

/// Persist `totalGeometryCount` on the metadata node.
pub fn write_total_geometry_count<S: GraphStore>(
    store: &S,
    metadata_node: NodeId,
    value: u64,
) -> serin_rtree_store::Result<()> {
    store.set_total_geometry_count(metadata_node, value)
}
