//! Read-only tree navigation (§4.3) plus the bbox-tightening walk shared by
//! insertion, splitting, bulk loading and deletion.
//!
//! `IndexNode`s never hold an owning parent pointer: `parent` is computed
//! lazily from the store's incoming `CHILD` index, per the "no back-pointers"
//! design note.

use serin_rtree_store::{EdgeKind, GraphStore, NodeId};

use crate::envelope::Envelope;
use crate::error::{RTreeError, Result};
use crate::{EnvelopeSource, GeometryId};

/// Follow `LayerRoot`'s unique `ROOT` edge.
pub fn index_root<S: GraphStore>(store: &S, layer_root: NodeId) -> Option<NodeId> {
    store.edges_out(layer_root, EdgeKind::Root).into_iter().next()
}

/// True iff `node` has no outgoing `CHILD` edge.
pub fn is_leaf<S: GraphStore>(store: &S, node: NodeId) -> bool {
    store.edges_out(node, EdgeKind::Child).is_empty()
}

/// Enumerate `node`'s `CHILD` endpoints.
pub fn children<S: GraphStore>(store: &S, node: NodeId) -> Vec<NodeId> {
    store.edges_out(node, EdgeKind::Child)
}

/// Enumerate `node`'s `REFERENCE` endpoints.
pub fn references<S: GraphStore>(store: &S, node: NodeId) -> Vec<GeometryId> {
    store
        .edges_out(node, EdgeKind::Reference)
        .into_iter()
        .map(GeometryId)
        .collect()
}

/// Start of the unique incoming `CHILD` edge, or `None` if `node` is the
/// IndexRoot.
pub fn parent<S: GraphStore>(store: &S, node: NodeId) -> Option<NodeId> {
    store.edges_in(node, EdgeKind::Child).into_iter().next()
}

/// 1 + height of the first child if any, else 1 (leaf level is 1; IndexRoot
/// level is the tree height). The "+1 at the leaf" convention is deliberate
/// (§9) and covered by an explicit test below.
pub fn height<S: GraphStore>(store: &S, node: NodeId) -> u32 {
    match children(store, node).into_iter().next() {
        Some(first_child) => 1 + height(store, first_child),
        None => 1,
    }
}

/// Read the `bbox` property and construct an [`Envelope`]; `None` if absent
/// (only valid transiently during splits, or permanently on an empty tree).
pub fn envelope_of_node<S: GraphStore>(store: &S, node: NodeId) -> Option<Envelope> {
    store.get_bbox(node).map(Envelope::from_array)
}

/// Delegate to the envelope decoder for a Geometry reference.
pub fn envelope_of_geometry<E: EnvelopeSource>(envelopes: &E, geometry: GeometryId) -> Result<Envelope> {
    envelopes
        .envelope_of(geometry)
        .ok_or(RTreeError::NotFound(geometry))
}

/// Recompute `node`'s bbox from its current children (internal) or
/// references (leaf). `None` iff the node has no children/references at all.
pub fn compute_bbox<S: GraphStore, E: EnvelopeSource>(
    store: &S,
    envelopes: &E,
    node: NodeId,
) -> Result<Option<Envelope>> {
    let mut acc: Option<Envelope> = None;
    if is_leaf(store, node) {
        for geometry in references(store, node) {
            let env = envelope_of_geometry(envelopes, geometry)?;
            acc = Some(acc.map_or(env, |a| a.union(&env)));
        }
    } else {
        for child in children(store, node) {
            if let Some(env) = envelope_of_node(store, child) {
                acc = Some(acc.map_or(env, |a| a.union(&env)));
            }
        }
    }
    Ok(acc)
}

/// Recompute and store `node`'s bbox. Returns `true` iff the stored bbox
/// actually changed (used to decide whether to keep walking toward the
/// root). Clears the property (rather than writing the empty sentinel) when
/// the node has become empty — callers that want the `(0,0,0,0)` sentinel
/// for an empty tree construct it themselves from an absent bbox.
pub fn retighten<S: GraphStore, E: EnvelopeSource>(
    store: &S,
    envelopes: &E,
    node: NodeId,
) -> Result<bool> {
    let before = store.get_bbox(node);
    match compute_bbox(store, envelopes, node)? {
        None => {
            if before.is_some() {
                store.clear_bbox(node)?;
                Ok(true)
            } else {
                Ok(false)
            }
        }
        Some(env) => {
            let arr = env.to_array();
            if before == Some(arr) {
                Ok(false)
            } else {
                store.set_bbox(node, arr)?;
                Ok(true)
            }
        }
    }
}

/// Walk from `start` toward the root, retightening bboxes, stopping at the
/// first node whose bbox did not change (or at the root). Idempotent.
pub fn tighten_path<S: GraphStore, E: EnvelopeSource>(
    store: &S,
    envelopes: &E,
    start: NodeId,
) -> Result<()> {
    let mut node = start;
    loop {
        let changed = retighten(store, envelopes, node)?;
        if !changed {
            return Ok(());
        }
        match parent(store, node) {
            Some(p) => node = p,
            None => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MapEnvelopeSource;
    use serin_rtree_store::memory::MemoryStore;

    #[test]
    fn height_counts_leaf_level_as_one() {
        let store = MemoryStore::new();
        let leaf = store.create_node();
        assert_eq!(height(&store, leaf), 1);

        let internal = store.create_node();
        store.add_edge(internal, EdgeKind::Child, leaf).unwrap();
        assert_eq!(height(&store, internal), 2);
    }

    #[test]
    fn parent_is_none_for_root() {
        let store = MemoryStore::new();
        let root = store.create_node();
        assert_eq!(parent(&store, root), None);
    }

    #[test]
    fn retighten_unions_children_and_stops_when_unchanged() {
        let store = MemoryStore::new();
        let envelopes = MapEnvelopeSource::new();
        let leaf = store.create_node();
        let g1 = envelopes.insert(&store, Envelope::new(0.0, 0.0, 1.0, 1.0));
        let g2 = envelopes.insert(&store, Envelope::new(2.0, 2.0, 3.0, 3.0));
        store.add_edge(leaf, EdgeKind::Reference, g1.0).unwrap();
        store.add_edge(leaf, EdgeKind::Reference, g2.0).unwrap();

        assert!(retighten(&store, &envelopes, leaf).unwrap());
        assert_eq!(
            envelope_of_node(&store, leaf).unwrap(),
            Envelope::new(0.0, 0.0, 3.0, 3.0)
        );
        assert!(!retighten(&store, &envelopes, leaf).unwrap());
    }
}
