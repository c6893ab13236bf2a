//! Deletion and compaction (§4.7): single-geometry removal, empty-ancestor
//! pruning, and the mass `removeAll`/`clear` operations.

use serin_rtree_store::{EdgeKind, GraphStore, NodeId};

use crate::error::{RTreeError, Result};
use crate::metadata;
use crate::progress::ProgressListener;
use crate::topology;
use crate::{EnvelopeSource, GeometryId};

/// Count every geometry reachable from `node` (used for progress totals and
/// for the defensive `count()` recompute).
pub(crate) fn count_geometries<S: GraphStore>(store: &S, node: NodeId) -> u64 {
    if topology::is_leaf(store, node) {
        topology::references(store, node).len() as u64
    } else {
        topology::children(store, node)
            .into_iter()
            .map(|c| count_geometries(store, c))
            .sum()
    }
}

/// Delete `node` and every empty ancestor above it, stopping at the first
/// non-empty ancestor (which gets re-tightened) or at `root` (which keeps
/// its identity but loses its `bbox`, per §9).
fn prune_empty_ancestors<S: GraphStore, E: EnvelopeSource>(
    store: &S,
    envelopes: &E,
    mut node: NodeId,
    root: NodeId,
) -> Result<()> {
    loop {
        if node == root {
            store.clear_bbox(node)?;
            return Ok(());
        }
        let parent = topology::parent(store, node);
        store.delete_node(node)?;
        tracing::trace!(node = ?node, "pruned empty index node");
        match parent {
            Some(p) => {
                if topology::is_leaf(store, p) && topology::children(store, p).is_empty() {
                    node = p;
                    continue;
                }
                topology::tighten_path(store, envelopes, p)?;
                return Ok(());
            }
            None => return Ok(()),
        }
    }
}

/// `remove(geomId, deleteRecord, strict)`.
pub fn remove<S: GraphStore, E: EnvelopeSource>(
    store: &S,
    envelopes: &E,
    layer_root: NodeId,
    metadata_node: NodeId,
    geometry: GeometryId,
    delete_record: bool,
    strict: bool,
) -> Result<()> {
    if !store.node_exists(geometry.0) {
        return if strict { Err(RTreeError::NotFound(geometry)) } else { Ok(()) };
    }

    let leaf = match store.edges_in(geometry.0, EdgeKind::Reference).into_iter().next() {
        Some(l) => l,
        None => {
            return if strict { Err(RTreeError::NotIndexedHere(geometry)) } else { Ok(()) };
        }
    };

    let mut cursor = leaf;
    while let Some(p) = topology::parent(store, cursor) {
        cursor = p;
    }
    let index_root = topology::index_root(store, layer_root);
    if Some(cursor) != index_root {
        return if strict { Err(RTreeError::NotIndexedHere(geometry)) } else { Ok(()) };
    }
    let index_root = index_root.unwrap();

    store.remove_edge(leaf, EdgeKind::Reference, geometry.0)?;
    if delete_record {
        store.delete_node(geometry.0)?;
    }

    if topology::references(store, leaf).is_empty() {
        prune_empty_ancestors(store, envelopes, leaf, index_root)?;
    } else {
        topology::tighten_path(store, envelopes, leaf)?;
    }

    let count = metadata::read_total_geometry_count(store, metadata_node);
    metadata::write_total_geometry_count(store, metadata_node, count.saturating_sub(1))?;
    Ok(())
}

fn delete_all_references<S: GraphStore, P: ProgressListener>(
    store: &S,
    node: NodeId,
    delete_records: bool,
    progress: &P,
) -> Result<()> {
    if topology::is_leaf(store, node) {
        for g in topology::references(store, node) {
            store.remove_edge(node, EdgeKind::Reference, g.0)?;
            if delete_records {
                store.delete_node(g.0)?;
            }
            progress.worked(1);
        }
    } else {
        for child in topology::children(store, node) {
            delete_all_references(store, child, delete_records, progress)?;
        }
    }
    Ok(())
}

fn delete_all_nodes<S: GraphStore>(store: &S, node: NodeId) -> Result<()> {
    for child in topology::children(store, node) {
        delete_all_nodes(store, child)?;
    }
    store.delete_node(node)?;
    Ok(())
}

/// `removeAll(deleteRecords, progress)`.
pub fn remove_all<S: GraphStore, E: EnvelopeSource, P: ProgressListener>(
    store: &S,
    _envelopes: &E,
    layer_root: NodeId,
    metadata_node: NodeId,
    delete_records: bool,
    progress: &P,
) -> Result<()> {
    let root = match topology::index_root(store, layer_root) {
        Some(r) => r,
        None => {
            progress.begin(0);
            progress.done();
            return Ok(());
        }
    };

    progress.begin(count_geometries(store, root));
    delete_all_references(store, root, delete_records, progress)?;
    delete_all_nodes(store, root)?;
    store.delete_node(metadata_node)?;
    progress.done();
    Ok(())
}

/// `clear(progress)`: `removeAll(false, ...)` then reinitialize IndexRoot and
/// Metadata. Returns the fresh metadata node id so the caller can update its
/// own bookkeeping.
pub fn clear<S: GraphStore, E: EnvelopeSource, P: ProgressListener>(
    store: &S,
    envelopes: &E,
    max_node_references: u32,
    layer_root: NodeId,
    metadata_node: NodeId,
    progress: &P,
) -> Result<NodeId> {
    remove_all(store, envelopes, layer_root, metadata_node, false, progress)?;

    let new_root = store.create_node();
    store.add_edge(layer_root, EdgeKind::Root, new_root)?;

    let new_metadata = store.create_node();
    metadata::write_max_node_references(store, new_metadata, max_node_references)?;
    metadata::write_total_geometry_count(store, new_metadata, 0)?;
    store.add_edge(layer_root, EdgeKind::Metadata, new_metadata)?;

    Ok(new_metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Envelope;
    use crate::insert;
    use crate::config::RTreeConfig;
    use crate::monitor::NoopMonitor;
    use crate::progress::NoopProgress;
    use crate::test_support::MapEnvelopeSource;
    use serin_rtree_store::memory::MemoryStore;

    fn new_tree(store: &MemoryStore) -> (NodeId, NodeId) {
        let layer_root = store.create_node();
        let root = store.create_node();
        store.add_edge(layer_root, EdgeKind::Root, root).unwrap();
        let metadata_node = store.create_node();
        store.add_edge(layer_root, EdgeKind::Metadata, metadata_node).unwrap();
        (layer_root, metadata_node)
    }

    #[test]
    fn remove_absent_non_strict_is_a_silent_noop() {
        let store = MemoryStore::new();
        let (layer_root, metadata_node) = new_tree(&store);
        let envelopes = MapEnvelopeSource::new();
        let ghost = GeometryId(serin_rtree_store::NodeId(99999));
        remove(&store, &envelopes, layer_root, metadata_node, ghost, false, false).unwrap();
        assert_eq!(metadata::read_total_geometry_count(&store, metadata_node), 0);
    }

    #[test]
    fn remove_absent_strict_errors() {
        let store = MemoryStore::new();
        let (layer_root, metadata_node) = new_tree(&store);
        let envelopes = MapEnvelopeSource::new();
        let ghost = GeometryId(serin_rtree_store::NodeId(99999));
        assert!(matches!(
            remove(&store, &envelopes, layer_root, metadata_node, ghost, false, true),
            Err(RTreeError::NotFound(_))
        ));
    }

    #[test]
    fn removing_last_reference_deletes_leaf_but_keeps_index_root() {
        let store = MemoryStore::new();
        let (layer_root, metadata_node) = new_tree(&store);
        let envelopes = MapEnvelopeSource::new();
        let config = RTreeConfig::default();
        let monitor = NoopMonitor;

        let g = envelopes.insert(&store, Envelope::new(0.0, 0.0, 1.0, 1.0));
        insert::add(&store, &envelopes, &config, &monitor, layer_root, metadata_node, g).unwrap();

        remove(&store, &envelopes, layer_root, metadata_node, g, false, true).unwrap();

        let root = topology::index_root(&store, layer_root).unwrap();
        assert!(store.node_exists(root));
        assert_eq!(topology::envelope_of_node(&store, root), None);
        assert_eq!(metadata::read_total_geometry_count(&store, metadata_node), 0);
    }

    #[test]
    fn clear_is_idempotent_and_yields_an_empty_tree() {
        let store = MemoryStore::new();
        let (layer_root, metadata_node) = new_tree(&store);
        let envelopes = MapEnvelopeSource::new();
        let config = RTreeConfig::default();
        let monitor = NoopMonitor;
        let progress = NoopProgress;

        let g = envelopes.insert(&store, Envelope::new(0.0, 0.0, 1.0, 1.0));
        insert::add(&store, &envelopes, &config, &monitor, layer_root, metadata_node, g).unwrap();

        let md1 = clear(&store, &envelopes, config.max_node_references, layer_root, metadata_node, &progress).unwrap();
        let md2 = clear(&store, &envelopes, config.max_node_references, layer_root, md1, &progress).unwrap();

        let root = topology::index_root(&store, layer_root).unwrap();
        assert_eq!(topology::envelope_of_node(&store, root), None);
        assert_eq!(metadata::read_total_geometry_count(&store, md2), 0);
    }
}
