//! Single-record insertion (§4.4): choose-subtree descent, leaf insert,
//! split cascade, path bbox adjustment.

use serin_rtree_store::{EdgeKind, GraphStore, NodeId};

use crate::config::RTreeConfig;
use crate::envelope::Envelope;
use crate::error::{RTreeError, Result};
use crate::metadata;
use crate::monitor::Monitor;
use crate::split;
use crate::topology;
use crate::{EnvelopeSource, GeometryId};

/// `chooseSubtree(parent, geometry)`: the child whose bbox already contains
/// `geom_env` with the smallest area, or failing that the child needing the
/// smallest enlargement (ties broken by first encountered in both passes).
pub fn choose_subtree<S: GraphStore>(
    store: &S,
    parent: NodeId,
    geom_env: &Envelope,
) -> Result<NodeId> {
    let kids = topology::children(store, parent);
    if kids.is_empty() {
        return Err(RTreeError::InvariantViolated(
            "no viable child on a non-root internal node".to_string(),
        ));
    }

    let mut containing: Option<(NodeId, f64)> = None;
    for &child in &kids {
        if let Some(env) = topology::envelope_of_node(store, child) {
            if env.contains(geom_env) {
                let area = env.area();
                if containing.map_or(true, |(_, best)| area < best) {
                    containing = Some((child, area));
                }
            }
        }
    }
    if let Some((child, _)) = containing {
        return Ok(child);
    }

    let mut best: Option<(NodeId, f64, f64)> = None;
    for &child in &kids {
        let env = topology::envelope_of_node(store, child).unwrap_or_else(Envelope::empty_at_origin);
        let enlargement = env.union(geom_env).area() - env.area();
        let area = env.area();
        let better = match best {
            None => true,
            Some((_, best_enl, best_area)) => {
                enlargement < best_enl || (enlargement == best_enl && area < best_area)
            }
        };
        if better {
            best = Some((child, enlargement, area));
        }
    }
    best.map(|(child, _, _)| child).ok_or_else(|| {
        RTreeError::InvariantViolated("no viable child on a non-root internal node".to_string())
    })
}

/// Insert a single geometry starting the descent at `start` (an IndexRoot or
/// any internal node), cascading splits up through `layer_root` if the tree
/// root itself overflows. Does not touch `totalGeometryCount`; callers that
/// represent a "public" insert (as opposed to bulk loader bookkeeping) do
/// that themselves via [`metadata`].
pub(crate) fn insert_entry_from<S: GraphStore, E: EnvelopeSource, M: Monitor>(
    store: &S,
    envelopes: &E,
    config: &RTreeConfig,
    monitor: &M,
    layer_root: NodeId,
    start: NodeId,
    geometry: GeometryId,
    geom_env: &Envelope,
) -> Result<()> {
    let mut node = start;
    while !topology::is_leaf(store, node) {
        node = choose_subtree(store, node, geom_env)?;
    }
    store.add_edge(node, EdgeKind::Reference, geometry.0)?;

    if topology::references(store, node).len() as u32 > config.max_node_references {
        split::split_and_adjust_path(store, envelopes, config, monitor, layer_root, node)?;
    } else {
        topology::tighten_path(store, envelopes, node)?;
    }
    Ok(())
}

/// `add(geometry)`: the Writer API's single-record insert, including the
/// `totalGeometryCount` bump (§4.4 step 5).
pub fn add<S: GraphStore, E: EnvelopeSource, M: Monitor>(
    store: &S,
    envelopes: &E,
    config: &RTreeConfig,
    monitor: &M,
    layer_root: NodeId,
    metadata_node: NodeId,
    geometry: GeometryId,
) -> Result<()> {
    let root = topology::index_root(store, layer_root)
        .ok_or_else(|| RTreeError::InvariantViolated("LayerRoot has no IndexRoot".to_string()))?;
    let geom_env = topology::envelope_of_geometry(envelopes, geometry)?;
    insert_entry_from(
        store, envelopes, config, monitor, layer_root, root, geometry, &geom_env,
    )?;

    let count = metadata::read_total_geometry_count(store, metadata_node);
    metadata::write_total_geometry_count(store, metadata_node, count + 1)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RTreeConfig;
    use crate::monitor::NoopMonitor;
    use crate::test_support::MapEnvelopeSource;
    use serin_rtree_store::memory::MemoryStore;
    use serin_rtree_store::EdgeKind;

    fn new_tree(store: &MemoryStore) -> (NodeId, NodeId) {
        let layer_root = store.create_node();
        let root = store.create_node();
        store.add_edge(layer_root, EdgeKind::Root, root).unwrap();
        let metadata_node = store.create_node();
        store.add_edge(layer_root, EdgeKind::Metadata, metadata_node).unwrap();
        (layer_root, metadata_node)
    }

    #[test]
    fn choose_subtree_prefers_containing_child_by_smallest_area() {
        let store = MemoryStore::new();
        let parent = store.create_node();
        let big = store.create_node();
        let small = store.create_node();
        store.set_bbox(big, Envelope::new(-10.0, -10.0, 10.0, 10.0).to_array()).unwrap();
        store.set_bbox(small, Envelope::new(-1.0, -1.0, 1.0, 1.0).to_array()).unwrap();
        store.add_edge(parent, EdgeKind::Child, big).unwrap();
        store.add_edge(parent, EdgeKind::Child, small).unwrap();

        let target = choose_subtree(&store, parent, &Envelope::new(0.0, 0.0, 0.5, 0.5)).unwrap();
        assert_eq!(target, small);
    }

    #[test]
    fn choose_subtree_falls_back_to_smallest_enlargement() {
        let store = MemoryStore::new();
        let parent = store.create_node();
        let a = store.create_node();
        let b = store.create_node();
        store.set_bbox(a, Envelope::new(0.0, 0.0, 1.0, 1.0).to_array()).unwrap();
        store.set_bbox(b, Envelope::new(5.0, 5.0, 6.0, 6.0).to_array()).unwrap();
        store.add_edge(parent, EdgeKind::Child, a).unwrap();
        store.add_edge(parent, EdgeKind::Child, b).unwrap();

        // Neither contains (1.5,1.5..2,2); a enlarges less.
        let target = choose_subtree(&store, parent, &Envelope::new(1.5, 1.5, 2.0, 2.0)).unwrap();
        assert_eq!(target, a);
    }

    #[test]
    fn add_inserts_at_leaf_and_tightens_bbox() {
        let store = MemoryStore::new();
        let (layer_root, metadata_node) = new_tree(&store);
        let envelopes = MapEnvelopeSource::new();
        let config = RTreeConfig::default();
        let monitor = NoopMonitor;

        let g = envelopes.insert(&store, Envelope::new(0.0, 0.0, 1.0, 1.0));
        add(&store, &envelopes, &config, &monitor, layer_root, metadata_node, g).unwrap();

        let root = topology::index_root(&store, layer_root).unwrap();
        assert!(topology::is_leaf(&store, root));
        assert_eq!(
            topology::envelope_of_node(&store, root).unwrap(),
            Envelope::new(0.0, 0.0, 1.0, 1.0)
        );
        assert_eq!(metadata::read_total_geometry_count(&store, metadata_node), 1);
    }
}
