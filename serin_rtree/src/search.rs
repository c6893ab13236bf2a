//! Search traversal (§4.8): a depth-first, envelope-pruned walk driven by a
//! filter, exposed as a pull-based `Iterator` so callers can stop early
//! without materializing the tree.

use serin_rtree_store::{GraphStore, NodeId};

use crate::envelope::Envelope;
use crate::topology;
use crate::GeometryId;

/// Caller-supplied predicate pair: which subtrees are worth descending into,
/// and which geometries in a matching leaf actually satisfy the query.
pub trait SearchFilter {
    /// Called on every IndexNode's bbox reached while descending. `false`
    /// prunes the subtree.
    fn needs_to_visit(&self, envelope: &Envelope) -> bool;
    /// Called on each reference in a visited leaf.
    fn geometry_matches(&self, geometry: GeometryId) -> bool;
}

/// Visits every node whose bbox overlaps a fixed query envelope; matches
/// every geometry in a visited leaf (pruning alone does the filtering).
pub struct IntersectsFilter(pub Envelope);

impl SearchFilter for IntersectsFilter {
    fn needs_to_visit(&self, envelope: &Envelope) -> bool {
        self.0.intersects(envelope)
    }
    fn geometry_matches(&self, _geometry: GeometryId) -> bool {
        true
    }
}

/// Visits every node whose bbox contains a fixed point.
pub struct ContainsPointFilter {
    pub x: f64,
    pub y: f64,
}

impl SearchFilter for ContainsPointFilter {
    fn needs_to_visit(&self, envelope: &Envelope) -> bool {
        envelope.contains_point(self.x, self.y)
    }
    fn geometry_matches(&self, _geometry: GeometryId) -> bool {
        true
    }
}

/// Visits everything; used by `warmUp`/`getAllIndexedNodes`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllFilter;

impl SearchFilter for AllFilter {
    fn needs_to_visit(&self, _envelope: &Envelope) -> bool {
        true
    }
    fn geometry_matches(&self, _geometry: GeometryId) -> bool {
        true
    }
}

/// Lazy, pull-based depth-first search. Built from an explicit work stack
/// (not recursion) so the iterator can suspend between items and the caller
/// can stop early.
pub struct SearchIter<'a, S: GraphStore, F: SearchFilter> {
    store: &'a S,
    filter: F,
    stack: Vec<NodeId>,
    pending: std::vec::IntoIter<GeometryId>,
}

impl<'a, S: GraphStore, F: SearchFilter> SearchIter<'a, S, F> {
    pub fn new(store: &'a S, root: NodeId, filter: F) -> Self {
        Self {
            store,
            filter,
            stack: vec![root],
            pending: Vec::new().into_iter(),
        }
    }
}

impl<'a, S: GraphStore, F: SearchFilter> Iterator for SearchIter<'a, S, F> {
    type Item = GeometryId;

    fn next(&mut self) -> Option<GeometryId> {
        loop {
            if let Some(g) = self.pending.next() {
                if self.filter.geometry_matches(g) {
                    return Some(g);
                }
                continue;
            }
            let node = self.stack.pop()?;
            let bbox = match topology::envelope_of_node(self.store, node) {
                Some(b) => b,
                None => continue,
            };
            if !self.filter.needs_to_visit(&bbox) {
                continue;
            }
            if topology::is_leaf(self.store, node) {
                self.pending = topology::references(self.store, node).into_iter();
            } else {
                self.stack.extend(topology::children(self.store, node));
            }
        }
    }
}

/// Lazy enumeration of internal (non-leaf) IndexNodes.
pub struct InternalNodesIter<'a, S: GraphStore> {
    store: &'a S,
    stack: Vec<NodeId>,
}

impl<'a, S: GraphStore> InternalNodesIter<'a, S> {
    pub fn new(store: &'a S, root: NodeId) -> Self {
        Self { store, stack: vec![root] }
    }
}

impl<'a, S: GraphStore> Iterator for InternalNodesIter<'a, S> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(node) = self.stack.pop() {
            if !topology::is_leaf(self.store, node) {
                self.stack.extend(topology::children(self.store, node));
                return Some(node);
            }
        }
        None
    }
}

/// `visit(visitor, startNode)`: the eager variant used by counting/warm-up.
/// Unlike [`SearchIter`] it unconditionally enumerates every reference of a
/// matching leaf, ignoring `geometry_matches`.
pub fn visit<S: GraphStore, F: SearchFilter>(
    store: &S,
    start: NodeId,
    filter: &F,
    mut on_geometry: impl FnMut(GeometryId),
) {
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        let bbox = match topology::envelope_of_node(store, node) {
            Some(b) => b,
            None => continue,
        };
        if !filter.needs_to_visit(&bbox) {
            continue;
        }
        if topology::is_leaf(store, node) {
            for g in topology::references(store, node) {
                on_geometry(g);
            }
        } else {
            stack.extend(topology::children(store, node));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RTreeConfig;
    use crate::insert;
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
    fn contains_point_filter_returns_only_matching_envelopes() {
        let store = MemoryStore::new();
        let (layer_root, metadata_node) = new_tree(&store);
        let envelopes = MapEnvelopeSource::new();
        let config = RTreeConfig { max_node_references: 4, ..RTreeConfig::default() };
        let monitor = NoopMonitor;

        let mut ids = Vec::new();
        for x in 0..5 {
            let env = Envelope::new(x as f64 - 0.5, -0.5, x as f64 + 0.5, 0.5);
            let g = envelopes.insert(&store, env);
            ids.push(g);
            insert::add(&store, &envelopes, &config, &monitor, layer_root, metadata_node, g).unwrap();
        }

        let root = topology::index_root(&store, layer_root).unwrap();
        let matches: Vec<GeometryId> =
            SearchIter::new(&store, root, ContainsPointFilter { x: 3.0, y: 0.0 }).collect();
        assert_eq!(matches, vec![ids[3]]);
    }

    #[test]
    fn search_iter_allows_early_termination_without_materializing() {
        let store = MemoryStore::new();
        let (layer_root, metadata_node) = new_tree(&store);
        let envelopes = MapEnvelopeSource::new();
        let config = RTreeConfig { max_node_references: 4, ..RTreeConfig::default() };
        let monitor = NoopMonitor;

        for x in 0..20 {
            let env = Envelope::new(x as f64, 0.0, x as f64 + 1.0, 1.0);
            let g = envelopes.insert(&store, env);
            insert::add(&store, &envelopes, &config, &monitor, layer_root, metadata_node, g).unwrap();
        }

        let root = topology::index_root(&store, layer_root).unwrap();
        let first_three: Vec<GeometryId> = SearchIter::new(&store, root, AllFilter).take(3).collect();
        assert_eq!(first_three.len(), 3);
    }
}
