//! Persistent R-tree spatial index over an external graph-structured store.
//!
//! [`RTreeIndex`] is the public facade tying the tree-maintenance algorithms
//! (insertion, splitting, bulk loading, deletion, search) together behind
//! the Writer/Reader API. It never touches a concrete storage engine —
//! everything it does goes through [`serin_rtree_store::GraphStore`] and the
//! caller-supplied [`EnvelopeSource`] decoder.
#![deny(missing_docs)]

pub mod bulk;
pub mod config;
pub mod delete;
pub mod envelope;
pub mod error;
pub mod insert;
pub mod metadata;
pub mod monitor;
pub mod progress;
pub mod search;
pub mod split;
pub mod topology;

#[cfg(test)]
mod test_support;

pub use config::{RTreeConfig, SplitMode};
pub use envelope::{Axis, Envelope};
pub use error::{RTreeError, Result};
pub use monitor::{CountingMonitor, Monitor, NoopMonitor};
pub use progress::{NoopProgress, ProgressListener, RecordingProgress};
pub use search::{AllFilter, ContainsPointFilter, IntersectsFilter, SearchFilter};

use serin_rtree_store::{EdgeKind, GraphStore, NodeId};

/// Stable identifier of a Geometry record — a node in the same graph store
/// as IndexNodes, but never itself treated as one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(pub NodeId);

/// The envelope decoder (§1 Out of scope): an external collaborator that
/// maps a geometry id to the bounding box the index should file it under.
/// The core never inspects geometry payloads itself.
pub trait EnvelopeSource {
    /// The envelope to index `geometry` under, or `None` if the id does not
    /// resolve to a geometry record at all.
    fn envelope_of(&self, geometry: GeometryId) -> Option<Envelope>;
}

/// Which kind of thing a `CHILD`/`REFERENCE` edge's endpoint is, replacing
/// string comparisons on edge-kind names at call sites that need to
/// distinguish the two (§9 design note).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    /// An internal child subtree.
    Subtree(NodeId),
    /// A leaf reference to a Geometry record.
    Reference(GeometryId),
}

/// The R-tree spatial index over graph store `S`, with geometry envelopes
/// supplied by `E`.
///
/// `S` and `E` are both borrowed for the lifetime of every operation rather
/// than behind `Arc`/locks at this layer: the store itself owns whatever
/// interior mutability it needs (see [`serin_rtree_store::memory::MemoryStore`]),
/// matching the single-writer concurrency model of §5.
pub struct RTreeIndex<S: GraphStore, E: EnvelopeSource> {
    store: S,
    envelopes: E,
    layer_root: NodeId,
    metadata_node: NodeId,
    config: RTreeConfig,
    monitor: Box<dyn Monitor>,
}

impl<S: GraphStore, E: EnvelopeSource> RTreeIndex<S, E> {
    /// Open (or initialize) an index anchored at `layer_root`. Creates the
    /// IndexRoot and Metadata nodes and links them via `ROOT`/`METADATA`
    /// edges if this is the first use of `layer_root`.
    pub fn open(store: S, envelopes: E, layer_root: NodeId, config: RTreeConfig) -> Result<Self> {
        config.validate()?;

        let metadata_node = match store.edges_out(layer_root, EdgeKind::Metadata).into_iter().next() {
            Some(m) => m,
            None => {
                let m = store.create_node();
                metadata::write_max_node_references(&store, m, config.max_node_references)?;
                metadata::write_total_geometry_count(&store, m, 0)?;
                store.add_edge(layer_root, EdgeKind::Metadata, m)?;
                m
            }
        };

        if topology::index_root(&store, layer_root).is_none() {
            let root = store.create_node();
            store.add_edge(layer_root, EdgeKind::Root, root)?;
        }

        Ok(Self {
            store,
            envelopes,
            layer_root,
            metadata_node,
            config,
            monitor: Box::new(NoopMonitor),
        })
    }

    /// Install an instrumentation sink. Replaces any previously installed
    /// monitor; the default is a no-op.
    pub fn add_monitor<M: Monitor + 'static>(&mut self, monitor: M) {
        self.monitor = Box::new(monitor);
    }

    /// `configure({key: value})`. Unknown keys and unknown values for known
    /// keys both fail with [`RTreeError::InvalidArgument`].
    pub fn configure(&mut self, key: &str, value: &str) -> Result<()> {
        self.config.configure(key, value)
    }

    /// The active configuration.
    pub fn config(&self) -> &RTreeConfig {
        &self.config
    }

    /// `add(geometry)`: single-record insertion.
    pub fn add(&self, geometry: GeometryId) -> Result<()> {
        let _span = tracing::info_span!("rtree.add", geometry = ?geometry).entered();
        let envelopes = &self.envelopes;
        let config = &self.config;
        let monitor = &self.monitor;
        let layer_root = self.layer_root;
        let metadata_node = self.metadata_node;
        self.store
            .transaction(move |store| insert::add(store, envelopes, config, monitor, layer_root, metadata_node, geometry))
    }

    /// `add(list)`: bulk insertion, choosing between full rebuild and
    /// seeded clustering based on batch size relative to the current count.
    pub fn add_bulk(&self, geometries: Vec<GeometryId>) -> Result<()> {
        let _span = tracing::info_span!("rtree.add_bulk", count = geometries.len()).entered();
        let envelopes = &self.envelopes;
        let config = &self.config;
        let monitor = &self.monitor;
        let layer_root = self.layer_root;
        let metadata_node = self.metadata_node;
        self.store.transaction(move |store| {
            bulk::add_bulk(store, envelopes, config, monitor, layer_root, metadata_node, geometries)
        })
    }

    /// `remove(geomId, deleteGeom)`: non-strict removal (missing/foreign ids
    /// are swallowed silently).
    pub fn remove(&self, geometry: GeometryId, delete_record: bool) -> Result<()> {
        self.remove_strict(geometry, delete_record, false)
    }

    /// `remove(geomId, deleteGeom, strict)`.
    pub fn remove_strict(&self, geometry: GeometryId, delete_record: bool, strict: bool) -> Result<()> {
        let _span = tracing::info_span!("rtree.remove", geometry = ?geometry, strict).entered();
        let envelopes = &self.envelopes;
        let layer_root = self.layer_root;
        let metadata_node = self.metadata_node;
        self.store.transaction(move |store| {
            delete::remove(store, envelopes, layer_root, metadata_node, geometry, delete_record, strict)
        })
    }

    /// `removeAll(deleteGeoms, progress)`.
    pub fn remove_all<P: ProgressListener>(&self, delete_records: bool, progress: &P) -> Result<()> {
        let _span = tracing::info_span!("rtree.remove_all", delete_records).entered();
        let envelopes = &self.envelopes;
        let layer_root = self.layer_root;
        let metadata_node = self.metadata_node;
        self.store.transaction(move |store| {
            delete::remove_all(store, envelopes, layer_root, metadata_node, delete_records, progress)
        })
    }

    /// `clear(progress)`: `removeAll(false, ...)` then reinitialize
    /// IndexRoot and Metadata. Idempotent.
    pub fn clear<P: ProgressListener>(&mut self, progress: &P) -> Result<()> {
        let _span = tracing::info_span!("rtree.clear").entered();
        let envelopes = &self.envelopes;
        let max_node_references = self.config.max_node_references;
        let layer_root = self.layer_root;
        let metadata_node = self.metadata_node;
        let new_metadata = self.store.transaction(move |store| {
            delete::clear(store, envelopes, max_node_references, layer_root, metadata_node, progress)
        })?;
        self.metadata_node = new_metadata;
        Ok(())
    }

    /// `getBoundingBox()`: envelope of IndexRoot, or the `(0,0,0,0)`
    /// sentinel if the tree is empty.
    pub fn get_bounding_box(&self) -> Envelope {
        let layer_root = self.layer_root;
        self.store
            .transaction(move |store| -> std::result::Result<Envelope, std::convert::Infallible> {
                Ok(topology::index_root(store, layer_root)
                    .and_then(|root| topology::envelope_of_node(store, root))
                    .unwrap_or_else(Envelope::empty_at_origin))
            })
            .unwrap()
    }

    /// `count()`: the recorded `totalGeometryCount`, defensively recomputed
    /// (and persisted if nonzero) when the recorded value is zero but the
    /// tree is not (§5).
    pub fn count(&self) -> u64 {
        let recorded = metadata::read_total_geometry_count(&self.store, self.metadata_node);
        if recorded != 0 {
            return recorded;
        }
        match topology::index_root(&self.store, self.layer_root) {
            Some(root) => {
                let actual = delete::count_geometries(&self.store, root);
                if actual != 0 {
                    let _ = metadata::write_total_geometry_count(&self.store, self.metadata_node, actual);
                }
                actual
            }
            None => 0,
        }
    }

    /// `isEmpty()`: true iff IndexRoot has no `bbox` property.
    pub fn is_empty(&self) -> bool {
        match topology::index_root(&self.store, self.layer_root) {
            Some(root) => self.store.get_bbox(root).is_none(),
            None => true,
        }
    }

    /// `isNodeIndexed(geomId)`: true iff `geometry` is referenced by a leaf
    /// whose root is this tree's IndexRoot.
    pub fn is_node_indexed(&self, geometry: GeometryId) -> bool {
        let layer_root = self.layer_root;
        self.store
            .transaction(move |store| -> std::result::Result<bool, std::convert::Infallible> {
                let leaf = match store.edges_in(geometry.0, EdgeKind::Reference).into_iter().next() {
                    Some(l) => l,
                    None => return Ok(false),
                };
                let mut cursor = leaf;
                while let Some(p) = topology::parent(store, cursor) {
                    cursor = p;
                }
                Ok(Some(cursor) == topology::index_root(store, layer_root))
            })
            .unwrap()
    }

    /// `getAllIndexedNodes()`: lazy enumeration of every indexed geometry.
    pub fn get_all_indexed_nodes(&self) -> Box<dyn Iterator<Item = GeometryId> + '_> {
        match topology::index_root(&self.store, self.layer_root) {
            Some(root) => Box::new(search::SearchIter::new(&self.store, root, AllFilter)),
            None => Box::new(std::iter::empty()),
        }
    }

    /// `getAllIndexInternalNodes()`: lazy enumeration of internal IndexNodes.
    pub fn get_all_index_internal_nodes(&self) -> Box<dyn Iterator<Item = NodeId> + '_> {
        match topology::index_root(&self.store, self.layer_root) {
            Some(root) => Box::new(search::InternalNodesIter::new(&self.store, root)),
            None => Box::new(std::iter::empty()),
        }
    }

    /// `searchIndex(filter)`: lazy, pruned geometry sequence.
    pub fn search_index<F: SearchFilter + 'static>(&self, filter: F) -> Box<dyn Iterator<Item = GeometryId> + '_> {
        match topology::index_root(&self.store, self.layer_root) {
            Some(root) => Box::new(search::SearchIter::new(&self.store, root, filter)),
            None => Box::new(std::iter::empty()),
        }
    }

    /// `warmUp()`: full traversal with a no-op visitor, to page the tree in.
    pub fn warm_up(&self) {
        if let Some(root) = topology::index_root(&self.store, self.layer_root) {
            search::visit(&self.store, root, &AllFilter, |_| {});
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MapEnvelopeSource;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use serin_rtree_store::memory::MemoryStore;

    fn open_index(max_node_references: u32) -> RTreeIndex<MemoryStore, MapEnvelopeSource> {
        let store = MemoryStore::new();
        let layer_root = store.create_node();
        let config = RTreeConfig { max_node_references, ..RTreeConfig::default() };
        RTreeIndex::open(store, MapEnvelopeSource::new(), layer_root, config).unwrap()
    }

    // E1: Empty tree, M=4. Insert unit squares at (0,0)..(4,0). After the
    // 5th insert, IndexRoot has 2 CHILD nodes; every leaf has <= 4
    // references; count()==5; an intersects-query over [(2.5,-0.5),(3.5,0.5)]
    // returns exactly the geometries at (2,0) and (3,0).
    #[test]
    fn e1_lattice_insert_and_range_query() {
        let index = open_index(4);
        let mut ids = Vec::new();
        for x in 0..5 {
            let env = Envelope::new(x as f64 - 0.5, -0.5, x as f64 + 0.5, 0.5);
            let g = index.envelopes.insert(&index.store, env);
            index.add(g).unwrap();
            ids.push(g);
        }

        assert_eq!(index.count(), 5);
        let root = topology::index_root(&index.store, index.layer_root).unwrap();
        assert_eq!(topology::children(&index.store, root).len(), 2);
        for leaf in topology::children(&index.store, root) {
            assert!(topology::references(&index.store, leaf).len() <= 4);
        }

        let query = Envelope::new(2.5, -0.5, 3.5, 0.5);
        let mut hits: Vec<GeometryId> = index.search_index(IntersectsFilter(query)).collect();
        hits.sort_by_key(|g| g.0 .0);
        let mut expected = vec![ids[2], ids[3]];
        expected.sort_by_key(|g| g.0 .0);
        assert_eq!(hits, expected);
    }

    // E4: remove every reference from a leaf one at a time; the leaf
    // disappears on the last removal, its parent re-tightens (or also
    // disappears if it becomes empty); IndexRoot is never deleted, only
    // loses its bbox when the whole tree empties out.
    #[test]
    fn e4_deleting_a_leaf_dry_prunes_upward() {
        let index = open_index(4);
        let g = index.envelopes.insert(&index.store, Envelope::new(0.0, 0.0, 1.0, 1.0));
        index.add(g).unwrap();
        assert!(!index.is_empty());

        index.remove(g, false).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.count(), 0);
        let root = topology::index_root(&index.store, index.layer_root).unwrap();
        assert!(index.store.node_exists(root));
    }

    // E5: mix 200 inserts and 50 removes; count() == 150 and
    // getAllIndexedNodes() enumerates exactly the 150 survivors.
    #[test]
    fn e5_mixed_insert_remove_matches_count_and_enumeration() {
        let index = open_index(8);
        let mut rng = StdRng::seed_from_u64(7);
        let mut live = Vec::new();
        for _ in 0..200 {
            let x: f64 = rng.gen_range(0.0..100.0);
            let y: f64 = rng.gen_range(0.0..100.0);
            let env = Envelope::new(x, y, x + 1.0, y + 1.0);
            let g = index.envelopes.insert(&index.store, env);
            index.add(g).unwrap();
            live.push(g);
        }
        for _ in 0..50 {
            let idx = rng.gen_range(0..live.len());
            let g = live.swap_remove(idx);
            index.remove(g, false).unwrap();
        }

        assert_eq!(index.count(), 150);
        let mut enumerated: Vec<GeometryId> = index.get_all_indexed_nodes().collect();
        enumerated.sort_by_key(|g| g.0 .0);
        let mut expected = live.clone();
        expected.sort_by_key(|g| g.0 .0);
        assert_eq!(enumerated, expected);
    }

    // E6: inserting a batch of 0.5*t into a tree of size t triggers a full
    // rebuild (observed once via the monitor); the resulting tree still
    // satisfies balance and bbox tightness.
    #[test]
    fn e6_large_batch_triggers_rebuild_and_stays_balanced() {
        let mut index = open_index(4);
        let monitor = CountingMonitor::default();
        // add_monitor takes &mut self; do it before any add() call borrows it.
        index.add_monitor(monitor);

        let mut rng = StdRng::seed_from_u64(11);
        let mut seed_geoms = Vec::new();
        for _ in 0..20 {
            let x: f64 = rng.gen_range(0.0..50.0);
            let env = Envelope::new(x, x, x + 1.0, x + 1.0);
            seed_geoms.push(index.envelopes.insert(&index.store, env));
        }
        index.add_bulk(seed_geoms).unwrap();
        assert_eq!(index.count(), 20);

        let mut batch = Vec::new();
        for _ in 0..10 {
            let x: f64 = rng.gen_range(0.0..50.0);
            let env = Envelope::new(x, x, x + 1.0, x + 1.0);
            batch.push(index.envelopes.insert(&index.store, env));
        }
        index.add_bulk(batch).unwrap();
        assert_eq!(index.count(), 30);

        // Balance: every root-to-leaf path below IndexRoot has equal length.
        let root = topology::index_root(&index.store, index.layer_root).unwrap();
        fn leaf_depths<S: GraphStore>(store: &S, node: NodeId, depth: u32, out: &mut Vec<u32>) {
            if topology::is_leaf(store, node) {
                out.push(depth);
            } else {
                for c in topology::children(store, node) {
                    leaf_depths(store, c, depth + 1, out);
                }
            }
        }
        let mut depths = Vec::new();
        leaf_depths(&index.store, root, 0, &mut depths);
        assert!(depths.iter().all(|&d| d == depths[0]));
    }

    #[test]
    fn clear_then_clear_is_idempotent() {
        let mut index = open_index(4);
        let g = index.envelopes.insert(&index.store, Envelope::new(0.0, 0.0, 1.0, 1.0));
        index.add(g).unwrap();

        index.clear(&NoopProgress).unwrap();
        index.clear(&NoopProgress).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.count(), 0);
    }

    #[test]
    fn configure_rejects_unknown_split_mode() {
        let mut index = open_index(4);
        assert!(index.configure("splitMode", "rstar").is_err());
        assert!(index.configure("splitMode", "greene").is_ok());
    }
}
