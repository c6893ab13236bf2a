//! Bulk insertion (§4.6): rebuild-vs-clustered decision, partition-based
//! scratch/full builds, and seeded-clustering bulk insert.

use serin_rtree_store::{EdgeKind, GraphStore, NodeId};

use crate::config::RTreeConfig;
use crate::envelope::Envelope;
use crate::error::{RTreeError, Result};
use crate::insert;
use crate::metadata;
use crate::monitor::Monitor;
use crate::split;
use crate::topology;
use crate::{EnvelopeSource, GeometryId};

/// A geometry paired with the envelope it was decoded under, threaded
/// through the bulk loader without needing to re-query the decoder.
#[derive(Debug, Clone, Copy)]
pub struct Entry {
    pub geometry: GeometryId,
    pub envelope: Envelope,
}

/// `expectedHeight(lf, size)`: 1 if size is 1, else
/// `ceil(log(size) / log(floor(M·lf)))`. The base is clamped to at least 2 to
/// avoid a degenerate (zero or negative) logarithm when `M·lf` rounds down
/// to 0 or 1.
fn expected_height(loading_factor: f64, size: usize, max_node_references: u32) -> i64 {
    if size <= 1 {
        return 1;
    }
    let base = ((max_node_references as f64) * loading_factor).floor().max(2.0);
    (((size as f64).ln() / base.ln()).ceil()) as i64
}

/// Top-down overlap-minimizing partition (§4.6). Attaches the built subtree
/// directly under `root`, recursing until each slice fits within `target`.
pub fn partition<S: GraphStore, E: EnvelopeSource>(
    store: &S,
    envelopes: &E,
    config: &RTreeConfig,
    root: NodeId,
    mut entries: Vec<Entry>,
    depth: u32,
    loading_factor: f64,
) -> Result<()> {
    if entries.is_empty() {
        return Ok(());
    }
    let target = (((config.max_node_references as f64) * loading_factor).round() as usize).max(1);

    if depth % 2 == 0 {
        entries.sort_by(|a, b| a.envelope.min_x.partial_cmp(&b.envelope.min_x).unwrap());
    } else {
        entries.sort_by(|a, b| a.envelope.min_y.partial_cmp(&b.envelope.min_y).unwrap());
    }

    if entries.len() <= target {
        for entry in &entries {
            store.add_edge(root, EdgeKind::Reference, entry.geometry.0)?;
        }
        topology::tighten_path(store, envelopes, root)?;
        return Ok(());
    }

    // Expected height here is computed against `target` itself, not against
    // `expected_height`'s `floor(M*lf)` base (that one is for
    // `bulk_insertion`'s `h_i`/`l_t` comparison only). The wrong base can
    // make `s` exceed `entries.len()`, collapsing every slice back to the
    // full vector and recursing forever.
    let h = ((entries.len() as f64).ln() / (target as f64).max(2.0).ln()).ceil() as i64;
    let s = ((target as f64).powf((h - 1) as f64).round() as usize).max(1);
    let p = (entries.len() + s - 1) / s;
    let slice_size = ((entries.len() + p - 1) / p).max(1);

    for chunk in entries.chunks(slice_size) {
        let child = store.create_node();
        store.add_edge(root, EdgeKind::Child, child)?;
        partition(store, envelopes, config, child, chunk.to_vec(), depth + 1, loading_factor)?;
    }
    topology::tighten_path(store, envelopes, root)?;
    Ok(())
}

/// Build a standalone subtree (not yet attached to anything) from `entries`,
/// returning its fresh root node. Reuses [`partition`] — a scratch tree is
/// built exactly the way a full rebuild's tree is, just detached.
fn build_scratch_tree<S: GraphStore, E: EnvelopeSource>(
    store: &S,
    envelopes: &E,
    config: &RTreeConfig,
    entries: Vec<Entry>,
    loading_factor: f64,
) -> Result<NodeId> {
    let scratch_root = store.create_node();
    partition(store, envelopes, config, scratch_root, entries, 0, loading_factor)?;
    Ok(scratch_root)
}

fn collect_all_entries<S: GraphStore, E: EnvelopeSource>(
    store: &S,
    envelopes: &E,
    root: NodeId,
) -> Result<Vec<Entry>> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if topology::is_leaf(store, node) {
            for geometry in topology::references(store, node) {
                let envelope = topology::envelope_of_geometry(envelopes, geometry)?;
                out.push(Entry { geometry, envelope });
            }
        } else {
            stack.extend(topology::children(store, node));
        }
    }
    Ok(out)
}

fn collect_nodes_at_depth<S: GraphStore>(store: &S, start: NodeId, depth: i64) -> Vec<NodeId> {
    let mut frontier = vec![start];
    for _ in 0..depth {
        let mut next = Vec::new();
        for n in frontier {
            next.extend(topology::children(store, n));
        }
        frontier = next;
    }
    frontier
}

/// Delete every IndexNode reachable from `node` except `node` itself,
/// clearing its own outgoing edges and bbox too. Geometry records are left
/// untouched — only `REFERENCE`/`CHILD` edges and descendant IndexNodes go.
fn clear_subtree<S: GraphStore>(store: &S, node: NodeId) -> Result<()> {
    if topology::is_leaf(store, node) {
        for g in topology::references(store, node) {
            store.remove_edge(node, EdgeKind::Reference, g.0)?;
        }
    } else {
        for child in topology::children(store, node) {
            clear_subtree(store, child)?;
            store.remove_edge(node, EdgeKind::Child, child)?;
            store.delete_node(child)?;
        }
    }
    store.clear_bbox(node)?;
    Ok(())
}

fn full_rebuild<S: GraphStore, E: EnvelopeSource, M: Monitor>(
    store: &S,
    envelopes: &E,
    config: &RTreeConfig,
    monitor: &M,
    layer_root: NodeId,
    metadata_node: NodeId,
    new_entries: Vec<Entry>,
) -> Result<()> {
    let root = topology::index_root(store, layer_root)
        .ok_or_else(|| RTreeError::InvariantViolated("LayerRoot has no IndexRoot".to_string()))?;
    let mut all = collect_all_entries(store, envelopes, root)?;
    clear_subtree(store, root)?;
    all.extend(new_entries);
    let total = all.len() as u64;

    monitor.add_nbr_rebuilt();
    tracing::debug!(total, "bulk load: full rebuild");
    partition(store, envelopes, config, root, all, 0, config.loading_factor)?;
    metadata::write_total_geometry_count(store, metadata_node, total)?;
    Ok(())
}

/// Seeded-clustering bulk insert (§4.6). `subtree_root` is the local subtree
/// being clustered into (the IndexRoot on the top-level call); `root_height`
/// is its height. Returns the entries that matched no existing child
/// ("outliers"), for the caller to `add` individually.
fn bulk_insertion<S: GraphStore, E: EnvelopeSource, M: Monitor>(
    store: &S,
    envelopes: &E,
    config: &RTreeConfig,
    monitor: &M,
    layer_root: NodeId,
    subtree_root: NodeId,
    root_height: i64,
    entries: Vec<Entry>,
) -> Result<Vec<Entry>> {
    let mut children_with_env: Vec<(NodeId, Envelope)> = topology::children(store, subtree_root)
        .into_iter()
        .map(|c| (c, topology::envelope_of_node(store, c).unwrap_or_else(Envelope::empty_at_origin)))
        .collect();
    if children_with_env.is_empty() {
        return Ok(entries);
    }
    children_with_env.sort_by(|a, b| a.1.area().partial_cmp(&b.1.area()).unwrap());

    let mut clusters: Vec<Vec<Entry>> = vec![Vec::new(); children_with_env.len()];
    let mut outliers = Vec::new();
    'entries: for entry in entries {
        for (i, (_, env)) in children_with_env.iter().enumerate() {
            if env.contains(&entry.envelope) {
                clusters[i].push(entry);
                continue 'entries;
            }
        }
        outliers.push(entry);
    }

    let lf = config.loading_factor;
    let l_t = root_height - 2;

    for (i, (child, _)) in children_with_env.iter().enumerate() {
        let cluster = std::mem::take(&mut clusters[i]);
        if cluster.is_empty() {
            continue;
        }
        let h_i = expected_height(lf, cluster.len(), config.max_node_references);
        if h_i - l_t > 1 {
            return Err(RTreeError::InvariantViolated(format!(
                "bulk insertion: h_i({h_i}) - l_t({l_t}) > 1"
            )));
        }

        tracing::debug!(child = ?child, cluster_len = cluster.len(), h_i, l_t, "seeded cluster");

        if h_i < l_t {
            monitor.add_case("cluster-recurse");
            let sub_outliers = bulk_insertion(
                store, envelopes, config, monitor, layer_root, *child, root_height - 1, cluster,
            )?;
            outliers.extend(sub_outliers);
        } else if h_i == l_t && (cluster.len() as f64) < (config.max_node_references as f64 * lf) / 2.0 {
            // Small cluster: per §9, reinsert at the parent of `c` (i.e. at
            // `subtree_root`, not `child`) to reduce local overlap.
            monitor.add_case("cluster-small-reinsert");
            for entry in cluster {
                insert::insert_entry_from(
                    store, envelopes, config, monitor, layer_root, subtree_root, entry.geometry,
                    &entry.envelope,
                )?;
            }
        } else if h_i == l_t {
            monitor.add_case("cluster-large-attach");
            let scratch = build_scratch_tree(store, envelopes, config, cluster, lf)?;
            store.add_edge(*child, EdgeKind::Child, scratch)?;
            topology::retighten(store, envelopes, scratch)?;
            if topology::children(store, *child).len() as u32 > config.max_node_references {
                split::split_and_adjust_path(store, envelopes, config, monitor, layer_root, *child)?;
            } else {
                topology::tighten_path(store, envelopes, *child)?;
            }
        } else {
            monitor.add_case("cluster-graft");
            let scratch = build_scratch_tree(store, envelopes, config, cluster, lf)?;
            let scratch_height = topology::height(store, scratch) as i64;
            if scratch_height == 1 {
                if !topology::is_leaf(store, *child) {
                    return Err(RTreeError::InvariantViolated(
                        "cluster-graft: cannot attach REFERENCE edges to an internal child".to_string(),
                    ));
                }
                for g in topology::references(store, scratch) {
                    store.remove_edge(scratch, EdgeKind::Reference, g.0)?;
                    store.add_edge(*child, EdgeKind::Reference, g.0)?;
                }
            } else {
                if topology::is_leaf(store, *child) {
                    return Err(RTreeError::InvariantViolated(
                        "cluster-graft: cannot attach CHILD edges to a leaf child".to_string(),
                    ));
                }
                let depth = scratch_height - l_t;
                for grafted in collect_nodes_at_depth(store, scratch, depth.max(0)) {
                    if let Some(p) = topology::parent(store, grafted) {
                        store.remove_edge(p, EdgeKind::Child, grafted)?;
                    }
                    store.add_edge(*child, EdgeKind::Child, grafted)?;
                }
            }
            clear_subtree(store, scratch)?;
            store.delete_node(scratch)?;

            let overflowed = topology::children(store, *child).len() as u32 > config.max_node_references
                || topology::references(store, *child).len() as u32 > config.max_node_references;
            if overflowed {
                split::split_and_adjust_path(store, envelopes, config, monitor, layer_root, *child)?;
            } else {
                topology::tighten_path(store, envelopes, *child)?;
            }
        }
    }

    Ok(outliers)
}

/// `add(list)`: the Writer API's bulk insert. Chooses full rebuild vs seeded
/// clustering based on `k > 0.4 * totalGeometryCount`.
pub fn add_bulk<S: GraphStore, E: EnvelopeSource, M: Monitor>(
    store: &S,
    envelopes: &E,
    config: &RTreeConfig,
    monitor: &M,
    layer_root: NodeId,
    metadata_node: NodeId,
    geometries: Vec<GeometryId>,
) -> Result<()> {
    let k = geometries.len();
    if k == 0 {
        return Ok(());
    }
    let t = metadata::read_total_geometry_count(store, metadata_node);
    let entries: Vec<Entry> = geometries
        .into_iter()
        .map(|geometry| {
            let envelope = topology::envelope_of_geometry(envelopes, geometry)?;
            Ok(Entry { geometry, envelope })
        })
        .collect::<Result<Vec<_>>>()?;

    if (k as f64) > 0.4 * (t as f64) {
        monitor.add_case("rebuild");
        full_rebuild(store, envelopes, config, monitor, layer_root, metadata_node, entries)?;
        return Ok(());
    }

    monitor.add_case("clustered");
    let root = topology::index_root(store, layer_root)
        .ok_or_else(|| RTreeError::InvariantViolated("LayerRoot has no IndexRoot".to_string()))?;
    let root_height = topology::height(store, root) as i64;
    let outliers = bulk_insertion(store, envelopes, config, monitor, layer_root, root, root_height, entries)?;

    let base = t + (k as u64 - outliers.len() as u64);
    metadata::write_total_geometry_count(store, metadata_node, base)?;
    for outlier in outliers {
        insert::add(store, envelopes, config, monitor, layer_root, metadata_node, outlier.geometry)?;
    }
    Ok(())
}
