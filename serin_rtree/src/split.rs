//! Quadratic and Greene's split strategies (§4.5), plus the cascade that
//! propagates an overflow split up toward the IndexRoot.

use serin_rtree_store::{EdgeKind, GraphStore, NodeId};

use crate::config::{RTreeConfig, SplitMode};
use crate::envelope::{Axis, Envelope};
use crate::error::{RTreeError, Result};
use crate::monitor::Monitor;
use crate::topology;
use crate::{ChildKind, EnvelopeSource};

type Entry = (ChildKind, Envelope);

/// Enumerate all pairs, pick the one with maximum separation between
/// envelopes; ties broken by first encountered.
fn pick_seeds(entries: &[Entry]) -> (usize, usize) {
    let mut best = (0usize, 1usize, f64::MIN);
    for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            let sep = entries[i].1.separation(&entries[j].1);
            if sep > best.2 {
                best = (i, j, sep);
            }
        }
    }
    (best.0, best.1)
}

/// Guttman's quadratic split: assign each remaining entry to the group with
/// smaller expansion, breaking ties by smaller current group area, then by
/// first encountered.
fn quadratic_groups(entries: &[Entry]) -> (Vec<Entry>, Vec<Entry>) {
    let (si, sj) = pick_seeds(entries);
    let mut g1 = vec![entries[si].clone()];
    let mut g2 = vec![entries[sj].clone()];
    let mut e1 = entries[si].1;
    let mut e2 = entries[sj].1;

    for (idx, entry) in entries.iter().enumerate() {
        if idx == si || idx == sj {
            continue;
        }
        let expansion1 = e1.union(&entry.1).area() - e1.area();
        let expansion2 = e2.union(&entry.1).area() - e2.area();
        let assign_to_1 = if expansion1 != expansion2 {
            expansion1 < expansion2
        } else if e1.area() != e2.area() {
            e1.area() < e2.area()
        } else {
            true
        };
        if assign_to_1 {
            e1.expand_to_include(&entry.1);
            g1.push(entry.clone());
        } else {
            e2.expand_to_include(&entry.1);
            g2.push(entry.clone());
        }
    }
    (g1, g2)
}

/// Greene's split: pick the seed pair, choose whichever axis separates the
/// seeds further (computing both per-dimension separations up front so the
/// choice can never be an artifact of loop order — §9), sort by center along
/// that axis, and split the sorted sequence in half.
fn greene_groups(entries: &[Entry]) -> (Vec<Entry>, Vec<Entry>) {
    let (si, sj) = pick_seeds(entries);
    let e1 = entries[si].1;
    let e2 = entries[sj].1;
    let sep_x = e1.separation_along(&e2, Axis::X);
    let sep_y = e1.separation_along(&e2, Axis::Y);
    let axis = if sep_y > sep_x { Axis::Y } else { Axis::X };

    let mut sorted: Vec<Entry> = entries.to_vec();
    sorted.sort_by(|a, b| a.1.centre(axis).partial_cmp(&b.1.centre(axis)).unwrap());
    let mid = sorted.len() / 2;
    let g2 = sorted.split_off(mid);
    (sorted, g2)
}

/// Split `entries` into one or more groups, each within `max_node_references`,
/// by re-splitting any group that is still over the ceiling after the first
/// bipartition (neither strategy guarantees balanced group sizes — §4.5).
fn split_into_groups(entries: Vec<Entry>, config: &RTreeConfig) -> Vec<Vec<Entry>> {
    let (g1, g2) = match config.split_mode {
        SplitMode::Quadratic => quadratic_groups(&entries),
        SplitMode::Greene => greene_groups(&entries),
    };
    let mut out = Vec::new();
    out.extend(fix_group(g1, config));
    out.extend(fix_group(g2, config));
    out
}

fn fix_group(group: Vec<Entry>, config: &RTreeConfig) -> Vec<Vec<Entry>> {
    if group.len() as u32 <= config.max_node_references {
        vec![group]
    } else {
        split_into_groups(group, config)
    }
}

fn gather_entries<S: GraphStore, E: EnvelopeSource>(
    store: &S,
    envelopes: &E,
    node: NodeId,
    leaf: bool,
) -> Result<Vec<Entry>> {
    if leaf {
        topology::references(store, node)
            .into_iter()
            .map(|g| Ok((ChildKind::Reference(g), topology::envelope_of_geometry(envelopes, g)?)))
            .collect()
    } else {
        topology::children(store, node)
            .into_iter()
            .map(|c| {
                let env = topology::envelope_of_node(store, c).ok_or_else(|| {
                    RTreeError::InvariantViolated("child missing bbox during split".to_string())
                })?;
                Ok((ChildKind::Subtree(c), env))
            })
            .collect()
    }
}

fn attach_group<S: GraphStore>(store: &S, target: NodeId, group: &[Entry], leaf: bool) -> Result<()> {
    for (kind, _) in group {
        match (kind, leaf) {
            (ChildKind::Reference(g), true) => store.add_edge(target, EdgeKind::Reference, g.0)?,
            (ChildKind::Subtree(c), false) => store.add_edge(target, EdgeKind::Child, *c)?,
            _ => unreachable!("a split group never mixes reference and subtree entries"),
        }
    }
    Ok(())
}

/// Split `node`'s children/references in place, keeping the first group on
/// `node` itself and materializing the rest as fresh sibling nodes. Returns
/// the created siblings (usually one, more only if re-splitting was needed
/// to respect the ceiling).
fn perform_split<S: GraphStore, E: EnvelopeSource, M: Monitor>(
    store: &S,
    envelopes: &E,
    config: &RTreeConfig,
    monitor: &M,
    node: NodeId,
) -> Result<Vec<NodeId>> {
    let leaf = topology::is_leaf(store, node);
    let entries = gather_entries(store, envelopes, node, leaf)?;

    if leaf {
        for (kind, _) in &entries {
            if let ChildKind::Reference(g) = kind {
                store.remove_edge(node, EdgeKind::Reference, g.0)?;
            }
        }
    } else {
        for (kind, _) in &entries {
            if let ChildKind::Subtree(c) = kind {
                store.remove_edge(node, EdgeKind::Child, *c)?;
            }
        }
    }
    store.clear_bbox(node)?;

    let mut groups = split_into_groups(entries, config).into_iter();
    let first = groups.next().expect("a split always yields at least one group");
    attach_group(store, node, &first, leaf)?;
    topology::retighten(store, envelopes, node)?;

    let mut siblings = Vec::new();
    for group in groups {
        let sibling = store.create_node();
        attach_group(store, sibling, &group, leaf)?;
        topology::retighten(store, envelopes, sibling)?;
        siblings.push(sibling);
    }

    monitor.add_split();
    tracing::debug!(
        mode = ?config.split_mode,
        node = ?node,
        sibling_count = siblings.len(),
        "rtree split"
    );
    Ok(siblings)
}

/// `splitAndAdjustPathBoundingBox(n)`: run the configured splitter on `n`,
/// then propagate. If `n` was the IndexRoot, a fresh IndexRoot is created
/// above `n` and its siblings and `layer_root`'s `ROOT` edge is relinked.
/// Otherwise the parent's bbox is expanded, the siblings attached as
/// additional `CHILD`s, and the parent is recursively split if it now
/// overflows; else the path is tightened upward.
pub fn split_and_adjust_path<S: GraphStore, E: EnvelopeSource, M: Monitor>(
    store: &S,
    envelopes: &E,
    config: &RTreeConfig,
    monitor: &M,
    layer_root: NodeId,
    node: NodeId,
) -> Result<()> {
    let mut current = node;
    loop {
        let parent = topology::parent(store, current);
        let siblings = perform_split(store, envelopes, config, monitor, current)?;

        match parent {
            None => {
                let new_root = store.create_node();
                store.add_edge(new_root, EdgeKind::Child, current)?;
                for &sibling in &siblings {
                    store.add_edge(new_root, EdgeKind::Child, sibling)?;
                }
                topology::retighten(store, envelopes, new_root)?;

                if let Some(old_root) = topology::index_root(store, layer_root) {
                    let _ = store.remove_edge(layer_root, EdgeKind::Root, old_root);
                }
                store.add_edge(layer_root, EdgeKind::Root, new_root)?;
                return Ok(());
            }
            Some(parent_node) => {
                for &sibling in &siblings {
                    store.add_edge(parent_node, EdgeKind::Child, sibling)?;
                }
                topology::retighten(store, envelopes, current)?;
                for &sibling in &siblings {
                    topology::retighten(store, envelopes, sibling)?;
                }
                topology::retighten(store, envelopes, parent_node)?;

                if topology::children(store, parent_node).len() as u32 > config.max_node_references {
                    current = parent_node;
                    continue;
                }
                topology::tighten_path(store, envelopes, parent_node)?;
                return Ok(());
            }
        }
    }
}
