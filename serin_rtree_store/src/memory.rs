//! In-memory reference implementation of [`crate::GraphStore`].
//!
//! Grounded in the teacher's `serin_graph::Graph` adjacency-list model and
//! `serin_storage::engine::MockStorage`: a `Mutex`-guarded map of nodes, each
//! carrying its own typed out/in adjacency so lookups by edge kind stay O(1)
//! amortized instead of scanning a flat edge list.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::{EdgeKind, GraphStore, NodeId, Result, StoreError};

#[derive(Default)]
struct StoredNode {
    bbox: Option<[f64; 4]>,
    max_node_references: Option<u32>,
    total_geometry_count: Option<u64>,
    out_edges: HashMap<EdgeKind, Vec<NodeId>>,
    in_edges: HashMap<EdgeKind, Vec<NodeId>>,
}

struct Inner {
    nodes: HashMap<NodeId, StoredNode>,
    next_id: u64,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
            // 0 is reserved so callers can use NodeId(0) as a sentinel "no node" value.
            next_id: 1,
        }
    }
}

/// Single-process, in-memory [`GraphStore`]. Not durable; intended for tests
/// and for embedders that do not yet have a real graph store behind the
/// index.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl GraphStore for MemoryStore {
    fn create_node(&self) -> NodeId {
        let mut inner = self.inner.lock().unwrap();
        let id = NodeId(inner.next_id);
        inner.next_id += 1;
        inner.nodes.insert(id, StoredNode::default());
        id
    }

    fn delete_node(&self, node: NodeId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let removed = inner
            .nodes
            .remove(&node)
            .ok_or(StoreError::NodeNotFound(node))?;
        for (kind, targets) in removed.out_edges {
            for target in targets {
                if let Some(target_node) = inner.nodes.get_mut(&target) {
                    if let Some(sources) = target_node.in_edges.get_mut(&kind) {
                        sources.retain(|&s| s != node);
                    }
                }
            }
        }
        for (kind, sources) in removed.in_edges {
            for source in sources {
                if let Some(source_node) = inner.nodes.get_mut(&source) {
                    if let Some(targets) = source_node.out_edges.get_mut(&kind) {
                        targets.retain(|&t| t != node);
                    }
                }
            }
        }
        Ok(())
    }

    fn add_edge(&self, from: NodeId, kind: EdgeKind, to: NodeId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.nodes.contains_key(&to) {
            return Err(StoreError::NodeNotFound(to));
        }
        inner
            .nodes
            .get_mut(&from)
            .ok_or(StoreError::NodeNotFound(from))?
            .out_edges
            .entry(kind)
            .or_default()
            .push(to);
        inner
            .nodes
            .get_mut(&to)
            .unwrap()
            .in_edges
            .entry(kind)
            .or_default()
            .push(from);
        Ok(())
    }

    fn remove_edge(&self, from: NodeId, kind: EdgeKind, to: NodeId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let from_node = inner
            .nodes
            .get_mut(&from)
            .ok_or(StoreError::NodeNotFound(from))?;
        let out = from_node.out_edges.entry(kind).or_default();
        let before = out.len();
        out.retain(|&t| t != to);
        if out.len() == before {
            return Err(StoreError::EdgeNotFound { from, kind, to });
        }
        if let Some(to_node) = inner.nodes.get_mut(&to) {
            if let Some(sources) = to_node.in_edges.get_mut(&kind) {
                sources.retain(|&s| s != from);
            }
        }
        Ok(())
    }

    fn edges_out(&self, node: NodeId, kind: EdgeKind) -> Vec<NodeId> {
        let inner = self.inner.lock().unwrap();
        inner
            .nodes
            .get(&node)
            .and_then(|n| n.out_edges.get(&kind))
            .cloned()
            .unwrap_or_default()
    }

    fn edges_in(&self, node: NodeId, kind: EdgeKind) -> Vec<NodeId> {
        let inner = self.inner.lock().unwrap();
        inner
            .nodes
            .get(&node)
            .and_then(|n| n.in_edges.get(&kind))
            .cloned()
            .unwrap_or_default()
    }

    fn node_exists(&self, node: NodeId) -> bool {
        self.inner.lock().unwrap().nodes.contains_key(&node)
    }

    fn get_bbox(&self, node: NodeId) -> Option<[f64; 4]> {
        self.inner.lock().unwrap().nodes.get(&node)?.bbox
    }

    fn set_bbox(&self, node: NodeId, bbox: [f64; 4]) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .nodes
            .get_mut(&node)
            .ok_or(StoreError::NodeNotFound(node))?
            .bbox = Some(bbox);
        Ok(())
    }

    fn clear_bbox(&self, node: NodeId) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .nodes
            .get_mut(&node)
            .ok_or(StoreError::NodeNotFound(node))?
            .bbox = None;
        Ok(())
    }

    fn get_max_node_references(&self, node: NodeId) -> Option<u32> {
        self.inner
            .lock()
            .unwrap()
            .nodes
            .get(&node)?
            .max_node_references
    }

    fn set_max_node_references(&self, node: NodeId, value: u32) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .nodes
            .get_mut(&node)
            .ok_or(StoreError::NodeNotFound(node))?
            .max_node_references = Some(value);
        Ok(())
    }

    fn get_total_geometry_count(&self, node: NodeId) -> Option<u64> {
        self.inner
            .lock()
            .unwrap()
            .nodes
            .get(&node)?
            .total_geometry_count
    }

    fn set_total_geometry_count(&self, node: NodeId, value: u64) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .nodes
            .get_mut(&node)
            .ok_or(StoreError::NodeNotFound(node))?
            .total_geometry_count = Some(value);
        Ok(())
    }

    fn transaction<F, R, E>(&self, f: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&Self) -> std::result::Result<R, E>,
    {
        tracing::trace!("store transaction scope begin");
        let result = f(self);
        tracing::trace!(ok = result.is_ok(), "store transaction scope end");
        result
    }
}
