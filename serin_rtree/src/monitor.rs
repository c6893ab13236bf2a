//! Instrumentation capability injected into the index, never globally
//! registered. Default implementation is a no-op; embedders supply their own
//! for metrics/tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serin_rtree_store::NodeId;

/// Observer of tree-maintenance events. Must not mutate the tree.
pub trait Monitor {
    /// A split occurred.
    fn add_split(&self) {}
    /// A full rebuild occurred (as opposed to seeded clustering).
    fn add_nbr_rebuilt(&self) {}
    /// A named branch of the bulk-load decision tree was taken.
    fn add_case(&self, _tag: &str) {}
    /// A traversal visited `node` at the given depth.
    fn matched_tree_node(&self, _depth: usize, _node: NodeId) {}
}

/// Default no-op monitor.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMonitor;

impl Monitor for NoopMonitor {}

/// Test/metrics monitor that tallies every event it receives.
#[derive(Default)]
pub struct CountingMonitor {
    /// Number of splits observed.
    pub splits: AtomicUsize,
    /// Number of full rebuilds observed.
    pub rebuilds: AtomicUsize,
    /// Tags passed to `add_case`, in order.
    pub cases: Mutex<Vec<String>>,
}

impl Monitor for CountingMonitor {
    fn add_split(&self) {
        self.splits.fetch_add(1, Ordering::Relaxed);
    }

    fn add_nbr_rebuilt(&self) {
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    fn add_case(&self, tag: &str) {
        self.cases.lock().unwrap().push(tag.to_string());
    }
}

impl Monitor for Box<dyn Monitor> {
    fn add_split(&self) {
        self.as_ref().add_split()
    }

    fn add_nbr_rebuilt(&self) {
        self.as_ref().add_nbr_rebuilt()
    }

    fn add_case(&self, tag: &str) {
        self.as_ref().add_case(tag)
    }

    fn matched_tree_node(&self, depth: usize, node: NodeId) {
        self.as_ref().matched_tree_node(depth, node)
    }
}

impl CountingMonitor {
    /// Number of splits observed so far.
    pub fn split_count(&self) -> usize {
        self.splits.load(Ordering::Relaxed)
    }

    /// Number of full rebuilds observed so far.
    pub fn rebuild_count(&self) -> usize {
        self.rebuilds.load(Ordering::Relaxed)
    }
}
