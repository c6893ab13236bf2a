//! Shared test fixtures: a trivial [`EnvelopeSource`] backed by a map, used
//! by every module's unit tests and by the crate-level scenario tests.

#![cfg(test)]

use std::sync::Mutex;

use serin_rtree_store::{GraphStore, NodeId};

use crate::envelope::Envelope;
use crate::{EnvelopeSource, GeometryId};

/// Maps geometry node ids to the envelope they were inserted with. Stands in
/// for the decoder §1 calls out as an external collaborator: in these tests
/// the "geometry record" is just a bare node plus an entry in this map.
#[derive(Default)]
pub struct MapEnvelopeSource {
    envelopes: Mutex<std::collections::HashMap<NodeId, Envelope>>,
}

impl MapEnvelopeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh Geometry node in `store` and record its envelope.
    pub fn insert<S: GraphStore>(&self, store: &S, envelope: Envelope) -> GeometryId {
        let node = store.create_node();
        self.envelopes.lock().unwrap().insert(node, envelope);
        GeometryId(node)
    }
}

impl EnvelopeSource for MapEnvelopeSource {
    fn envelope_of(&self, geometry: GeometryId) -> Option<Envelope> {
        self.envelopes.lock().unwrap().get(&geometry.0).copied()
    }
}
