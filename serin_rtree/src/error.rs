//! Error taxonomy for the R-tree core.

use serin_rtree_store::StoreError;

use crate::GeometryId;

/// Errors the index's writer and reader APIs can return.
#[derive(Debug, thiserror::Error)]
pub enum RTreeError {
    /// A requested geometry id does not exist in the store.
    #[error("geometry not found: {0:?}")]
    NotFound(GeometryId),

    /// The geometry exists but is indexed by a different tree.
    #[error("geometry {0:?} is not indexed by this tree")]
    NotIndexedHere(GeometryId),

    /// An unknown config key, an unknown value for a known key, or an
    /// out-of-range parameter (`maxNodeReferences < 1`, negative loading
    /// factor).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A programmer/data-corruption fault: no viable child on a non-root
    /// internal node, `h_i - l_t > 1` during bulk insertion, or a node
    /// carrying both `CHILD` and `REFERENCE` edges.
    #[error("invariant violated: {0}")]
    InvariantViolated(String),

    /// Propagated from the store adapter unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, RTreeError>;
