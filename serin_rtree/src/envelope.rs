//! 2D axis-aligned bounding rectangle math.
//!
//! Every other component works in terms of [`Envelope`]; it is the one type
//! that never touches the store.

use serde::{Deserialize, Serialize};

/// Dimension along which a split or a center computation operates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Horizontal.
    X,
    /// Vertical.
    Y,
}

/// An axis-aligned bounding rectangle, `min <= max` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Minimum x.
    pub min_x: f64,
    /// Minimum y.
    pub min_y: f64,
    /// Maximum x.
    pub max_x: f64,
    /// Maximum y.
    pub max_y: f64,
}

impl Envelope {
    /// Construct a new envelope. Panics if `min > max` on either axis: every
    /// caller derives envelopes from geometry or from unions of existing
    /// envelopes, neither of which can legitimately produce an inverted box.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        debug_assert!(min_x <= max_x && min_y <= max_y, "inverted envelope");
        Self { min_x, min_y, max_x, max_y }
    }

    /// The sentinel envelope for a node with no children (§9 Open Questions).
    /// Never returned from a search result, only from `getBoundingBox()` on
    /// an empty tree.
    pub fn empty_at_origin() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Build an envelope from the dense `(minX, minY, maxX, maxY)` property
    /// layout used by the store.
    pub fn from_array(bbox: [f64; 4]) -> Self {
        Self::new(bbox[0], bbox[1], bbox[2], bbox[3])
    }

    /// The dense `(minX, minY, maxX, maxY)` property layout used by the store.
    pub fn to_array(self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    /// The single definition of area used everywhere in this crate.
    pub fn area(&self) -> f64 {
        (self.max_x - self.min_x) * (self.max_y - self.min_y)
    }

    /// True iff `other`'s rectangle lies (inclusively) inside `self`.
    pub fn contains(&self, other: &Envelope) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && self.max_x >= other.max_x
            && self.max_y >= other.max_y
    }

    /// True iff the two rectangles overlap, inclusive of touching boundaries.
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// True iff the rectangle (inclusively) contains the point `(x, y)`.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        self.min_x <= x && x <= self.max_x && self.min_y <= y && y <= self.max_y
    }

    /// Rectangle that encloses both `self` and `other`.
    pub fn union(&self, other: &Envelope) -> Envelope {
        Envelope::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// In-place union with `other`.
    pub fn expand_to_include(&mut self, other: &Envelope) {
        *self = self.union(other);
    }

    /// Midpoint along the given axis.
    pub fn centre(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => (self.min_x + self.max_x) / 2.0,
            Axis::Y => (self.min_y + self.max_y) / 2.0,
        }
    }

    /// Squared Euclidean distance between rectangle centers, used as a
    /// "dead space" proxy for split seed selection. Squared (not `sqrt`'d)
    /// consistently since only relative ordering matters and the metric
    /// must stay stable across a run.
    pub fn separation(&self, other: &Envelope) -> f64 {
        let dx = self.centre(Axis::X) - other.centre(Axis::X);
        let dy = self.centre(Axis::Y) - other.centre(Axis::Y);
        dx * dx + dy * dy
    }

    /// Squared distance between the two envelopes' centers along a single
    /// axis. Greene's split computes this once per dimension and compares
    /// the two results, rather than recomputing "the same quantity" inside a
    /// loop that silently always keeps the last dimension visited.
    pub fn separation_along(&self, other: &Envelope, axis: Axis) -> f64 {
        let d = self.centre(axis) - other.centre(axis);
        d * d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_is_width_times_height() {
        let e = Envelope::new(0.0, 0.0, 2.0, 3.0);
        assert_eq!(e.area(), 6.0);
    }

    #[test]
    fn contains_is_inclusive() {
        let outer = Envelope::new(0.0, 0.0, 10.0, 10.0);
        let inner = Envelope::new(0.0, 0.0, 10.0, 10.0);
        assert!(outer.contains(&inner));
        let outside = Envelope::new(-1.0, 0.0, 10.0, 10.0);
        assert!(!outer.contains(&outside));
    }

    #[test]
    fn intersects_touching_boundary() {
        let a = Envelope::new(0.0, 0.0, 1.0, 1.0);
        let b = Envelope::new(1.0, 1.0, 2.0, 2.0);
        assert!(a.intersects(&b));
        let c = Envelope::new(1.1, 1.1, 2.0, 2.0);
        assert!(!a.intersects(&c));
    }

    #[test]
    fn union_encloses_both() {
        let a = Envelope::new(0.0, 0.0, 1.0, 1.0);
        let b = Envelope::new(2.0, -1.0, 3.0, 0.5);
        let u = a.union(&b);
        assert_eq!(u, Envelope::new(0.0, -1.0, 3.0, 1.0));
    }

    #[test]
    fn separation_along_picks_larger_axis() {
        let a = Envelope::new(0.0, 0.0, 1.0, 1.0);
        let b = Envelope::new(10.0, 1.5, 11.0, 2.5);
        assert!(a.separation_along(&b, Axis::X) > a.separation_along(&b, Axis::Y));
    }
}
