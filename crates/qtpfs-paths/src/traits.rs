use qtpfs_core::{Point, Range, Vec3};

use crate::layer::NodeLayer;
use crate::node::{NeighborRelation, NodeId};

/// Node topology a search runs over: point lookup, per-node move-cost,
/// neighbour enumeration and border geometry.
///
/// [`NodeLayer`] is the production implementation; the search and the
/// smoothing pass only ever go through this trait.
pub trait NodeGraph {
    /// Map size in cells.
    fn size(&self) -> Point;

    /// Upper bound (exclusive) on node indices.
    fn node_capacity(&self) -> usize;

    /// Leaf containing world position `v` (clamped into the map).
    fn node_at_world(&self, v: Vec3) -> NodeId;

    /// Cell range covered by `id`.
    fn node_rect(&self, id: NodeId) -> Range;

    /// Aggregate move-cost of `id`; `f32::INFINITY` when impassable.
    fn move_cost(&self, id: NodeId) -> f32;

    fn neighbors(&self, id: NodeId) -> &[NodeId];

    /// Side(s) of `a` on which `b` lies.
    fn neighbor_relation(&self, a: NodeId, b: NodeId) -> NeighborRelation;

    /// Point on the border between `from` and `to` nearest to `pos`.
    fn transition_point(&self, from: NodeId, to: NodeId, pos: Vec3) -> Vec3;

    /// Precomputed transition point towards the `i`-th neighbour of `from`.
    fn cached_transition_point(&self, from: NodeId, i: usize) -> Vec3;
}

impl NodeGraph for NodeLayer {
    fn size(&self) -> Point {
        NodeLayer::size(self)
    }

    fn node_capacity(&self) -> usize {
        NodeLayer::node_capacity(self)
    }

    fn node_at_world(&self, v: Vec3) -> NodeId {
        NodeLayer::node_at_world(self, v)
    }

    fn node_rect(&self, id: NodeId) -> Range {
        self.node(id).rect()
    }

    fn move_cost(&self, id: NodeId) -> f32 {
        self.node(id).move_cost()
    }

    fn neighbors(&self, id: NodeId) -> &[NodeId] {
        NodeLayer::neighbors(self, id)
    }

    fn neighbor_relation(&self, a: NodeId, b: NodeId) -> NeighborRelation {
        NodeLayer::neighbor_relation(self, a, b)
    }

    fn transition_point(&self, from: NodeId, to: NodeId, pos: Vec3) -> Vec3 {
        NodeLayer::transition_point(self, from, to, pos)
    }

    fn cached_transition_point(&self, from: NodeId, i: usize) -> Vec3 {
        NodeLayer::cached_transition_point(self, from, i)
    }
}
