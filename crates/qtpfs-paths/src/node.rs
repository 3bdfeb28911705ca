//! Quad-tree nodes and their border geometry.

use std::fmt;

use bitflags::bitflags;
use qtpfs_core::{Range, SQUARE_SIZE, Vec3};
use smallvec::SmallVec;

/// Index of a node inside its [`NodeLayer`](crate::NodeLayer) arena.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags! {
    /// Which side(s) of a node a neighbour lies on. Edge neighbours have
    /// exactly one bit set, corner neighbours two.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NeighborRelation: u8 {
        /// Neighbour lies to the left (−x).
        const EDGE_L = 1 << 0;
        /// Neighbour lies to the right (+x).
        const EDGE_R = 1 << 1;
        /// Neighbour lies above (−z).
        const EDGE_T = 1 << 2;
        /// Neighbour lies below (+z).
        const EDGE_B = 1 << 3;
    }
}

impl NeighborRelation {
    /// The shared border runs along the x axis.
    #[inline]
    pub fn is_horizontal(self) -> bool {
        self.intersects(Self::EDGE_T | Self::EDGE_B)
    }

    /// The shared border runs along the z axis.
    #[inline]
    pub fn is_vertical(self) -> bool {
        self.intersects(Self::EDGE_L | Self::EDGE_R)
    }

    /// The nodes only share a single vertex.
    #[inline]
    pub fn is_corner(self) -> bool {
        self.is_horizontal() && self.is_vertical()
    }
}

/// A rectangular region of the grid with a uniform aggregate move-cost.
///
/// Internal (split) nodes keep their aggregate values so that a later
/// terrain change can decide whether they may merge again, but only leaves
/// take part in searches.
#[derive(Debug, Clone)]
pub struct QtNode {
    pub(crate) rect: Range,
    pub(crate) depth: u8,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: SmallVec<[NodeId; 4]>,
    pub(crate) speed_mod: f32,
    pub(crate) move_cost: f32,
    pub(crate) neighbors: SmallVec<[NodeId; 8]>,
    pub(crate) edge_midpoints: SmallVec<[Vec3; 8]>,
    pub(crate) magic: u32,
    pub(crate) in_use: bool,
}

impl QtNode {
    pub(crate) fn new(rect: Range, depth: u8, parent: Option<NodeId>) -> Self {
        Self {
            rect,
            depth,
            parent,
            children: SmallVec::new(),
            speed_mod: 0.0,
            move_cost: f32::INFINITY,
            neighbors: SmallVec::new(),
            edge_midpoints: SmallVec::new(),
            magic: 0,
            in_use: true,
        }
    }

    /// Cell range covered by this node.
    #[inline]
    pub fn rect(&self) -> Range {
        self.rect
    }

    #[inline]
    pub fn xmin(&self) -> i32 {
        self.rect.min.x
    }

    #[inline]
    pub fn xmax(&self) -> i32 {
        self.rect.max.x
    }

    #[inline]
    pub fn zmin(&self) -> i32 {
        self.rect.min.z
    }

    #[inline]
    pub fn zmax(&self) -> i32 {
        self.rect.max.z
    }

    /// Centre x in cell units.
    #[inline]
    pub fn xmid(&self) -> f32 {
        self.rect.mid().0
    }

    /// Centre z in cell units.
    #[inline]
    pub fn zmid(&self) -> f32 {
        self.rect.mid().1
    }

    /// World-space centre of the node.
    #[inline]
    pub fn center(&self) -> Vec3 {
        self.rect.world_center()
    }

    #[inline]
    pub fn depth(&self) -> u8 {
        self.depth
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Mean speed modifier over the node's cells.
    #[inline]
    pub fn speed_mod(&self) -> f32 {
        self.speed_mod
    }

    /// Aggregate move-cost; `f32::INFINITY` when impassable.
    #[inline]
    pub fn move_cost(&self) -> f32 {
        self.move_cost
    }

    #[inline]
    pub fn is_blocked(&self) -> bool {
        self.move_cost == f32::INFINITY
    }

    /// Leaves sharing an edge or a corner with this node.
    #[inline]
    pub fn neighbors(&self) -> &[NodeId] {
        &self.neighbors
    }

    /// Terrain version at which the neighbour cache was last rebuilt.
    #[inline]
    pub fn magic_number(&self) -> u32 {
        self.magic
    }

    /// Side(s) of `self` on which `ngb` lies. Empty if the nodes do not
    /// touch.
    pub fn neighbor_relation(&self, ngb: &QtNode) -> NeighborRelation {
        let mut rel = NeighborRelation::empty();
        if !self.rect.touches(ngb.rect) {
            return rel;
        }
        if ngb.xmax() == self.xmin() {
            rel |= NeighborRelation::EDGE_L;
        }
        if ngb.xmin() == self.xmax() {
            rel |= NeighborRelation::EDGE_R;
        }
        if ngb.zmax() == self.zmin() {
            rel |= NeighborRelation::EDGE_T;
        }
        if ngb.zmin() == self.zmax() {
            rel |= NeighborRelation::EDGE_B;
        }
        rel
    }

    /// Cell bounds `(xmin, xmax, zmin, zmax)` of the border shared with
    /// `ngb`. One pair collapses to a single value for edges, both do for
    /// corners.
    #[inline]
    pub fn shared_bounds(&self, ngb: &QtNode) -> (i32, i32, i32, i32) {
        (
            self.xmin().max(ngb.xmin()),
            self.xmax().min(ngb.xmax()),
            self.zmin().max(ngb.zmin()),
            self.zmax().min(ngb.zmax()),
        )
    }

    /// Point on the border shared with `ngb` nearest to `pos`: the shared
    /// vertex for corner neighbours, otherwise `pos` clamped onto the shared
    /// edge segment.
    pub fn edge_transition_point(&self, ngb: &QtNode, pos: Vec3) -> Vec3 {
        let (xmin, xmax, zmin, zmax) = self.shared_bounds(ngb);
        let rel = self.neighbor_relation(ngb);
        let s = SQUARE_SIZE;

        let x = if rel.contains(NeighborRelation::EDGE_L) {
            self.xmin() as f32 * s
        } else if rel.contains(NeighborRelation::EDGE_R) {
            self.xmax() as f32 * s
        } else {
            pos.x.clamp(xmin as f32 * s, xmax as f32 * s)
        };
        let z = if rel.contains(NeighborRelation::EDGE_T) {
            self.zmin() as f32 * s
        } else if rel.contains(NeighborRelation::EDGE_B) {
            self.zmax() as f32 * s
        } else {
            pos.z.clamp(zmin as f32 * s, zmax as f32 * s)
        };
        Vec3::new(x, 0.0, z)
    }

    /// Midpoint of the border shared with `ngb` (the shared vertex for
    /// corner neighbours).
    pub fn edge_midpoint(&self, ngb: &QtNode) -> Vec3 {
        let (xmin, xmax, zmin, zmax) = self.shared_bounds(ngb);
        let mid = Vec3::new(
            (xmin + xmax) as f32 * 0.5 * SQUARE_SIZE,
            0.0,
            (zmin + zmax) as f32 * 0.5 * SQUARE_SIZE,
        );
        self.edge_transition_point(ngb, mid)
    }
}
