//! One resolution level of the quad-tree partition.
//!
//! A [`NodeLayer`] tiles the map with root nodes of
//! [`LayerConfig::root_node_size`] cells and splits every node whose cells
//! do not share the same speed modifier, down to
//! [`LayerConfig::min_node_size`]. Nodes live in an arena addressed by
//! [`NodeId`]; released slots are recycled after a merge. A row-major
//! cell → leaf index answers point lookups in O(1).
//!
//! Terrain changes go through [`NodeLayer::update`], which re-splits or
//! re-merges the affected subtrees, bumps the layer's magic number and
//! rebuilds the neighbour caches around the change.

use log::{debug, trace};
use qtpfs_core::{Point, Range, Terrain, Vec3};
use smallvec::SmallVec;

use crate::config::LayerConfig;
use crate::node::{NeighborRelation, NodeId, QtNode};

#[derive(Debug, Clone)]
pub struct NodeLayer {
    config: LayerConfig,
    size: Point,
    nodes: Vec<QtNode>,
    free: Vec<NodeId>,
    roots: Vec<NodeId>,
    node_grid: Vec<NodeId>,
    magic: u32,
    num_leafs: usize,
}

/// Aggregate speed-modifier statistics of a cell range.
#[derive(Debug, Clone, Copy)]
struct CellStats {
    min: f32,
    max: f32,
    mean: f32,
}

impl NodeLayer {
    /// Tesselate `terrain` into a fresh layer.
    ///
    /// # Panics
    ///
    /// If the terrain has no cells.
    pub fn new(terrain: &impl Terrain, config: LayerConfig) -> Self {
        let size = terrain.size();
        assert!(
            size.x > 0 && size.z > 0,
            "terrain must have at least one cell, got {size}"
        );
        let root_size = config.root_node_size.max(1);
        let mut layer = Self {
            config,
            size,
            nodes: Vec::new(),
            free: Vec::new(),
            roots: Vec::new(),
            node_grid: vec![NodeId::default(); (size.x * size.z) as usize],
            magic: 0,
            num_leafs: 0,
        };

        for z in (0..size.z).step_by(root_size as usize) {
            for x in (0..size.x).step_by(root_size as usize) {
                let rect = Range::new(x, z, (x + root_size).min(size.x), (z + root_size).min(size.z));
                let root = layer.alloc(rect, 0, None);
                layer.roots.push(root);
                layer.tesselate(terrain, root);
            }
        }

        let all: Vec<NodeId> = layer.leaves().collect();
        for id in all {
            layer.rebuild_neighbors(id);
        }
        debug!(
            "tesselated {}x{} cells into {} leaves ({} roots)",
            size.x,
            size.z,
            layer.num_leafs,
            layer.roots.len()
        );
        layer
    }

    #[inline]
    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    /// Map size in cells.
    #[inline]
    pub fn size(&self) -> Point {
        self.size
    }

    /// Number of terrain changes applied so far.
    #[inline]
    pub fn magic(&self) -> u32 {
        self.magic
    }

    /// Number of leaf nodes.
    #[inline]
    pub fn leaf_count(&self) -> usize {
        self.num_leafs
    }

    /// Size of the node arena; every valid [`NodeId`] is below this.
    #[inline]
    pub fn node_capacity(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &QtNode {
        &self.nodes[id.index()]
    }

    /// Ids of all current leaves, in arena order.
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.in_use && n.is_leaf())
            .map(|(i, _)| NodeId(i as u32))
    }

    /// Leaf containing cell `p` (clamped into the map).
    #[inline]
    pub fn node_at(&self, p: Point) -> NodeId {
        let x = p.x.clamp(0, self.size.x - 1);
        let z = p.z.clamp(0, self.size.z - 1);
        self.node_grid[(z * self.size.x + x) as usize]
    }

    /// Leaf containing world position `v` (clamped into the map).
    #[inline]
    pub fn node_at_world(&self, v: Vec3) -> NodeId {
        self.node_at(v.clamp_in_bounds(self.size).cell())
    }

    #[inline]
    pub fn neighbors(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].neighbors
    }

    /// Side(s) of `a` on which `b` lies.
    #[inline]
    pub fn neighbor_relation(&self, a: NodeId, b: NodeId) -> NeighborRelation {
        self.node(a).neighbor_relation(self.node(b))
    }

    /// Point where a path leaving `from` enters `to`, nearest to `pos`.
    #[inline]
    pub fn transition_point(&self, from: NodeId, to: NodeId, pos: Vec3) -> Vec3 {
        self.node(from).edge_transition_point(self.node(to), pos)
    }

    /// Cached midpoint of the edge between `from` and its `i`-th neighbour.
    #[inline]
    pub fn cached_transition_point(&self, from: NodeId, i: usize) -> Vec3 {
        self.nodes[from.index()].edge_midpoints[i]
    }

    /// Re-tesselate every node intersecting `rect` after the terrain
    /// changed there. Returns the number of leaves whose neighbour cache
    /// was rebuilt.
    pub fn update(&mut self, terrain: &impl Terrain, rect: Range) -> usize {
        let rect = rect.intersect(Range::from_size(self.size));
        if rect.is_empty() {
            return 0;
        }

        let mut dirty = rect;
        let roots: SmallVec<[NodeId; 16]> = self
            .roots
            .iter()
            .copied()
            .filter(|&r| self.node(r).rect.overlaps(rect))
            .collect();
        for root in roots {
            self.update_node(terrain, root, rect, &mut dirty);
        }

        self.magic = self.magic.wrapping_add(1);

        // Leaves whose neighbour set may reference a split or merged node.
        let area = dirty.grow(1).intersect(Range::from_size(self.size));
        let mut touched: Vec<NodeId> = area.iter().map(|p| self.node_at(p)).collect();
        touched.sort_unstable();
        touched.dedup();
        for &id in &touched {
            self.rebuild_neighbors(id);
        }

        debug!(
            "terrain change {} at {}: {} leaves refreshed, {} leaves total",
            self.magic,
            rect,
            touched.len(),
            self.num_leafs
        );
        touched.len()
    }

    // -----------------------------------------------------------------------
    // Tesselation
    // -----------------------------------------------------------------------

    fn alloc(&mut self, rect: Range, depth: u8, parent: Option<NodeId>) -> NodeId {
        let node = QtNode::new(rect, depth, parent);
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.index()] = node;
                id
            }
            None => {
                self.nodes.push(node);
                NodeId((self.nodes.len() - 1) as u32)
            }
        }
    }

    fn release_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id.index()].children);
        for child in children {
            if self.node(child).is_leaf() {
                self.num_leafs -= 1;
            }
            self.release_children(child);
            let n = &mut self.nodes[child.index()];
            n.in_use = false;
            n.neighbors.clear();
            n.edge_midpoints.clear();
            self.free.push(child);
        }
    }

    fn stats(terrain: &impl Terrain, rect: Range) -> CellStats {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0f64;
        for p in rect {
            let v = terrain.speed_mod(p).max(0.0);
            min = min.min(v);
            max = max.max(v);
            sum += v as f64;
        }
        CellStats {
            min,
            max,
            mean: (sum / rect.len().max(1) as f64) as f32,
        }
    }

    fn move_cost(&self, mean_speed_mod: f32) -> f32 {
        if mean_speed_mod <= 0.0 {
            f32::INFINITY
        } else {
            self.config.max_speed_mod / mean_speed_mod
        }
    }

    fn can_split(&self, rect: Range) -> bool {
        let longest = rect.width().max(rect.height());
        longest > 1 && longest > self.config.min_node_size
    }

    fn apply_stats(&mut self, id: NodeId, stats: CellStats) {
        let cost = self.move_cost(stats.mean);
        let n = &mut self.nodes[id.index()];
        n.speed_mod = stats.mean;
        n.move_cost = cost;
    }

    /// Split `id` into up to four quadrants (two along a 1-cell axis).
    fn split(&mut self, id: NodeId) -> SmallVec<[NodeId; 4]> {
        let (rect, depth) = {
            let n = self.node(id);
            (n.rect, n.depth)
        };
        let xs: SmallVec<[(i32, i32); 2]> = if rect.width() > 1 {
            let xm = rect.min.x + rect.width() / 2;
            smallvec::smallvec![(rect.min.x, xm), (xm, rect.max.x)]
        } else {
            smallvec::smallvec![(rect.min.x, rect.max.x)]
        };
        let zs: SmallVec<[(i32, i32); 2]> = if rect.height() > 1 {
            let zm = rect.min.z + rect.height() / 2;
            smallvec::smallvec![(rect.min.z, zm), (zm, rect.max.z)]
        } else {
            smallvec::smallvec![(rect.min.z, rect.max.z)]
        };

        let mut children = SmallVec::new();
        for &(z0, z1) in &zs {
            for &(x0, x1) in &xs {
                let child = self.alloc(Range::new(x0, z0, x1, z1), depth + 1, Some(id));
                children.push(child);
            }
        }
        self.nodes[id.index()].children = children.clone();
        children
    }

    /// Recursively split `id` until every leaf below it is uniform, then
    /// index the leaves.
    fn tesselate(&mut self, terrain: &impl Terrain, id: NodeId) {
        let rect = self.node(id).rect;
        let stats = Self::stats(terrain, rect);
        self.apply_stats(id, stats);

        let uniform = stats.max - stats.min <= self.config.uniform_epsilon;
        if !uniform && self.can_split(rect) {
            for child in self.split(id) {
                self.tesselate(terrain, child);
            }
        } else {
            self.index_leaf(id);
        }
    }

    fn index_leaf(&mut self, id: NodeId) {
        let rect = self.node(id).rect;
        for p in rect {
            self.node_grid[(p.z * self.size.x + p.x) as usize] = id;
        }
        self.num_leafs += 1;
    }

    fn update_node(&mut self, terrain: &impl Terrain, id: NodeId, rect: Range, dirty: &mut Range) {
        let node_rect = self.node(id).rect;
        let stats = Self::stats(terrain, node_rect);
        let uniform = stats.max - stats.min <= self.config.uniform_epsilon;

        if self.node(id).is_leaf() {
            if !uniform && self.can_split(node_rect) {
                trace!("splitting {id} {node_rect}");
                self.num_leafs -= 1;
                self.tesselate(terrain, id);
                *dirty = dirty.union(node_rect);
            } else {
                self.apply_stats(id, stats);
            }
            return;
        }

        if uniform {
            trace!("merging {id} {node_rect}");
            self.release_children(id);
            self.apply_stats(id, stats);
            self.index_leaf(id);
            *dirty = dirty.union(node_rect);
            return;
        }

        self.apply_stats(id, stats);
        let children = self.node(id).children.clone();
        for child in children {
            if self.node(child).rect.overlaps(rect) {
                self.update_node(terrain, child, rect, dirty);
            }
        }
    }

    /// Recompute the neighbour list and edge midpoints of leaf `id` by
    /// walking the ring of cells around it.
    fn rebuild_neighbors(&mut self, id: NodeId) {
        let rect = self.node(id).rect;
        let bounds = Range::from_size(self.size);
        let mut ngbs: SmallVec<[NodeId; 8]> = SmallVec::new();
        let mut visit = |p: Point, grid: &[NodeId], width: i32| {
            if bounds.contains(p) {
                let n = grid[(p.z * width + p.x) as usize];
                if !ngbs.contains(&n) {
                    ngbs.push(n);
                }
            }
        };

        for x in rect.min.x - 1..=rect.max.x {
            visit(Point::new(x, rect.min.z - 1), &self.node_grid, self.size.x);
        }
        for z in rect.min.z..rect.max.z {
            visit(Point::new(rect.max.x, z), &self.node_grid, self.size.x);
        }
        for x in (rect.min.x - 1..=rect.max.x).rev() {
            visit(Point::new(x, rect.max.z), &self.node_grid, self.size.x);
        }
        for z in (rect.min.z..rect.max.z).rev() {
            visit(Point::new(rect.min.x - 1, z), &self.node_grid, self.size.x);
        }

        let midpoints: SmallVec<[Vec3; 8]> = ngbs
            .iter()
            .map(|&n| self.node(id).edge_midpoint(self.node(n)))
            .collect();

        let magic = self.magic;
        let n = &mut self.nodes[id.index()];
        n.neighbors = ngbs;
        n.edge_midpoints = midpoints;
        n.magic = magic;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qtpfs_core::SpeedModMap;

    fn config(root: i32) -> LayerConfig {
        LayerConfig {
            root_node_size: root,
            ..LayerConfig::default()
        }
    }

    #[test]
    fn uniform_terrain_keeps_root_nodes() {
        let terrain = SpeedModMap::new(16, 16, 1.0);
        let layer = NodeLayer::new(&terrain, config(8));
        assert_eq!(layer.leaf_count(), 4);
        let n = layer.node(layer.node_at(Point::new(3, 3)));
        assert_eq!(n.rect(), Range::new(0, 0, 8, 8));
        assert_eq!(n.move_cost(), 2.0);
    }

    #[test]
    fn roots_are_clipped_at_map_edges() {
        let terrain = SpeedModMap::new(10, 5, 1.0);
        let layer = NodeLayer::new(&terrain, config(8));
        assert_eq!(layer.leaf_count(), 2);
        let n = layer.node(layer.node_at(Point::new(9, 4)));
        assert_eq!(n.rect(), Range::new(8, 0, 10, 5));
    }

    #[test]
    fn blocked_cell_splits_down_to_single_cells() {
        let mut terrain = SpeedModMap::new(4, 4, 1.0);
        terrain.set(Point::new(0, 0), 0.0);
        let layer = NodeLayer::new(&terrain, config(4));
        // 4x4 -> four 2x2, top-left 2x2 -> four 1x1.
        assert_eq!(layer.leaf_count(), 7);
        let blocked = layer.node(layer.node_at(Point::new(0, 0)));
        assert_eq!(blocked.rect(), Range::new(0, 0, 1, 1));
        assert!(blocked.is_blocked());
        let big = layer.node(layer.node_at(Point::new(3, 3)));
        assert_eq!(big.rect(), Range::new(2, 2, 4, 4));
    }

    #[test]
    fn every_cell_maps_to_a_containing_leaf() {
        let terrain = SpeedModMap::from_ascii(&[
            "....#...", //
            "..~~#...",
            "..~~....",
            "........",
            "######..",
            "........",
            "...++...",
            "........",
        ]);
        let layer = NodeLayer::new(&terrain, config(8));
        for p in Range::from_size(layer.size()) {
            let n = layer.node(layer.node_at(p));
            assert!(n.is_leaf());
            assert!(n.rect().contains(p), "{p} not in {}", n.rect());
        }
        let covered: usize = layer.leaves().map(|id| layer.node(id).rect().len()).sum();
        assert_eq!(covered, 64);
    }

    #[test]
    fn neighbours_are_symmetric_and_touching() {
        let terrain = SpeedModMap::from_ascii(&[
            "........", //
            ".#......",
            "........",
            "....~...",
            "........",
            "........",
            "......#.",
            "........",
        ]);
        let layer = NodeLayer::new(&terrain, config(8));
        for id in layer.leaves() {
            for &ngb in layer.neighbors(id) {
                assert_ne!(id, ngb);
                assert!(layer.neighbors(ngb).contains(&id), "{id} -> {ngb} not symmetric");
                assert!(!layer.neighbor_relation(id, ngb).is_empty());
            }
        }
    }

    #[test]
    fn grid_neighbours_include_corners() {
        let terrain = SpeedModMap::new(3, 3, 1.0);
        let layer = NodeLayer::new(
            &terrain,
            LayerConfig {
                root_node_size: 1,
                ..LayerConfig::default()
            },
        );
        let centre = layer.node_at(Point::new(1, 1));
        assert_eq!(layer.neighbors(centre).len(), 8);
        let corner = layer.node_at(Point::new(0, 0));
        assert_eq!(layer.neighbors(corner).len(), 3);
    }

    #[test]
    fn cached_midpoints_follow_neighbour_order() {
        let terrain = SpeedModMap::new(2, 1, 1.0);
        let layer = NodeLayer::new(
            &terrain,
            LayerConfig {
                root_node_size: 1,
                ..LayerConfig::default()
            },
        );
        let a = layer.node_at(Point::new(0, 0));
        assert_eq!(layer.neighbors(a).len(), 1);
        let p = layer.cached_transition_point(a, 0);
        assert_eq!(p, Vec3::new(8.0, 0.0, 4.0));
    }

    #[test]
    fn update_splits_and_merges_back() {
        let mut terrain = SpeedModMap::new(8, 8, 1.0);
        let mut layer = NodeLayer::new(&terrain, config(8));
        assert_eq!(layer.leaf_count(), 1);

        terrain.set(Point::new(5, 5), 0.0);
        layer.update(&terrain, Range::new(5, 5, 6, 6));
        assert_eq!(layer.magic(), 1);
        assert!(layer.leaf_count() > 1);
        assert!(layer.node(layer.node_at(Point::new(5, 5))).is_blocked());

        terrain.set(Point::new(5, 5), 1.0);
        layer.update(&terrain, Range::new(5, 5, 6, 6));
        assert_eq!(layer.magic(), 2);
        assert_eq!(layer.leaf_count(), 1);
        let root = layer.node_at(Point::new(0, 0));
        assert_eq!(layer.node(root).rect(), Range::new(0, 0, 8, 8));
        assert_eq!(layer.node(root).magic_number(), 2);
    }

    #[test]
    fn update_keeps_neighbours_consistent() {
        let mut terrain = SpeedModMap::new(16, 16, 1.0);
        let mut layer = NodeLayer::new(&terrain, config(8));
        terrain.fill_range(Range::new(6, 6, 10, 10), 0.0);
        layer.update(&terrain, Range::new(6, 6, 10, 10));
        for id in layer.leaves() {
            for &ngb in layer.neighbors(id) {
                assert!(layer.node(ngb).in_use);
                assert!(layer.node(ngb).is_leaf());
                assert!(layer.neighbors(ngb).contains(&id));
            }
        }
    }

    #[test]
    fn cost_only_change_keeps_topology() {
        let mut terrain = SpeedModMap::new(8, 8, 1.0);
        let mut layer = NodeLayer::new(&terrain, config(8));
        terrain.fill_range(Range::from_size(Point::new(8, 8)), 0.5);
        layer.update(&terrain, Range::new(0, 0, 8, 8));
        assert_eq!(layer.leaf_count(), 1);
        assert_eq!(layer.node(layer.node_at(Point::ZERO)).move_cost(), 4.0);
    }

    #[test]
    fn node_at_world_clamps() {
        let terrain = SpeedModMap::new(4, 4, 1.0);
        let layer = NodeLayer::new(&terrain, config(2));
        let id = layer.node_at_world(Vec3::new(1000.0, 0.0, -50.0));
        assert_eq!(layer.node(id).rect(), Range::new(2, 0, 4, 2));
    }
}
