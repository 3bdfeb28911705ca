//! A single path query over a [`NodeGraph`].
//!
//! A [`PathSearch`] is set up with [`PathSearch::initialize`], run with
//! [`PathSearch::execute`] against a [`SearchContext`] and turned into a
//! live [`Path`] with [`PathSearch::finalize`] (or, when an earlier search
//! already produced a path to the same place, [`PathSearch::shared_finalize`]).
//!
//! Costs are measured along the points where the path actually crosses
//! node borders rather than between node centres: G accumulates
//! `move_cost × distance` per crossed node, H is the straight distance to
//! the target scaled by the heuristic weight. Because every node only has
//! an average move-cost the heuristic cannot be strictly admissible, so
//! paths are nearly optimal rather than optimal.

use log::{debug, trace};
use qtpfs_core::{POSITIVE_INFINITY, Range, SQUARE_SIZE, Vec3};

use crate::cache::PathCache;
use crate::config::{HeuristicMode, SearchConfig, SearchType};
use crate::error::PathError;
use crate::node::NodeId;
use crate::open::{NODE_STATE_CLOSED, NODE_STATE_OPEN, SearchContext};
use crate::path::{Path, PathId};
use crate::smooth;
use crate::traits::NodeGraph;

/// One query from a source to a target point. Holds the query, the
/// outcome of [`execute`](Self::execute) and the node chain until the
/// result is finalized into a [`Path`].
#[derive(Debug, Clone)]
pub struct PathSearch {
    search_type: SearchType,
    config: SearchConfig,

    src_point: Vec3,
    tgt_point: Vec3,
    src_node: NodeId,
    tgt_node: NodeId,
    min_node: NodeId,
    search_rect: Range,

    search_state: u32,
    search_magic: u32,
    h_cost_mult: f32,
    src_blocked: bool,

    have_full_path: bool,
    have_part_path: bool,
    nodes_expanded: usize,
    path_cost: f32,
    path_move_cost: f32,
    /// Nodes from source to (possibly substituted) target.
    chain: Vec<NodeId>,
}

impl PathSearch {
    pub fn new(search_type: SearchType, config: SearchConfig) -> Self {
        Self {
            search_type,
            config,
            src_point: Vec3::ZERO,
            tgt_point: Vec3::ZERO,
            src_node: NodeId::default(),
            tgt_node: NodeId::default(),
            min_node: NodeId::default(),
            search_rect: Range::default(),
            search_state: 0,
            search_magic: 0,
            h_cost_mult: search_type.heuristic_multiplier(),
            src_blocked: false,
            have_full_path: false,
            have_part_path: false,
            nodes_expanded: 0,
            path_cost: 0.0,
            path_move_cost: 0.0,
            chain: Vec::new(),
        }
    }

    /// Set up a query from `source` to `target`, both clamped into the map.
    /// Only nodes whose centre lies within `search_rect` (cells, bounds
    /// inclusive) are expanded.
    pub fn initialize<G: NodeGraph + ?Sized>(&mut self, graph: &G, source: Vec3, target: Vec3, search_rect: Range) {
        let size = graph.size();
        self.src_point = source.clamp_in_bounds(size);
        self.tgt_point = target.clamp_in_bounds(size);
        self.src_node = graph.node_at_world(self.src_point);
        self.tgt_node = graph.node_at_world(self.tgt_point);
        self.min_node = self.src_node;
        self.search_rect = search_rect;
        self.have_full_path = false;
        self.have_part_path = false;
        self.nodes_expanded = 0;
        self.chain.clear();
    }

    /// Run the search to completion. `search_state` must be larger than the
    /// state of every earlier search that used `ctx` (advance it by
    /// [`NODE_STATE_OFFSET`](crate::NODE_STATE_OFFSET)); `search_magic`
    /// is the graph's current terrain version. Returns whether a full or a
    /// partial path was found.
    pub fn execute<G: NodeGraph + ?Sized>(
        &mut self,
        graph: &G,
        ctx: &mut SearchContext,
        search_state: u32,
        search_magic: u32,
    ) -> bool {
        self.search_state = search_state;
        self.search_magic = search_magic;
        self.have_full_path = self.src_node == self.tgt_node;
        self.have_part_path = false;
        self.nodes_expanded = 0;
        self.path_cost = 0.0;
        self.path_move_cost = 0.0;
        self.chain.clear();

        if self.have_full_path {
            self.chain.push(self.src_node);
            return true;
        }

        self.h_cost_mult = self.search_type.heuristic_multiplier();
        // A unit may stand on the passable part of an otherwise blocked
        // node, so the source never counts as impassable.
        self.src_blocked = graph.move_cost(self.src_node) == POSITIVE_INFINITY;

        ctx.prepare(graph.node_capacity());
        let src = self.src_node;
        let h_dist = self.src_point.distance_2d(self.tgt_point);
        let src_cost = self.move_cost(graph, src);
        self.update_node(ctx, src, None, self.src_point, 0.0, h_dist, src_cost, h_dist, 0);
        ctx.push(src);

        while let Some(cur) = ctx.pop() {
            self.iterate(graph, ctx, cur);

            self.have_full_path = cur == self.tgt_node;
            self.have_part_path = self.min_node != self.src_node;
            if self.have_full_path {
                ctx.clear_open();
                break;
            }
        }
        self.src_blocked = false;

        if !self.have_full_path {
            if self.have_part_path && self.config.partial_searches {
                let c = graph.node_rect(self.min_node).world_center();
                self.tgt_node = self.min_node;
                self.tgt_point = Vec3::new(c.x, self.tgt_point.y, c.z);
            } else {
                self.have_part_path = false;
            }
        }

        let found = self.have_full_path || self.have_part_path;
        if found {
            let rec = ctx.record(self.tgt_node);
            self.path_cost = rec.g;
            self.path_move_cost = rec.m;
            self.collect_chain(ctx, graph.node_capacity());
        }

        debug!(
            "{:?} search {} -> {}: {}, {} nodes expanded",
            self.search_type,
            self.src_point,
            self.tgt_point,
            if self.have_full_path {
                "full path"
            } else if self.have_part_path {
                "partial path"
            } else {
                "no path"
            },
            self.nodes_expanded
        );
        found
    }

    #[inline]
    fn move_cost<G: NodeGraph + ?Sized>(&self, graph: &G, id: NodeId) -> f32 {
        if self.src_blocked && id == self.src_node {
            0.0
        } else {
            graph.move_cost(id)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn update_node(
        &self,
        ctx: &mut SearchContext,
        id: NodeId,
        prev: Option<NodeId>,
        point: Vec3,
        g_cost: f32,
        h_cost: f32,
        m_cost: f32,
        h_dist: f32,
        num_prev: u32,
    ) {
        let h = h_cost * self.h_cost_mult;
        let r = ctx.record_mut(id);
        r.state = self.search_state | NODE_STATE_OPEN;
        r.magic = self.search_magic;
        r.prev = prev;
        r.point = point;
        r.g = g_cost;
        r.h = h;
        r.f = g_cost + h;
        r.m = m_cost;
        r.h_dist = h_dist;
        r.num_prev = num_prev;
    }

    /// Close `cur` and relax its neighbours.
    fn iterate<G: NodeGraph + ?Sized>(&mut self, graph: &G, ctx: &mut SearchContext, cur: NodeId) {
        ctx.record_mut(cur).state = self.search_state | NODE_STATE_CLOSED;
        self.nodes_expanded += 1;

        if cur == self.tgt_node {
            return;
        }
        let cur_cost = self.move_cost(graph, cur);
        if cur_cost == POSITIVE_INFINITY {
            return;
        }
        let (xmid, zmid) = graph.node_rect(cur).mid();
        let rect = self.search_rect;
        if xmid < rect.min.x as f32
            || zmid < rect.min.z as f32
            || xmid > rect.max.x as f32
            || zmid > rect.max.z as f32
        {
            return;
        }

        let (cur_point, cur_g, cur_m, cur_h_dist, cur_num_prev) = {
            let r = ctx.record(cur);
            (r.point, r.g, r.m, r.h_dist, r.num_prev)
        };
        if cur_h_dist < ctx.record(self.min_node).h_dist {
            self.min_node = cur;
        }
        trace!("expanding {cur} at {cur_point}, g={cur_g}");

        let h_weight = match self.config.heuristic {
            HeuristicMode::Fixed => self.config.heuristic_weight,
            HeuristicMode::Weighted => (cur_m / (cur_num_prev + 1) as f32).sqrt(),
        };

        for (i, &nxt) in graph.neighbors(cur).iter().enumerate() {
            let nxt_cost = self.move_cost(graph, nxt);
            if nxt_cost == POSITIVE_INFINITY {
                continue;
            }
            let nxt_point = if self.config.cached_transition_points {
                graph.cached_transition_point(cur, i)
            } else {
                graph.transition_point(cur, nxt, cur_point)
            };

            let (is_current, is_closed, nxt_g) = {
                let r = ctx.record(nxt);
                (r.is_current(self.search_state, self.search_magic), r.is_closed(), r.g)
            };
            let is_target = nxt == self.tgt_node;

            // Plain (not squared) distances: squared ones favour small nodes.
            let g_dist = cur_point.distance_2d(nxt_point);
            let h_dist = nxt_point.distance_2d(self.tgt_point);

            let mut m_cost = cur_m + cur_cost;
            let mut g_cost = cur_g + cur_cost * g_dist;
            let mut h_cost = h_weight * h_dist;
            if is_target {
                m_cost += nxt_cost;
                g_cost += nxt_cost * h_dist;
                h_cost = 0.0;
            }

            if !is_current {
                self.update_node(ctx, nxt, Some(cur), nxt_point, g_cost, h_cost, m_cost, h_dist, cur_num_prev + 1);
                ctx.push(nxt);
                continue;
            }
            if g_cost >= nxt_g {
                continue;
            }

            self.update_node(ctx, nxt, Some(cur), nxt_point, g_cost, h_cost, m_cost, h_dist, cur_num_prev + 1);
            if is_closed {
                ctx.push(nxt);
            } else {
                ctx.resort(nxt);
            }
        }
    }

    fn collect_chain(&mut self, ctx: &SearchContext, limit: usize) {
        let mut id = self.tgt_node;
        self.chain.push(id);
        while id != self.src_node && self.chain.len() <= limit {
            match ctx.record(id).prev {
                Some(prev) => {
                    id = prev;
                    self.chain.push(id);
                }
                None => break,
            }
        }
        debug_assert_eq!(id, self.src_node, "broken back-pointer chain");
        self.chain.reverse();
    }

    /// Turn the search result into `path` and make it live in `cache`.
    ///
    /// Must follow a successful [`execute`](Self::execute). The path's
    /// waypoints are replaced; its identity is kept.
    pub fn finalize<G: NodeGraph + ?Sized>(
        &mut self,
        graph: &G,
        cache: &mut PathCache,
        mut path: Path,
    ) -> Result<PathId, PathError> {
        let id = path.id();
        if cache.is_live(id) {
            return Err(PathError::AlreadyLive(id));
        }
        debug_assert!(self.have_full_path || self.have_part_path);

        let (mut points, mut edges) = self.trace_path(graph)?;
        if self.config.smooth_paths {
            smooth::smooth_path(graph, &mut points, &mut edges);
        }
        check_waypoints(&points)?;

        let last = points.len() - 1;
        path.build(points[0], &points[1..last], points[last]);
        path.set_bounding_box();
        path.bump_updates();
        cache.add_live_path(path)?;
        // The back-pointers are consumed.
        self.chain.clear();
        Ok(id)
    }

    /// Waypoints `[source, crossings..., target]` plus the `(later, earlier)`
    /// node pair of every crossing.
    pub(crate) fn trace_path<G: NodeGraph + ?Sized>(&self, graph: &G) -> Result<(Vec<Vec3>, Vec<(NodeId, NodeId)>), PathError> {
        let mut crossings = Vec::with_capacity(self.chain.len());
        let mut edges = Vec::with_capacity(self.chain.len());
        let mut prv_point = self.tgt_point.xz();

        for (i, pair) in self.chain.windows(2).enumerate().rev() {
            let (prv, tmp) = (pair[0], pair[1]);
            let point = graph.transition_point(tmp, prv, prv_point);
            if !point.is_finite() {
                return Err(PathError::NonFiniteWaypoint { index: i + 1, point });
            }
            // The first crossing may legitimately coincide with the target.
            if point != prv_point {
                crossings.push(point);
                edges.push((tmp, prv));
            } else if tmp != self.tgt_node {
                trace!("dropping repeated crossing {point} between {prv} and {tmp}");
            }
            prv_point = point;
        }
        crossings.reverse();
        edges.reverse();
        if crossings.first() == Some(&self.src_point.xz()) {
            crossings.remove(0);
            edges.remove(0);
        }

        let mut points = Vec::with_capacity(crossings.len() + 2);
        points.push(self.src_point);
        points.extend(crossings);
        points.push(self.tgt_point);
        Ok((points, edges))
    }

    /// Satisfy the pending path `dst_id` by copying the live path `src_id`,
    /// provided both end within one cell of each other. Returns whether the
    /// copy was made; a copy that would repeat a waypoint is not made.
    pub fn shared_finalize(&self, cache: &mut PathCache, src_id: PathId, dst_id: PathId) -> Result<bool, PathError> {
        if src_id == dst_id {
            return Err(PathError::SharedWithSelf(dst_id));
        }
        let src_path = cache.get_live_path(src_id).ok_or(PathError::UnknownPath(src_id))?;
        let dst_path = match cache.get_path(dst_id) {
            Some(p) if cache.is_pending(dst_id) => p,
            Some(_) => return Err(PathError::NotTemporary(dst_id)),
            None => return Err(PathError::UnknownPath(dst_id)),
        };
        if dst_path.len() != 2 {
            return Err(PathError::NotTrivial {
                id: dst_id,
                len: dst_path.len(),
            });
        }

        let p0 = src_path.target_point();
        let p1 = dst_path.target_point();
        if p0.sq_distance_2d(p1) >= SQUARE_SIZE * SQUARE_SIZE {
            return Ok(false);
        }

        // Crossings the new endpoints already sit on are not waypoints.
        let (src, tgt) = (self.src_point, self.tgt_point);
        let interior: Vec<Vec3> = src_path.points()[1..src_path.len() - 1]
            .iter()
            .copied()
            .filter(|p| p.xz() != src.xz() && p.xz() != tgt.xz())
            .collect();
        let mut points = Vec::with_capacity(interior.len() + 2);
        points.push(src);
        points.extend_from_slice(&interior);
        points.push(tgt);
        if let Err(e) = check_waypoints(&points) {
            debug!("path {dst_id} cannot share the waypoints of path {src_id}: {e}");
            return Ok(false);
        }

        let mut path = cache.take_pending_path(dst_id)?;
        path.build(src, &interior, tgt);
        path.set_bounding_box();
        path.bump_updates();
        cache.add_live_path(path)?;
        debug!("path {dst_id} shares the waypoints of path {src_id}");
        Ok(true)
    }

    /// Composite key `src + tgt·n + k·n²` of the source and target nodes,
    /// `n` being the node capacity of the graph and `k` a caller salt.
    pub fn get_hash(&self, n: u64, k: u64) -> u64 {
        (self.src_node.0 as u64)
            .wrapping_add((self.tgt_node.0 as u64).wrapping_mul(n))
            .wrapping_add(k.wrapping_mul(n).wrapping_mul(n))
    }

    #[inline]
    pub fn search_type(&self) -> SearchType {
        self.search_type
    }

    #[inline]
    pub fn source_point(&self) -> Vec3 {
        self.src_point
    }

    /// The requested target, or the centre of the best node reached after a
    /// partial search.
    #[inline]
    pub fn target_point(&self) -> Vec3 {
        self.tgt_point
    }

    #[inline]
    pub fn source_node(&self) -> NodeId {
        self.src_node
    }

    #[inline]
    pub fn target_node(&self) -> NodeId {
        self.tgt_node
    }

    #[inline]
    pub fn have_full_path(&self) -> bool {
        self.have_full_path
    }

    #[inline]
    pub fn have_part_path(&self) -> bool {
        self.have_part_path
    }

    /// Nodes popped from the open list by the last execution.
    #[inline]
    pub fn nodes_expanded(&self) -> usize {
        self.nodes_expanded
    }

    /// Accumulated G of the reached target.
    #[inline]
    pub fn path_cost(&self) -> f32 {
        self.path_cost
    }

    /// Accumulated M of the reached target. The source and target costs
    /// are both included, so this counts the source node twice.
    #[inline]
    pub fn path_move_cost(&self) -> f32 {
        self.path_move_cost
    }

    /// Nodes crossed from source to target, until finalized.
    #[inline]
    pub fn node_chain(&self) -> &[NodeId] {
        &self.chain
    }
}

/// Every waypoint is finite and no crossing repeats a neighbouring point.
fn check_waypoints(points: &[Vec3]) -> Result<(), PathError> {
    for (index, &point) in points.iter().enumerate() {
        if !point.is_finite() {
            return Err(PathError::NonFiniteWaypoint { index, point });
        }
    }
    if points.len() > 2 {
        for (index, pair) in points.windows(2).enumerate() {
            if pair[0].xz() == pair[1].xz() {
                return Err(PathError::DuplicateWaypoint { index, point: pair[0] });
            }
        }
    }
    Ok(())
}
