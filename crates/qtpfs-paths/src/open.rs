use std::cmp::Ordering;
use std::fmt;

use priority_queue::PriorityQueue;
use qtpfs_core::Vec3;
use rustc_hash::FxBuildHasher;

use crate::node::NodeId;

/// Distance between the search-state values of two consecutive searches.
/// The low bit of a tag distinguishes open from closed.
pub const NODE_STATE_OFFSET: u32 = 2;
pub(crate) const NODE_STATE_OPEN: u32 = 0;
pub(crate) const NODE_STATE_CLOSED: u32 = 1;

// ---------------------------------------------------------------------------
// Per-node search record
// ---------------------------------------------------------------------------

/// Search data for one node. Valid only while `state` and `magic` match the
/// running search; anything else is left over from an earlier search and
/// is treated as unvisited.
#[derive(Clone, Debug)]
pub(crate) struct NodeRecord {
    pub(crate) state: u32,
    pub(crate) magic: u32,
    /// Accumulated true cost.
    pub(crate) g: f32,
    /// Weighted heuristic estimate (already multiplied by the search type).
    pub(crate) h: f32,
    pub(crate) f: f32,
    /// Accumulated move-cost along the path so far.
    pub(crate) m: f32,
    /// Unweighted distance from `point` to the target.
    pub(crate) h_dist: f32,
    /// Where the path enters this node.
    pub(crate) point: Vec3,
    pub(crate) prev: Option<NodeId>,
    pub(crate) num_prev: u32,
}

impl Default for NodeRecord {
    fn default() -> Self {
        Self {
            state: 0,
            magic: u32::MAX,
            g: f32::INFINITY,
            h: 0.0,
            f: f32::INFINITY,
            m: 0.0,
            h_dist: f32::INFINITY,
            point: Vec3::ZERO,
            prev: None,
            num_prev: 0,
        }
    }
}

impl NodeRecord {
    #[inline]
    pub(crate) fn is_current(&self, state: u32, magic: u32) -> bool {
        self.state >= state && self.magic == magic
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.state & 1 == NODE_STATE_CLOSED
    }
}

/// Open-list priority: lowest F first, ties broken by lowest node id.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Priority {
    pub(crate) f: f32,
    pub(crate) id: NodeId,
}

impl PartialEq for Priority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Priority {}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-queue pops the smallest F first.
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.id.cmp(&self.id))
    }
}

// ---------------------------------------------------------------------------
// SearchContext
// ---------------------------------------------------------------------------

/// The open list plus the per-node search records.
///
/// One context serves any number of consecutive searches without clearing
/// the records in between: every search uses a larger state tag, so records
/// written by earlier searches simply stop counting as visited. A context
/// must not be shared by two searches running at the same time; parallel
/// workers each need their own.
pub struct SearchContext {
    open: PriorityQueue<NodeId, Priority, FxBuildHasher>,
    pub(crate) records: Vec<NodeRecord>,
}

impl fmt::Debug for SearchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchContext")
            .field("open", &self.open.len())
            .field("records", &self.records.len())
            .finish()
    }
}

impl Default for SearchContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchContext {
    pub fn new() -> Self {
        Self {
            open: PriorityQueue::with_default_hasher(),
            records: Vec::new(),
        }
    }

    /// Forget every record. Needed only when the state counter wraps.
    pub fn reset(&mut self) {
        self.open.clear();
        for r in self.records.iter_mut() {
            *r = NodeRecord::default();
        }
    }

    /// Number of nodes currently open.
    pub fn open_len(&self) -> usize {
        self.open.len()
    }

    /// Empty the open list and make room for `capacity` nodes.
    pub(crate) fn prepare(&mut self, capacity: usize) {
        self.open.clear();
        if self.records.len() < capacity {
            self.records.resize(capacity, NodeRecord::default());
        }
    }

    #[inline]
    pub(crate) fn record(&self, id: NodeId) -> &NodeRecord {
        &self.records[id.index()]
    }

    #[inline]
    pub(crate) fn record_mut(&mut self, id: NodeId) -> &mut NodeRecord {
        &mut self.records[id.index()]
    }

    /// Insert `id` into the open list with its current F.
    pub(crate) fn push(&mut self, id: NodeId) {
        let f = self.records[id.index()].f;
        self.open.push(id, Priority { f, id });
    }

    /// Restore the ordering of `id` after its F changed while open.
    pub(crate) fn resort(&mut self, id: NodeId) {
        let f = self.records[id.index()].f;
        self.open.change_priority(&id, Priority { f, id });
    }

    pub(crate) fn pop(&mut self) -> Option<NodeId> {
        self.open.pop().map(|(id, _)| id)
    }

    pub(crate) fn clear_open(&mut self) {
        self.open.clear();
    }
}
