use std::fmt;

use qtpfs_core::{Range, SQUARE_SIZE, Vec3};

/// Stable identifier of a path. Ids start at 1 and are never reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathId(pub u64);

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered sequence of waypoints from a source to a target.
///
/// A path starts out as a two-point placeholder `[source, target]`, is
/// filled in once by a search (or by copying another path), and is
/// read-only for consumers afterwards. The first and last points are set
/// independently of the interior waypoints.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    id: PathId,
    hash: u64,
    radius: f32,
    points: Vec<Vec3>,
    bounds_min: Vec3,
    bounds_max: Vec3,
    next_point_index: usize,
    num_updates: u32,
}

impl Path {
    /// A placeholder path holding just `[source, target]`.
    pub fn new(id: PathId, source: Vec3, target: Vec3, radius: f32) -> Self {
        let mut path = Self {
            id,
            hash: 0,
            radius,
            points: vec![source, target],
            bounds_min: Vec3::ZERO,
            bounds_max: Vec3::ZERO,
            next_point_index: 1,
            num_updates: 0,
        };
        path.set_bounding_box();
        path
    }

    #[inline]
    pub fn id(&self) -> PathId {
        self.id
    }

    /// Hash of the search that produced this path (0 before any search).
    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Footprint radius of the path's owner, used to grow the bounding box.
    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Number of points, including source and target.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false: every path has at least its two endpoints.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    #[inline]
    pub fn point(&self, i: usize) -> Vec3 {
        self.points[i]
    }

    #[inline]
    pub fn source_point(&self) -> Vec3 {
        self.points[0]
    }

    #[inline]
    pub fn target_point(&self) -> Vec3 {
        self.points[self.points.len() - 1]
    }

    /// `(min, max)` corners of the world-space box around all points.
    #[inline]
    pub fn bounding_box(&self) -> (Vec3, Vec3) {
        (self.bounds_min, self.bounds_max)
    }

    /// Index of the waypoint the owner is currently heading for.
    #[inline]
    pub fn next_point_index(&self) -> usize {
        self.next_point_index
    }

    /// How many times this path has been (re)computed.
    #[inline]
    pub fn num_updates(&self) -> u32 {
        self.num_updates
    }

    /// Sum of the planar segment lengths.
    pub fn length(&self) -> f32 {
        self.points.windows(2).map(|w| w[0].distance_2d(w[1])).sum()
    }

    /// Whether the bounding box overlaps the world rectangle of cell range
    /// `rect`.
    pub fn intersects(&self, rect: Range) -> bool {
        let s = SQUARE_SIZE;
        self.bounds_min.x <= rect.max.x as f32 * s
            && self.bounds_max.x >= rect.min.x as f32 * s
            && self.bounds_min.z <= rect.max.z as f32 * s
            && self.bounds_max.z >= rect.min.z as f32 * s
    }

    // -----------------------------------------------------------------------
    // Construction (crate-internal)
    // -----------------------------------------------------------------------

    pub(crate) fn set_hash(&mut self, hash: u64) {
        self.hash = hash;
    }

    /// Replace the waypoints with `[source, interior..., target]`.
    pub(crate) fn build(&mut self, source: Vec3, interior: &[Vec3], target: Vec3) {
        self.alloc_points(interior.len() + 2);
        for (i, &p) in interior.iter().enumerate() {
            self.set_point(i + 1, p);
        }
        self.set_source_point(source);
        self.set_target_point(target);
    }

    /// Resize to `n` points, all zeroed. `n` must be at least 2.
    fn alloc_points(&mut self, n: usize) {
        debug_assert!(n >= 2);
        self.points.clear();
        self.points.resize(n, Vec3::ZERO);
    }

    fn set_point(&mut self, i: usize, p: Vec3) {
        self.points[i] = p;
    }

    fn set_source_point(&mut self, p: Vec3) {
        self.points[0] = p;
    }

    fn set_target_point(&mut self, p: Vec3) {
        let last = self.points.len() - 1;
        self.points[last] = p;
    }

    pub(crate) fn set_bounding_box(&mut self) {
        let mut lo = self.points[0];
        let mut hi = self.points[0];
        for &p in &self.points[1..] {
            lo = lo.min(p);
            hi = hi.max(p);
        }
        let r = Vec3::new(self.radius, 0.0, self.radius);
        self.bounds_min = lo - r;
        self.bounds_max = hi + r;
    }

    pub(crate) fn set_next_point_index(&mut self, i: usize) {
        self.next_point_index = i.min(self.points.len() - 1);
    }

    /// Mark the path as freshly (re)computed.
    pub(crate) fn bump_updates(&mut self) {
        self.num_updates += 1;
        self.next_point_index = 1;
    }
}
