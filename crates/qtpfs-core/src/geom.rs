//! Geometry primitives: [`Point`], [`Range`] and [`Vec3`].
//!
//! `Point` and `Range` live in grid space (one unit per terrain cell, `x`
//! grows east, `z` grows south). `Vec3` lives in world space, where one cell
//! spans [`SQUARE_SIZE`](crate::SQUARE_SIZE) units on each horizontal axis.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Mul, Sub};

use crate::SQUARE_SIZE;

// ---------------------------------------------------------------------------
// Point
// ---------------------------------------------------------------------------

/// A 2D integer cell coordinate.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: i32,
    pub z: i32,
}

impl Point {
    /// Origin (0, 0).
    pub const ZERO: Self = Self { x: 0, z: 0 };

    /// Create a new point.
    #[inline]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Return a point shifted by (dx, dz).
    #[inline]
    pub const fn shift(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
        }
    }

    /// World-space position of the centre of this cell.
    #[inline]
    pub fn center(self) -> Vec3 {
        Vec3::new(
            (self.x as f32 + 0.5) * SQUARE_SIZE,
            0.0,
            (self.z as f32 + 0.5) * SQUARE_SIZE,
        )
    }
}

impl Hash for Point {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.hash(state);
        self.z.hash(state);
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

// ---------------------------------------------------------------------------
// Range
// ---------------------------------------------------------------------------

/// A half-open cell rectangle \[min, max). `min` is inclusive, `max` is
/// exclusive, so a quad-tree node covering cells `0..4` has `max.x == 4`.
///
/// All empty ranges are considered equal.
#[derive(Copy, Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Range {
    pub min: Point,
    pub max: Point,
}

impl PartialEq for Range {
    fn eq(&self, other: &Self) -> bool {
        (self.min == other.min && self.max == other.max) || (self.is_empty() && other.is_empty())
    }
}

impl Eq for Range {}

impl Hash for Range {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if self.is_empty() {
            // All empty ranges hash the same.
            Point::ZERO.hash(state);
            Point::ZERO.hash(state);
        } else {
            self.min.hash(state);
            self.max.hash(state);
        }
    }
}

impl Range {
    /// Create a new range from two corners and auto-canonicalize so that
    /// `min` ≤ `max` on each axis.
    #[inline]
    pub fn new(x0: i32, z0: i32, x1: i32, z1: i32) -> Self {
        Self {
            min: Point::new(x0.min(x1), z0.min(z1)),
            max: Point::new(x0.max(x1), z0.max(z1)),
        }
    }

    /// Range covering `[0, size)`.
    #[inline]
    pub fn from_size(size: Point) -> Self {
        Self::new(0, 0, size.x, size.z)
    }

    /// Size as a `Point` (width, height).
    #[inline]
    pub fn size(self) -> Point {
        Point::new(self.width(), self.height())
    }

    /// Width of the range (x extent).
    #[inline]
    pub fn width(self) -> i32 {
        self.max.x - self.min.x
    }

    /// Height of the range (z extent).
    #[inline]
    pub fn height(self) -> i32 {
        self.max.z - self.min.z
    }

    /// Total number of cells in the range.
    #[inline]
    pub fn len(self) -> usize {
        if self.is_empty() {
            return 0;
        }
        (self.width() as usize) * (self.height() as usize)
    }

    /// Whether the range has zero or negative area.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.min.x >= self.max.x || self.min.z >= self.max.z
    }

    /// Whether `p` is inside the half-open range.
    #[inline]
    pub fn contains(self, p: Point) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.z >= self.min.z && p.z < self.max.z
    }

    /// Intersection of two ranges (the zero range if they do not overlap).
    #[inline]
    pub fn intersect(self, other: Range) -> Self {
        let r = Self {
            min: Point::new(self.min.x.max(other.min.x), self.min.z.max(other.min.z)),
            max: Point::new(self.max.x.min(other.max.x), self.max.z.min(other.max.z)),
        };
        if r.is_empty() { Self::default() } else { r }
    }

    /// Smallest range that contains both ranges.
    #[inline]
    pub fn union(self, other: Range) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Self {
            min: Point::new(self.min.x.min(other.min.x), self.min.z.min(other.min.z)),
            max: Point::new(self.max.x.max(other.max.x), self.max.z.max(other.max.z)),
        }
    }

    /// Whether the two ranges overlap (non-empty intersection).
    #[inline]
    pub fn overlaps(self, other: Range) -> bool {
        !self.intersect(other).is_empty()
    }

    /// Whether the two ranges overlap or share an edge or corner.
    #[inline]
    pub fn touches(self, other: Range) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.z <= other.max.z
            && other.min.z <= self.max.z
    }

    /// Return the range grown by `n` cells on every side.
    #[inline]
    pub fn grow(self, n: i32) -> Self {
        Self {
            min: self.min.shift(-n, -n),
            max: self.max.shift(n, n),
        }
    }

    /// Centre of the range in (fractional) cell coordinates.
    #[inline]
    pub fn mid(self) -> (f32, f32) {
        (
            (self.min.x + self.max.x) as f32 * 0.5,
            (self.min.z + self.max.z) as f32 * 0.5,
        )
    }

    /// Centre of the range in world space.
    #[inline]
    pub fn world_center(self) -> Vec3 {
        let (x, z) = self.mid();
        Vec3::new(x * SQUARE_SIZE, 0.0, z * SQUARE_SIZE)
    }

    /// Row-major iterator over every point in the range.
    #[inline]
    pub fn iter(self) -> RangeIter {
        RangeIter {
            range: self,
            cur: self.min,
        }
    }
}

impl IntoIterator for Range {
    type Item = Point;
    type IntoIter = RangeIter;
    #[inline]
    fn into_iter(self) -> RangeIter {
        self.iter()
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}-{})", self.min, self.max)
    }
}

/// Row-major iterator over the points in a [`Range`].
#[derive(Clone, Debug)]
pub struct RangeIter {
    range: Range,
    cur: Point,
}

impl Iterator for RangeIter {
    type Item = Point;

    #[inline]
    fn next(&mut self) -> Option<Point> {
        if self.cur.z >= self.range.max.z || self.range.is_empty() {
            return None;
        }
        let p = self.cur;
        self.cur.x += 1;
        if self.cur.x >= self.range.max.x {
            self.cur.x = self.range.min.x;
            self.cur.z += 1;
        }
        Some(p)
    }
}

// ---------------------------------------------------------------------------
// Vec3
// ---------------------------------------------------------------------------

/// A world-space position or direction. `y` is height and is carried
/// through untouched; all path geometry is computed in the x/z plane.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The same vector projected onto the ground plane (`y = 0`).
    #[inline]
    pub fn xz(self) -> Self {
        Self::new(self.x, 0.0, self.z)
    }

    #[inline]
    pub fn dot(self, o: Self) -> f32 {
        self.x * o.x + self.y * o.y + self.z * o.z
    }

    #[inline]
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Distance between two positions in the x/z plane.
    #[inline]
    pub fn distance_2d(self, o: Self) -> f32 {
        self.sq_distance_2d(o).sqrt()
    }

    /// Squared distance between two positions in the x/z plane.
    #[inline]
    pub fn sq_distance_2d(self, o: Self) -> f32 {
        let dx = self.x - o.x;
        let dz = self.z - o.z;
        dx * dx + dz * dz
    }

    /// Unit-length copy of `self`, or `self` unchanged if its length is
    /// (nearly) zero.
    #[inline]
    pub fn safe_normalize(self) -> Self {
        let len = self.length();
        if len > 1e-6 { self * (1.0 / len) } else { self }
    }

    /// Whether every component is finite.
    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Clamp x/z into the world rectangle of a map `size` cells large.
    #[inline]
    pub fn clamp_in_bounds(self, size: Point) -> Self {
        let max_x = (size.x as f32 * SQUARE_SIZE - 1.0).max(0.0);
        let max_z = (size.z as f32 * SQUARE_SIZE - 1.0).max(0.0);
        Self::new(self.x.clamp(0.0, max_x), self.y, self.z.clamp(0.0, max_z))
    }

    /// Grid cell containing this world position.
    #[inline]
    pub fn cell(self) -> Point {
        Point::new(
            (self.x / SQUARE_SIZE).floor() as i32,
            (self.z / SQUARE_SIZE).floor() as i32,
        )
    }

    /// Component-wise minimum.
    #[inline]
    pub fn min(self, o: Self) -> Self {
        Self::new(self.x.min(o.x), self.y.min(o.y), self.z.min(o.z))
    }

    /// Component-wise maximum.
    #[inline]
    pub fn max(self, o: Self) -> Self {
        Self::new(self.x.max(o.x), self.y.max(o.y), self.z.max(o.z))
    }
}

impl Add for Vec3 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn point_shift() {
        assert_eq!(Point::new(1, 2).shift(-1, 1), Point::new(0, 3));
    }

    #[test]
    fn point_center_is_mid_cell() {
        let c = Point::new(2, 0).center();
        assert_eq!(c, Vec3::new(2.5 * SQUARE_SIZE, 0.0, 0.5 * SQUARE_SIZE));
    }

    #[test]
    fn range_basics() {
        let r = Range::new(0, 0, 3, 2);
        assert_eq!(r.size(), Point::new(3, 2));
        assert_eq!(r.len(), 6);
        assert!(r.contains(Point::new(2, 1)));
        assert!(!r.contains(Point::new(3, 0)));
        assert!(!r.contains(Point::new(0, 2)));
    }

    #[test]
    fn range_auto_canonicalize() {
        let r = Range::new(3, 2, 0, 0);
        assert_eq!(r.min, Point::new(0, 0));
        assert_eq!(r.max, Point::new(3, 2));
    }

    #[test]
    fn range_iter_row_major() {
        let pts: Vec<_> = Range::new(0, 0, 3, 2).iter().collect();
        assert_eq!(pts.len(), 6);
        assert_eq!(pts[0], Point::new(0, 0));
        assert_eq!(pts[3], Point::new(0, 1));
        assert_eq!(pts[5], Point::new(2, 1));
    }

    #[test]
    fn range_intersect_and_union() {
        let a = Range::new(0, 0, 4, 4);
        let b = Range::new(2, 2, 6, 6);
        assert_eq!(a.intersect(b), Range::new(2, 2, 4, 4));
        assert_eq!(a.union(b), Range::new(0, 0, 6, 6));
        assert!(a.intersect(Range::new(5, 5, 7, 7)).is_empty());
    }

    #[test]
    fn touching_but_not_overlapping() {
        let a = Range::new(0, 0, 4, 4);
        let edge = Range::new(4, 1, 6, 3);
        let corner = Range::new(4, 4, 5, 5);
        let apart = Range::new(5, 0, 6, 1);
        assert!(!a.overlaps(edge));
        assert!(a.touches(edge));
        assert!(a.touches(corner));
        assert!(!a.touches(apart));
    }

    #[test]
    fn grow_expands_every_side() {
        assert_eq!(Range::new(2, 2, 4, 4).grow(1), Range::new(1, 1, 5, 5));
    }

    #[test]
    fn empty_ranges_compare_and_hash_equal() {
        let a = Range::default();
        let b = Range {
            min: Point::new(5, 5),
            max: Point::new(5, 5),
        };
        assert_eq!(a, b);
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn world_center_of_range() {
        let c = Range::new(0, 0, 2, 4).world_center();
        assert_eq!(c, Vec3::new(SQUARE_SIZE, 0.0, 2.0 * SQUARE_SIZE));
    }

    #[test]
    fn clamp_in_bounds_keeps_height() {
        let v = Vec3::new(-5.0, 12.0, 1000.0).clamp_in_bounds(Point::new(4, 4));
        assert_eq!(v, Vec3::new(0.0, 12.0, 4.0 * SQUARE_SIZE - 1.0));
        assert_eq!(v.cell(), Point::new(0, 3));
    }

    #[test]
    fn planar_distance_ignores_height() {
        let a = Vec3::new(0.0, 100.0, 0.0);
        let b = Vec3::new(3.0, -7.0, 4.0);
        assert_eq!(a.distance_2d(b), 5.0);
        assert_eq!(a.sq_distance_2d(b), 25.0);
    }

    #[test]
    fn safe_normalize_zero_is_zero() {
        assert_eq!(Vec3::ZERO.safe_normalize(), Vec3::ZERO);
        let n = Vec3::new(3.0, 0.0, 4.0).safe_normalize();
        assert!((n.length() - 1.0).abs() < 1e-6);
    }
}

#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::*;

    #[test]
    fn range_round_trip() {
        let r = Range::new(1, 2, 10, 20);
        let json = serde_json::to_string(&r).unwrap();
        let back: Range = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn vec3_round_trip() {
        let v = Vec3::new(1.5, 0.0, -3.25);
        let json = serde_json::to_string(&v).unwrap();
        let back: Vec3 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
