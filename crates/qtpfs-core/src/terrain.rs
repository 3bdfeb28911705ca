//! Per-cell terrain speed modifiers.
//!
//! The simulation owns the real terrain; the path finder only ever sees it
//! through [`Terrain`]. A speed modifier of `0.0` marks a blocked cell,
//! larger values are faster. [`SpeedModMap`] is a dense implementation for
//! tools and tests.

use crate::geom::{Point, Range};

/// Read-only view of the per-cell speed modifiers of one movement class.
pub trait Terrain {
    /// Map size in cells.
    fn size(&self) -> Point;

    /// Speed modifier of cell `p`. Only called for cells inside
    /// `Range::from_size(self.size())`.
    fn speed_mod(&self, p: Point) -> f32;
}

/// A dense, row-major grid of speed modifiers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpeedModMap {
    width: i32,
    height: i32,
    cells: Vec<f32>,
}

impl SpeedModMap {
    /// Create a `width` × `height` map with every cell set to `fill`.
    pub fn new(width: i32, height: i32, fill: f32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            cells: vec![fill; (width * height) as usize],
        }
    }

    /// Build a map from ASCII rows: `#` is blocked, `.` is flat (1.0),
    /// `~` is slow (0.5) and `+` is fast (2.0). Rows must be equally long.
    pub fn from_ascii(rows: &[&str]) -> Self {
        let height = rows.len() as i32;
        let width = rows.first().map_or(0, |r| r.chars().count()) as i32;
        let mut map = Self::new(width, height, 1.0);
        for (z, row) in rows.iter().enumerate() {
            debug_assert_eq!(row.chars().count() as i32, width, "ragged terrain row {z}");
            for (x, ch) in row.chars().enumerate() {
                let v = match ch {
                    '#' => 0.0,
                    '~' => 0.5,
                    '+' => 2.0,
                    _ => 1.0,
                };
                map.set(Point::new(x as i32, z as i32), v);
            }
        }
        map
    }

    /// The full cell range of the map.
    #[inline]
    pub fn range(&self) -> Range {
        Range::new(0, 0, self.width, self.height)
    }

    #[inline]
    fn index(&self, p: Point) -> Option<usize> {
        if !self.range().contains(p) {
            return None;
        }
        Some((p.z * self.width + p.x) as usize)
    }

    /// Speed modifier at `p`, or `None` outside the map.
    pub fn get(&self, p: Point) -> Option<f32> {
        self.index(p).map(|i| self.cells[i])
    }

    /// Set the speed modifier at `p`. Out-of-map writes are ignored.
    pub fn set(&mut self, p: Point, value: f32) {
        if let Some(i) = self.index(p) {
            self.cells[i] = value;
        }
    }

    /// Set every cell of `rng` (clipped to the map) to `value`.
    pub fn fill_range(&mut self, rng: Range, value: f32) {
        for p in rng.intersect(self.range()) {
            self.set(p, value);
        }
    }
}

impl Terrain for SpeedModMap {
    fn size(&self) -> Point {
        Point::new(self.width, self.height)
    }

    fn speed_mod(&self, p: Point) -> f32 {
        self.get(p).unwrap_or(0.0)
    }
}
