//! **qtpfs-core**: geometry and terrain primitives for the quad-tree path
//! finder.
//!
//! Everything in here is consumed by `qtpfs-paths`: integer cell
//! coordinates ([`Point`], [`Range`]), world-space positions ([`Vec3`]), the
//! world-to-grid scale ([`SQUARE_SIZE`]), and the [`Terrain`] trait through
//! which the simulation supplies per-cell speed modifiers.

pub mod geom;
pub mod terrain;

pub use geom::{Point, Range, RangeIter, Vec3};
pub use terrain::{SpeedModMap, Terrain};

/// World units per grid cell along each horizontal axis.
pub const SQUARE_SIZE: f32 = 8.0;

/// Move-cost sentinel marking impassable terrain.
pub const POSITIVE_INFINITY: f32 = f32::INFINITY;
