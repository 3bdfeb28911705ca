//! Quad-tree path finding over variable-cost terrain.
//!
//! The map is partitioned into a [`NodeLayer`]: a quad-tree whose leaves
//! are rectangles of uniform speed, so open terrain is covered by a few
//! large nodes and detail only costs nodes where the terrain changes.
//! Searches run over the leaves:
//!
//! - **A\*** and **Dijkstra** ([`PathSearch`], selected by [`SearchType`])
//!   measuring costs along the actual border crossings of the path
//! - **partial paths** to the best node reached when the target is cut off
//! - **smoothing** of the traced waypoints along shared node borders
//! - **sharing** of results between queries ending at the same place
//!
//! [`PathManager`] ties it together: it queues requests, runs them against
//! one reusable [`SearchContext`], keeps paths in a [`PathCache`] and
//! re-searches paths whose terrain changed.
//!
//! # Trait seam
//!
//! | Trait | Implemented by |
//! |---|---|
//! | [`NodeGraph`] | [`NodeLayer`] |
//! | [`Terrain`](qtpfs_core::Terrain) | [`SpeedModMap`](qtpfs_core::SpeedModMap) |

mod cache;
mod config;
mod error;
mod layer;
mod manager;
mod node;
mod open;
mod path;
mod search;
mod smooth;
mod traits;

#[cfg(test)]
mod proptests;

pub use cache::PathCache;
pub use config::{HeuristicMode, LayerConfig, ManagerConfig, SearchConfig, SearchType};
pub use error::PathError;
pub use layer::NodeLayer;
pub use manager::{LayerId, PathManager, UpdateReport};
pub use node::{NeighborRelation, NodeId, QtNode};
pub use open::{NODE_STATE_OFFSET, SearchContext};
pub use path::{Path, PathId};
pub use search::PathSearch;
pub use traits::NodeGraph;
