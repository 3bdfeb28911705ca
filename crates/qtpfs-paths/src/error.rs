use qtpfs_core::Vec3;
use thiserror::Error;

use crate::path::PathId;

/// Errors reported by the path cache, the search and the manager.
///
/// Apart from [`PathError::InvalidSearchType`] and
/// [`PathError::UnknownLayer`], every variant is a broken caller contract
/// or a broken reconstruction invariant rather than an expected outcome: an
/// unreachable target is not an error, it degrades to a partial path.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathError {
    #[error("path {0} is not in the cache")]
    UnknownPath(PathId),

    #[error("path {0} is already live")]
    AlreadyLive(PathId),

    #[error("path {0} is not awaiting a search result")]
    NotTemporary(PathId),

    #[error("path {0} cannot be shared with itself")]
    SharedWithSelf(PathId),

    #[error("path {id} must hold exactly two points to receive a shared copy, has {len}")]
    NotTrivial { id: PathId, len: usize },

    #[error("reconstructed waypoint {index} is not finite: {point}")]
    NonFiniteWaypoint { index: usize, point: Vec3 },

    #[error("reconstructed waypoints {index} and {} coincide at {point}", .index + 1)]
    DuplicateWaypoint { index: usize, point: Vec3 },

    #[error("invalid search type code {0}")]
    InvalidSearchType(u32),

    #[error("unknown node layer {0}")]
    UnknownLayer(usize),
}
