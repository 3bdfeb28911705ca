//! Tunables for layers, searches and the manager.
//!
//! Every struct has a `Default` matching the behaviour described in the
//! crate docs; with the `serde` feature they can be loaded from any serde
//! format, and missing fields fall back to their defaults.

use crate::error::PathError;

/// Which priority function the search uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SearchType {
    /// Heuristic contributes to F (multiplier 1).
    #[default]
    AStar,
    /// Heuristic ignored (multiplier 0): pure cost-ordered search.
    Dijkstra,
}

impl SearchType {
    /// Multiplier applied to the weighted heuristic when computing F.
    #[inline]
    pub fn heuristic_multiplier(self) -> f32 {
        match self {
            Self::AStar => 1.0,
            Self::Dijkstra => 0.0,
        }
    }
}

impl TryFrom<u32> for SearchType {
    type Error = PathError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::AStar),
            1 => Ok(Self::Dijkstra),
            other => Err(PathError::InvalidSearchType(other)),
        }
    }
}

/// How the heuristic distance is weighted during node expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HeuristicMode {
    /// Constant weight ([`SearchConfig::heuristic_weight`]).
    #[default]
    Fixed,
    /// `sqrt(M / (previous node count + 1))`, i.e. adapted to the average
    /// move-cost seen along the partial path.
    Weighted,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SearchConfig {
    pub heuristic: HeuristicMode,
    /// Weight for [`HeuristicMode::Fixed`]. Flat terrain has a relative
    /// speed of 0.5, so its move-cost (and the default weight) is 2.0.
    pub heuristic_weight: f32,
    /// Slide waypoints along shared edges after tracing.
    pub smooth_paths: bool,
    /// Fall back to the best node reached when the target is unreachable.
    pub partial_searches: bool,
    /// Use the per-neighbour cached edge midpoints instead of recomputing
    /// the transition point from the current travel position.
    pub cached_transition_points: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            heuristic: HeuristicMode::Fixed,
            heuristic_weight: 2.0,
            smooth_paths: true,
            partial_searches: true,
            cached_transition_points: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LayerConfig {
    /// Edge length (in cells) of the root nodes tiling the map.
    pub root_node_size: i32,
    /// Nodes at or below this edge length are never split.
    pub min_node_size: i32,
    /// Speed modifier that maps to a relative speed of 1.0.
    pub max_speed_mod: f32,
    /// Cells whose speed modifiers differ by at most this much are uniform.
    pub uniform_epsilon: f32,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            root_node_size: 32,
            min_node_size: 1,
            max_speed_mod: 2.0,
            uniform_epsilon: 1e-3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ManagerConfig {
    pub search: SearchConfig,
    pub search_type: SearchType,
    /// Upper bound on searches executed by one `PathManager::update`.
    pub max_searches_per_update: usize,
    /// Let queued searches with the same hash copy an earlier result.
    pub share_paths: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            search_type: SearchType::AStar,
            max_searches_per_update: 64,
            share_paths: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_type_codes() {
        assert_eq!(SearchType::try_from(0), Ok(SearchType::AStar));
        assert_eq!(SearchType::try_from(1), Ok(SearchType::Dijkstra));
        assert_eq!(
            SearchType::try_from(7),
            Err(PathError::InvalidSearchType(7))
        );
    }

    #[test]
    fn multipliers() {
        assert_eq!(SearchType::AStar.heuristic_multiplier(), 1.0);
        assert_eq!(SearchType::Dijkstra.heuristic_multiplier(), 0.0);
    }

    #[test]
    fn default_weight_matches_flat_move_cost() {
        let layer = LayerConfig::default();
        let search = SearchConfig::default();
        assert_eq!(layer.max_speed_mod / 1.0, search.heuristic_weight);
    }
}
