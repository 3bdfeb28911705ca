//! Property tests over randomly generated grids.

use proptest::prelude::*;
use qtpfs_core::{Point, Range, SQUARE_SIZE, SpeedModMap, Vec3};

use crate::cache::PathCache;
use crate::config::{LayerConfig, SearchConfig, SearchType};
use crate::layer::NodeLayer;
use crate::open::{NODE_STATE_OFFSET, SearchContext};
use crate::path::{Path, PathId};
use crate::search::PathSearch;
use crate::smooth::smooth_path;

/// One node per cell, so blocked cells are exactly the blocked nodes.
fn grid_layer(w: i32, h: i32, blocked: &[(i32, i32)]) -> NodeLayer {
    let mut terrain = SpeedModMap::new(w, h, 1.0);
    for &(x, z) in blocked {
        terrain.set(Point::new(x, z), 0.0);
    }
    NodeLayer::new(
        &terrain,
        LayerConfig {
            root_node_size: 1,
            ..LayerConfig::default()
        },
    )
}

fn run(layer: &NodeLayer, search_type: SearchType, src: Vec3, tgt: Vec3) -> (PathSearch, bool) {
    let mut ctx = SearchContext::new();
    let mut search = PathSearch::new(search_type, SearchConfig::default());
    search.initialize(layer, src, tgt, Range::from_size(layer.size()));
    let ok = search.execute(layer, &mut ctx, NODE_STATE_OFFSET, layer.magic());
    (search, ok)
}

fn world_point(x: std::ops::Range<f32>, z: std::ops::Range<f32>) -> impl Strategy<Value = Vec3> {
    (x, z).prop_map(|(x, z)| Vec3::new(x, 0.0, z))
}

/// Map size, source, target and some blocked cells.
fn scenario() -> impl Strategy<Value = (i32, i32, Vec3, Vec3, Vec<(i32, i32)>)> {
    (2i32..12, 2i32..12).prop_flat_map(|(w, h)| {
        let wx = w as f32 * SQUARE_SIZE - 1.0;
        let hz = h as f32 * SQUARE_SIZE - 1.0;
        (
            Just(w),
            Just(h),
            world_point(0.0..wx, 0.0..hz),
            world_point(0.0..wx, 0.0..hz),
            prop::collection::vec((0..w, 0..h), 0..(w * h / 4) as usize),
        )
    })
}

/// A map split by a fully blocked column, source left of it, target right.
fn walled() -> impl Strategy<Value = (i32, i32, i32, Vec3, Vec3)> {
    (4i32..12, 1i32..10)
        .prop_flat_map(|(w, h)| (Just(w), Just(h), 2..w - 1))
        .prop_flat_map(|(w, h, wall)| {
            let hz = h as f32 * SQUARE_SIZE - 1.0;
            let right = (wall + 1) as f32 * SQUARE_SIZE;
            let wx = w as f32 * SQUARE_SIZE - 1.0;
            (
                Just(w),
                Just(h),
                Just(wall),
                world_point(0.0..SQUARE_SIZE - 0.5, 0.0..hz),
                world_point(right..wx, 0.0..hz),
            )
        })
}

proptest! {
    #[test]
    fn finalized_paths_keep_their_endpoints((w, h, src, tgt, blocked) in scenario()) {
        let layer = grid_layer(w, h, &blocked);
        let (mut search, ok) = run(&layer, SearchType::AStar, src, tgt);
        let same_node = layer.node_at_world(src) == layer.node_at_world(tgt);
        if same_node {
            prop_assert!(ok && search.have_full_path());
        }
        prop_assume!(ok);

        let full = search.have_full_path();
        let mut cache = PathCache::new();
        search.finalize(&layer, &mut cache, Path::new(PathId(1), src, tgt, 0.0)).unwrap();
        let path = cache.get_live_path(PathId(1)).unwrap();

        prop_assert_eq!(path.source_point(), src);
        if same_node {
            prop_assert_eq!(path.points(), &[src, tgt][..]);
        }
        if full {
            prop_assert_eq!(path.target_point(), tgt);
        }
        if path.len() > 2 {
            for pair in path.points().windows(2) {
                prop_assert_ne!(pair[0].xz(), pair[1].xz());
            }
        }
    }

    #[test]
    fn separated_target_gives_partial_path((w, h, wall, src, tgt) in walled()) {
        let blocked: Vec<(i32, i32)> = (0..h).map(|z| (wall, z)).collect();
        let layer = grid_layer(w, h, &blocked);
        let (search, ok) = run(&layer, SearchType::AStar, src, tgt);

        prop_assert!(ok);
        prop_assert!(!search.have_full_path());
        prop_assert!(search.have_part_path());
        let reached = layer.node(search.target_node()).rect();
        prop_assert!(reached.max.x <= wall, "{} beyond wall {}", reached, wall);
        let centre = reached.world_center();
        prop_assert_eq!(search.target_point().xz(), centre.xz());
    }

    /// Only checked on uniform-cost terrain (free or blocked cells): the
    /// fixed heuristic weight assumes flat terrain and overestimates on
    /// faster cells, where A* may expand a few more nodes than Dijkstra.
    #[test]
    fn astar_never_expands_more_than_dijkstra((w, h, src, tgt, blocked) in scenario()) {
        let layer = grid_layer(w, h, &blocked);
        let (astar, a_ok) = run(&layer, SearchType::AStar, src, tgt);
        let (dijkstra, d_ok) = run(&layer, SearchType::Dijkstra, src, tgt);
        prop_assume!(a_ok && d_ok && astar.have_full_path() && dijkstra.have_full_path());
        prop_assert!(
            astar.nodes_expanded() <= dijkstra.nodes_expanded(),
            "A* {} > Dijkstra {}",
            astar.nodes_expanded(),
            dijkstra.nodes_expanded()
        );
    }

    #[test]
    fn smoothing_a_straight_run_is_idempotent(w in 2i32..24, x0 in 0.0f32..1.0, x1 in 0.0f32..1.0, z in 0.0f32..7.0) {
        let layer = grid_layer(w, 1, &[]);
        let span = w as f32 * SQUARE_SIZE - 1.0;
        let src = Vec3::new(x0 * span, 0.0, z);
        let tgt = Vec3::new(x1 * span, 0.0, z);
        let (search, ok) = run(&layer, SearchType::AStar, src, tgt);
        prop_assert!(ok);

        let (mut points, mut edges) = search.trace_path(&layer).unwrap();
        smooth_path(&layer, &mut points, &mut edges);
        let once = points.clone();
        smooth_path(&layer, &mut points, &mut edges);
        prop_assert_eq!(&points, &once);
        prop_assert_eq!(once, vec![src, tgt]);
    }
}
