//! Post-processing of traced waypoints.
//!
//! Traced waypoints sit wherever the search happened to cross a node
//! border, which zig-zags through chains of similar nodes. Smoothing walks
//! the waypoints from target to source and slides each one along its
//! border towards the straight line between its neighbours, then drops
//! waypoints that no longer change the direction of travel.

use qtpfs_core::{SQUARE_SIZE, Vec3};

use crate::node::NodeId;
use crate::traits::NodeGraph;

/// Triplets at least this straight are left alone.
const STRAIGHT_DOT: f32 = 0.995;
/// Interior waypoints at least this collinear with their neighbours are
/// dropped.
const COLLINEAR_DOT: f32 = 0.9999;
const MIN_DIR: f32 = 0.001;

/// Slide, then collapse. `edges[i - 1]` holds the `(later, earlier)` node
/// pair whose shared border carries `points[i]`; both vectors shrink in
/// lockstep.
pub(crate) fn smooth_path<G: NodeGraph + ?Sized>(
    graph: &G,
    points: &mut Vec<Vec3>,
    edges: &mut Vec<(NodeId, NodeId)>,
) {
    slide_waypoints(graph, points, edges);
    collapse_collinear(points, edges);
}

#[inline]
fn dir(from: Vec3, to: Vec3) -> Vec3 {
    (to - from).xz().safe_normalize()
}

pub(crate) fn slide_waypoints<G: NodeGraph + ?Sized>(graph: &G, points: &mut [Vec3], edges: &[(NodeId, NodeId)]) {
    debug_assert_eq!(points.len(), edges.len() + 2);
    if points.len() <= 2 {
        return;
    }
    let s = SQUARE_SIZE;

    for i in (1..points.len() - 1).rev() {
        let (n0, n1) = edges[i - 1];
        let rel = graph.neighbor_relation(n0, n1);
        debug_assert!(!rel.is_empty(), "{n0} and {n1} do not touch");
        if rel.is_empty() {
            continue;
        }

        let p0 = points[i + 1];
        let p1 = points[i];
        let p2 = points[i - 1];

        let dot = dir(p0, p1).dot(dir(p1, p2));
        if dot >= STRAIGHT_DOT {
            continue;
        }

        let h_edge = rel.is_horizontal();
        let v_edge = rel.is_vertical();
        let r0 = graph.node_rect(n0);
        let r1 = graph.node_rect(n1);
        let xmin = r0.min.x.max(r1.min.x) as f32 * s;
        let xmax = r0.max.x.min(r1.max.x) as f32 * s;
        let zmin = r0.min.z.max(r1.min.z) as f32 * s;
        let zmax = r0.max.z.min(r1.max.z) as f32 * s;

        // Where the ray p0 -> p2 leaves n0.
        let p2p0 = dir(p0, p2);
        let dfx = if p2p0.x > 0.0 {
            r0.max.x as f32 * s - p0.x
        } else {
            r0.min.x as f32 * s - p0.x
        };
        let dfz = if p2p0.z > 0.0 {
            r0.max.z as f32 * s - p0.z
        } else {
            r0.min.z as f32 * s - p0.z
        };
        let dx = if p2p0.x.abs() > MIN_DIR { p2p0.x } else { MIN_DIR };
        let dz = if p2p0.z.abs() > MIN_DIR { p2p0.z } else { MIN_DIR };
        let tx = dfx / dx;
        let tz = dfz / dz;

        let mut pi = Vec3::new(0.0, p1.y, 0.0);
        if h_edge {
            pi.x = p0.x + p2p0.x * tz;
            pi.z = p1.z;
        }
        if v_edge {
            pi.x = p1.x;
            pi.z = p0.z + p2p0.z * tx;
        }
        if pi.is_finite() && (xmin..=xmax).contains(&pi.x) && (zmin..=zmax).contains(&pi.z) {
            points[i] = pi;
            continue;
        }

        // Corners have no edge to slide along.
        if h_edge == v_edge {
            continue;
        }

        let (mut e0, mut e1) = (p1, p1);
        if h_edge {
            e0.x = xmin;
            e1.x = xmax;
        } else {
            e0.z = zmin;
            e1.z = zmax;
        }
        let dot0 = dir(p0, e0).dot(dir(e0, p2));
        let dot1 = dir(p0, e1).dot(dir(e1, p2));
        if dot > dot0.max(dot1) {
            continue;
        }
        if dot0 > dot1.max(dot) {
            points[i] = e0;
        } else if dot1 > dot0.max(dot) {
            points[i] = e1;
        }
    }
}

/// Drop interior waypoints that coincide with a neighbour or sit on the
/// straight line between the previous kept waypoint and the next one.
pub(crate) fn collapse_collinear(points: &mut Vec<Vec3>, edges: &mut Vec<(NodeId, NodeId)>) {
    debug_assert_eq!(points.len(), edges.len() + 2);
    if points.len() <= 2 {
        return;
    }
    let last = points.len() - 1;
    let mut kept_points = Vec::with_capacity(points.len());
    let mut kept_edges = Vec::with_capacity(edges.len());
    kept_points.push(points[0]);

    for i in 1..last {
        let prev = kept_points[kept_points.len() - 1];
        let (p, next) = (points[i], points[i + 1]);
        if p.xz() == prev.xz() || p.xz() == next.xz() {
            continue;
        }
        if dir(prev, p).dot(dir(p, next)) >= COLLINEAR_DOT {
            continue;
        }
        kept_points.push(p);
        kept_edges.push(edges[i - 1]);
    }
    kept_points.push(points[last]);

    *points = kept_points;
    *edges = kept_edges;
}
