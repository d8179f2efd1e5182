//! Geometric collision tests
//!
//! Segment intersection for ship-vs-barrier sweeps and the swept
//! closest-approach test for bolt-vs-ship hits.

use crate::game::position::PositionVector;
use crate::util::vec2::Vector2;

/// Cross products smaller than this are treated as parallel
const PARALLEL_EPSILON: f64 = 1e-12;

/// Relative speeds (squared) below this are treated as no relative motion
const STATIONARY_EPSILON: f64 = 1e-18;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentHit {
    /// Fraction along the first segment
    pub t: f64,
    /// Fraction along the second segment
    pub u: f64,
    pub point: Vector2,
}

/// Parametric intersection of p1→p2 with q1→q2. Parallel and collinear
/// segments never intersect.
pub fn segment_intersection(p1: Vector2, p2: Vector2, q1: Vector2, q2: Vector2) -> Option<SegmentHit> {
    let r = p2 - p1;
    let s = q2 - q1;
    let denom = r.cross(s);
    if denom.abs() < PARALLEL_EPSILON {
        return None;
    }
    let qp = q1 - p1;
    let t = qp.cross(s) / denom;
    let u = qp.cross(r) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(SegmentHit {
            t,
            u,
            point: p1 + r * t,
        })
    } else {
        None
    }
}

/// Start point, velocity (units/sec) and start time of the last tracked segment
fn tracked_segment(pv: &PositionVector) -> (Vector2, Vector2, u64) {
    let start_ts = pv.previous_timestamp();
    let end_ts = pv.timestamp();
    if end_ts > start_ts {
        let dt = (end_ts - start_ts) as f64 / 1000.0;
        (
            pv.previous_position(),
            (pv.position() - pv.previous_position()) * (1.0 / dt),
            start_ts,
        )
    } else {
        (pv.position(), pv.velocity(), end_ts)
    }
}

/// Whether two tracked bodies come within `radius` of each other during the
/// `window_ms` following their most recent common sample time.
///
/// Each side is reduced to its last tracked segment. The side whose segment
/// started earlier is extrapolated forward with its own velocity so both are
/// compared at the same instant.
pub fn swept_hit(a: &PositionVector, b: &PositionVector, radius: f64, window_ms: u64) -> bool {
    let (pa, va, ta) = tracked_segment(a);
    let (pb, vb, tb) = tracked_segment(b);

    let t0 = ta.max(tb);
    let pa = pa + va * ((t0 - ta) as f64 / 1000.0);
    let pb = pb + vb * ((t0 - tb) as f64 / 1000.0);

    let dp = pb - pa;
    let dv = vb - va;
    let dv_sq = dv.magnitude_sq();
    if dv_sq < STATIONARY_EPSILON {
        return dp.magnitude() <= radius;
    }

    let t = -dp.dot(dv) / dv_sq;
    if t * 1000.0 > window_ms as f64 {
        return false;
    }
    // Closest approach already behind us: the separation now is the minimum
    let t = t.max(0.0);
    (dp + dv * t).magnitude() <= radius
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::position::{BoundaryPolicy, MotionParams};

    fn tracked(x: f64, y: f64, vx: f64, vy: f64, from: u64, to: u64) -> PositionVector {
        let mut pv = PositionVector::new(
            Vector2::cartesian(x, y),
            Vector2::cartesian(vx, vy),
            from,
            MotionParams {
                boundary: BoundaryPolicy::Ignore,
                max_speed: None,
                dampening: 0.0,
                min_resolution: 1e-12,
            },
        );
        pv.update(to);
        pv
    }

    #[test]
    fn test_crossing_segments() {
        let hit = segment_intersection(
            Vector2::cartesian(0.0, 0.0),
            Vector2::cartesian(1.0, 1.0),
            Vector2::cartesian(0.0, 1.0),
            Vector2::cartesian(1.0, 0.0),
        )
        .unwrap();
        assert!((hit.t - 0.5).abs() < 1e-12);
        assert!((hit.u - 0.5).abs() < 1e-12);
        assert!(hit.point.approx_eq(Vector2::cartesian(0.5, 0.5), 1e-12));
    }

    #[test]
    fn test_disjoint_and_parallel_segments() {
        let a = Vector2::cartesian(0.0, 0.0);
        let b = Vector2::cartesian(1.0, 0.0);
        assert!(segment_intersection(a, b, Vector2::cartesian(0.0, 1.0), Vector2::cartesian(1.0, 1.0)).is_none());
        assert!(segment_intersection(a, b, Vector2::cartesian(2.0, -1.0), Vector2::cartesian(2.0, 1.0)).is_none());
    }

    #[test]
    fn test_head_on_hit() {
        // Bolt flying right towards a stationary ship
        let bolt = tracked(0.40, 0.5, 0.5, 0.0, 0, 50);
        let ship = tracked(0.42, 0.5, 0.0, 0.0, 0, 50);
        assert!(swept_hit(&bolt, &ship, 0.01, 50));
    }

    #[test]
    fn test_passes_through_within_one_tick() {
        // Bolt jumps from one side of the ship to the other in a single tick
        let bolt = tracked(0.40, 0.5, 2.0, 0.0, 0, 50);
        let ship = tracked(0.45, 0.5, 0.0, 0.0, 0, 50);
        assert!(bolt.position().x() > 0.45);
        assert!(swept_hit(&bolt, &ship, 0.01, 50));
    }

    #[test]
    fn test_miss_sideways() {
        let bolt = tracked(0.40, 0.5, 0.5, 0.0, 0, 50);
        let ship = tracked(0.44, 0.6, 0.0, 0.0, 0, 50);
        assert!(!swept_hit(&bolt, &ship, 0.01, 50));
    }

    #[test]
    fn test_closest_approach_beyond_window() {
        let bolt = tracked(0.1, 0.5, 0.1, 0.0, 0, 50);
        let ship = tracked(0.9, 0.5, 0.0, 0.0, 0, 50);
        assert!(!swept_hit(&bolt, &ship, 0.01, 50));
    }

    #[test]
    fn test_time_skew_extrapolates_older_sample() {
        // Ship sample is 100ms older; it was drifting towards the bolt's path
        let ship = tracked(0.5, 0.40, 0.0, 0.5, 0, 50);
        let bolt = tracked(0.48, 0.47, 0.5, 0.0, 100, 150);
        assert!(swept_hit(&bolt, &ship, 0.012, 50));
    }

    #[test]
    fn test_no_relative_motion_uses_distance() {
        let a = tracked(0.5, 0.5, 0.1, 0.0, 0, 50);
        let near = tracked(0.505, 0.5, 0.1, 0.0, 0, 50);
        let far = tracked(0.6, 0.5, 0.1, 0.0, 0, 50);
        assert!(swept_hit(&a, &near, 0.01, 50));
        assert!(!swept_hit(&a, &far, 0.01, 50));
    }
}
