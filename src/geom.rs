// Line and segment helpers shared by the polygon algebra.

use glam::DVec2;

/// Intersection of two infinite lines given as origin plus direction,
/// solved with Cramer's rule. Returns the parameters `(t1, t2)` such that
/// `o1 + t1*d1 == o2 + t2*d2`, or `None` for (near) parallel lines.
pub fn intersect_lines(o1: DVec2, d1: DVec2, o2: DVec2, d2: DVec2) -> Option<(f64, f64)> {
    let denom = d1.perp_dot(d2);
    if denom.abs() < 1e-9 {
        return None;
    }
    let r = o2 - o1;
    let t1 = (r.x * d2.y - r.y * d2.x) / denom;
    let t2 = (r.x * d1.y - r.y * d1.x) / denom;
    Some((t1, t2))
}

/// Intersection point of segments `p1->p2` and `p3->p4`, if any.
pub fn intersect_segments(p1: DVec2, p2: DVec2, p3: DVec2, p4: DVec2) -> Option<DVec2> {
    let (t, u) = intersect_lines(p1, p2 - p1, p3, p4 - p3)?;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(p1 + (p2 - p1) * t)
    } else {
        None
    }
}

/// Distance from `p` to the infinite line through `origin` with direction
/// `dir`.
pub fn distance_to_line(origin: DVec2, dir: DVec2, p: DVec2) -> f64 {
    let len = dir.length();
    if len < f64::EPSILON {
        return origin.distance(p);
    }
    (dir.perp_dot(p - origin) / len).abs()
}

/// Linear interpolation between two points.
pub fn lerp(a: DVec2, b: DVec2, ratio: f64) -> DVec2 {
    a + (b - a) * ratio
}

/// Which side of the directed line `origin + t*dir` the point lies on:
/// positive to the left, negative to the right.
pub fn side(origin: DVec2, dir: DVec2, p: DVec2) -> f64 {
    dir.perp_dot(p - origin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perpendicular_lines_cross() {
        let (t1, t2) = intersect_lines(
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 0.0),
            DVec2::new(2.0, -1.0),
            DVec2::new(0.0, 1.0),
        )
        .unwrap();
        assert!((t1 - 2.0).abs() < 1e-12);
        assert!((t2 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn parallel_lines_do_not_cross() {
        assert!(
            intersect_lines(
                DVec2::ZERO,
                DVec2::new(1.0, 1.0),
                DVec2::new(0.0, 1.0),
                DVec2::new(2.0, 2.0),
            )
            .is_none()
        );
    }

    #[test]
    fn segment_intersection_respects_extents() {
        let hit = intersect_segments(
            DVec2::new(0.0, 0.0),
            DVec2::new(2.0, 2.0),
            DVec2::new(0.0, 2.0),
            DVec2::new(2.0, 0.0),
        );
        assert_eq!(hit, Some(DVec2::new(1.0, 1.0)));

        let miss = intersect_segments(
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 0.0),
            DVec2::new(3.0, -1.0),
            DVec2::new(3.0, 1.0),
        );
        assert!(miss.is_none());
    }

    #[test]
    fn line_distance() {
        let d = distance_to_line(DVec2::ZERO, DVec2::new(1.0, 0.0), DVec2::new(5.0, 3.0));
        assert!((d - 3.0).abs() < 1e-12);
    }
}
