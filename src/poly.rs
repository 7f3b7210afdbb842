// Value-polygon algebra. These polygons own their coordinates; the shared
// city mesh lives in `mesh` and resolves to this type for measurement.

use glam::DVec2;

use crate::config;
use crate::geom;

/// Simple polygon with vertices in counter-clockwise order. The edge from
/// the last vertex back to the first is implicit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polygon(pub Vec<DVec2>);

impl Polygon {
    pub fn new(vertices: Vec<DVec2>) -> Self {
        Polygon(vertices)
    }

    /// Axis-aligned `w` by `h` rectangle centered on the origin.
    pub fn rect(w: f64, h: f64) -> Self {
        Polygon(vec![
            DVec2::new(-w / 2.0, -h / 2.0),
            DVec2::new(w / 2.0, -h / 2.0),
            DVec2::new(w / 2.0, h / 2.0),
            DVec2::new(-w / 2.0, h / 2.0),
        ])
    }

    /// Regular polygon approximating a circle of radius `r`.
    pub fn circle(r: f64) -> Self {
        let n = config::CIRCLE_SEGMENTS;
        Polygon(
            (0..n)
                .map(|i| {
                    let a = i as f64 / n as f64 * std::f64::consts::TAU;
                    DVec2::new(a.cos() * r, a.sin() * r)
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Signed area via the shoelace formula; positive for CCW winding.
    pub fn area(&self) -> f64 {
        let n = self.0.len();
        if n < 3 {
            return 0.0;
        }
        let mut sum = 0.0;
        for i in 0..n {
            let a = self.0[i];
            let b = self.0[(i + 1) % n];
            sum += a.x * b.y - b.x * a.y;
        }
        sum / 2.0
    }

    pub fn perimeter(&self) -> f64 {
        let n = self.0.len();
        (0..n)
            .map(|i| self.0[i].distance(self.0[(i + 1) % n]))
            .sum()
    }

    /// Arithmetic mean of the vertices.
    pub fn center(&self) -> DVec2 {
        if self.0.is_empty() {
            return DVec2::ZERO;
        }
        self.0.iter().sum::<DVec2>() / self.0.len() as f64
    }

    /// Area centroid.
    pub fn centroid(&self) -> DVec2 {
        let area = self.area();
        if self.0.len() < 3 || area.abs() < f64::EPSILON {
            return self.center();
        }
        let n = self.0.len();
        let mut c = DVec2::ZERO;
        for i in 0..n {
            let a = self.0[i];
            let b = self.0[(i + 1) % n];
            let w = a.x * b.y - b.x * a.y;
            c += (a + b) * w;
        }
        c / (6.0 * area)
    }

    /// `4*pi*area / perimeter^2`: 1 for a circle, less for anything
    /// elongated or concave.
    pub fn compactness(&self) -> f64 {
        let p = self.perimeter();
        if p < f64::EPSILON {
            return 0.0;
        }
        4.0 * std::f64::consts::PI * self.area() / (p * p)
    }

    pub fn is_convex(&self) -> bool {
        let n = self.0.len();
        if n < 4 {
            return n == 3;
        }
        for i in 0..n {
            let e0 = self.0[(i + 1) % n] - self.0[i];
            let e1 = self.0[(i + 2) % n] - self.0[(i + 1) % n];
            if e0.perp_dot(e1) < -1e-9 {
                return false;
            }
        }
        true
    }

    /// Index of the vertex starting the longest edge.
    pub fn longest_edge(&self) -> usize {
        let n = self.0.len();
        let mut best = 0;
        let mut best_len = -1.0;
        for i in 0..n {
            let len = self.0[i].distance(self.0[(i + 1) % n]);
            if len > best_len {
                best_len = len;
                best = i;
            }
        }
        best
    }

    /// Minimum distance from `p` to any vertex.
    pub fn distance(&self, p: DVec2) -> f64 {
        self.0
            .iter()
            .map(|v| v.distance(p))
            .fold(f64::INFINITY, f64::min)
    }

    /// Ray-casting point-in-polygon test.
    pub fn contains_point(&self, p: DVec2) -> bool {
        let n = self.0.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (vi, vj) = (self.0[i], self.0[j]);
            if ((vi.y > p.y) != (vj.y > p.y))
                && (p.x < (vj.x - vi.x) * (p.y - vi.y) / (vj.y - vi.y) + vi.x)
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    pub fn translate(&mut self, offset: DVec2) {
        for v in &mut self.0 {
            *v += offset;
        }
    }

    /// Rotates the polygon around the origin.
    pub fn rotate(&mut self, angle: f64) {
        let rot = DVec2::from_angle(angle);
        for v in &mut self.0 {
            *v = rot.rotate(*v);
        }
    }

    /// Weighted average of a vertex with its neighbours:
    /// `(prev + f*v + next) / (2 + f)`.
    pub fn smooth_vertex(&self, i: usize, f: f64) -> DVec2 {
        let n = self.0.len();
        let prev = self.0[(i + n - 1) % n];
        let next = self.0[(i + 1) % n];
        (prev + self.0[i] * f + next) / (2.0 + f)
    }

    /// Every vertex smoothed with the same factor.
    pub fn smooth_vertex_eq(&self, f: f64) -> Polygon {
        Polygon((0..self.0.len()).map(|i| self.smooth_vertex(i, f)).collect())
    }

    /// Inverse-distance weights of `p` with respect to the vertices; the
    /// weights sum to 1. A point coinciding with a vertex gets that whole
    /// weight.
    pub fn interpolate(&self, p: DVec2) -> Vec<f64> {
        let mut weights = Vec::with_capacity(self.0.len());
        for (i, v) in self.0.iter().enumerate() {
            let d = v.distance(p);
            if d < 1e-9 {
                let mut one_hot = vec![0.0; self.0.len()];
                one_hot[i] = 1.0;
                return one_hot;
            }
            weights.push(1.0 / d);
        }
        let sum: f64 = weights.iter().sum();
        for w in &mut weights {
            *w /= sum;
        }
        weights
    }

    fn dedup_consecutive(mut vertices: Vec<DVec2>) -> Vec<DVec2> {
        vertices.dedup_by(|a, b| a.distance(*b) < 1e-9);
        if vertices.len() > 1
            && vertices[0].distance(*vertices.last().unwrap()) < 1e-9
        {
            vertices.pop();
        }
        vertices
    }

    /// Splits the polygon by the infinite line through `a` and `b`.
    ///
    /// With exactly two boundary crossings the result is two polygons,
    /// the one left of `a -> b` first; otherwise the polygon is returned
    /// unchanged. `gap > 0` peels both halves back from the cut so a
    /// corridor of that total width separates them.
    pub fn cut(&self, a: DVec2, b: DVec2, gap: f64) -> Vec<Polygon> {
        let d = b - a;
        let n = self.0.len();
        let mut crossings: Vec<(usize, DVec2)> = Vec::new();
        for i in 0..n {
            let v0 = self.0[i];
            let v1 = self.0[(i + 1) % n];
            if let Some((_, u)) = geom::intersect_lines(a, d, v0, v1 - v0) {
                // half-open so a cut through a vertex is counted once
                if (0.0..1.0).contains(&u) {
                    crossings.push((i, v0 + (v1 - v0) * u));
                }
            }
        }
        if crossings.len() != 2 {
            return vec![self.clone()];
        }

        let (i1, x1) = crossings[0];
        let (i2, x2) = crossings[1];

        let walk = |from: usize, to: usize, head: DVec2, tail: DVec2| {
            let mut verts = vec![head];
            let mut k = (from + 1) % n;
            loop {
                verts.push(self.0[k]);
                if k == to {
                    break;
                }
                k = (k + 1) % n;
            }
            verts.push(tail);
            Polygon(Self::dedup_consecutive(verts))
        };

        let half_a = walk(i1, i2, x1, x2);
        let half_b = walk(i2, i1, x2, x1);
        if half_a.len() < 3
            || half_b.len() < 3
            || half_a.area().abs() < 1e-9
            || half_b.area().abs() < 1e-9
        {
            return vec![self.clone()];
        }

        let (left, right) = if geom::side(a, d, half_a.center()) >= 0.0 {
            (half_a, half_b)
        } else {
            (half_b, half_a)
        };

        if gap > 0.0 {
            // the closing edge of each half is the cut chord; a half too
            // thin to survive the peel is dropped
            [left, right]
                .into_iter()
                .map(|h| h.peel(h.len() - 1, gap / 2.0))
                .filter(|h| h.len() >= 3 && h.area() > 1e-9)
                .collect()
        } else {
            vec![left, right]
        }
    }

    /// Moves a single edge inward by `dist`, keeping all other edges.
    pub fn peel(&self, edge: usize, dist: f64) -> Polygon {
        let mut dists = vec![0.0; self.0.len()];
        dists[edge] = dist;
        self.buffer(&dists)
    }

    /// Insets every edge by its distance and clips with successive cuts.
    /// Intended for convex polygons; an inset that consumes the whole
    /// polygon yields an empty one.
    pub fn shrink(&self, dists: &[f64]) -> Polygon {
        let n = self.0.len();
        let mut q = self.clone();
        for i in 0..n {
            let dd = dists[i];
            if dd <= 0.0 {
                continue;
            }
            if q.len() < 3 {
                return Polygon::default();
            }
            let v0 = self.0[i];
            let v1 = self.0[(i + 1) % n];
            let edge = v1 - v0;
            let offset = edge.perp().normalize_or_zero() * dd;
            let halves = q.cut(v0 + offset, v1 + offset, 0.0);
            if halves.len() == 2 {
                q = halves.into_iter().next().unwrap();
            } else {
                let h = halves.into_iter().next().unwrap();
                if geom::side(v0 + offset, edge, h.center()) >= 0.0 {
                    q = h;
                } else {
                    return Polygon::default();
                }
            }
        }
        q
    }

    pub fn shrink_eq(&self, dist: f64) -> Polygon {
        self.shrink(&vec![dist; self.0.len()])
    }

    /// Insets every edge by its distance and rebuilds vertices as
    /// intersections of consecutive offset edges. Unlike [`Polygon::shrink`]
    /// this handles concave polygons.
    pub fn buffer(&self, dists: &[f64]) -> Polygon {
        let n = self.0.len();
        let lines: Vec<(DVec2, DVec2)> = (0..n)
            .map(|i| {
                let v0 = self.0[i];
                let v1 = self.0[(i + 1) % n];
                let dir = v1 - v0;
                (v0 + dir.perp().normalize_or_zero() * dists[i], dir)
            })
            .collect();
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let prev = (i + n - 1) % n;
            let v = match geom::intersect_lines(lines[prev].0, lines[prev].1, lines[i].0, lines[i].1)
            {
                Some((t, _)) => lines[prev].0 + lines[prev].1 * t,
                // parallel neighbours: keep the offset vertex itself
                None => lines[i].0,
            };
            out.push(v);
        }
        Polygon(Self::dedup_consecutive(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side: f64) -> Polygon {
        Polygon::rect(side, side)
    }

    #[test]
    fn shoelace_area_and_winding() {
        let p = square(4.0);
        assert!((p.area() - 16.0).abs() < 1e-12);
        assert!(p.is_convex());
        let reversed = Polygon(p.0.iter().rev().copied().collect());
        assert!(reversed.area() < 0.0);
    }

    #[test]
    fn compactness_of_circle_is_near_one() {
        let c = Polygon::circle(3.0);
        assert!(c.compactness() > 0.98);
        let thin = Polygon::rect(20.0, 1.0);
        assert!(thin.compactness() < 0.4);
    }

    #[test]
    fn zero_shrink_is_identity() {
        let p = square(6.0);
        let q = p.shrink(&[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(p, q);
    }

    #[test]
    fn shrink_square_insets_all_sides() {
        let p = square(10.0);
        let q = p.shrink_eq(1.0);
        assert!((q.area() - 64.0).abs() < 1e-6);
    }

    #[test]
    fn buffer_matches_shrink_on_convex_input() {
        let p = square(10.0);
        let a = p.shrink_eq(2.0);
        let b = p.buffer(&[2.0; 4]);
        assert!((a.area() - b.area()).abs() < 1e-6);
    }

    #[test]
    fn overshrink_consumes_the_polygon() {
        let p = square(2.0);
        assert!(p.shrink_eq(2.0).is_empty());
    }

    #[test]
    fn cut_preserves_total_area() {
        let p = square(8.0);
        let halves = p.cut(DVec2::new(-10.0, 1.3), DVec2::new(10.0, 0.7), 0.0);
        assert_eq!(halves.len(), 2);
        let total: f64 = halves.iter().map(|h| h.area()).sum();
        assert!((total - p.area()).abs() < 1e-9);
        // first half lies left of the cut direction
        assert!(geom::side(
            DVec2::new(-10.0, 1.3),
            DVec2::new(20.0, -0.6),
            halves[0].center()
        ) > 0.0);
    }

    #[test]
    fn cut_with_gap_removes_a_corridor() {
        let p = square(8.0);
        let halves = p.cut(DVec2::new(-10.0, 0.0), DVec2::new(10.0, 0.0), 1.0);
        assert_eq!(halves.len(), 2);
        let total: f64 = halves.iter().map(|h| h.area()).sum();
        // one unit of corridor across an 8-unit square
        assert!((total - (p.area() - 8.0)).abs() < 1e-6);
    }

    #[test]
    fn missed_cut_returns_original() {
        let p = square(2.0);
        let out = p.cut(DVec2::new(-5.0, 10.0), DVec2::new(5.0, 10.0), 0.0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], p);
    }

    #[test]
    fn smoothing_preserves_regular_shape() {
        // on a centered equilateral triangle prev + next == -v, so every
        // vertex contracts by exactly (f - 1) / (2 + f): the shape and
        // centroid are fixed, only the scale changes
        let tri = Polygon(vec![
            DVec2::new(0.0, 1.0),
            DVec2::new(-(3.0f64.sqrt()) / 2.0, -0.5),
            DVec2::new(3.0f64.sqrt() / 2.0, -0.5),
        ]);
        let smoothed = tri.smooth_vertex_eq(3.0);
        for (a, b) in tri.0.iter().zip(smoothed.0.iter()) {
            assert!(b.distance(*a * 0.4) < 1e-12);
        }
        assert!(smoothed.centroid().distance(tri.centroid()) < 1e-12);
        // still equilateral
        let d01 = smoothed.0[0].distance(smoothed.0[1]);
        let d12 = smoothed.0[1].distance(smoothed.0[2]);
        let d20 = smoothed.0[2].distance(smoothed.0[0]);
        assert!((d01 - d12).abs() < 1e-12 && (d12 - d20).abs() < 1e-12);
    }

    #[test]
    fn interpolate_weights_sum_to_one() {
        let p = square(4.0);
        let w = p.interpolate(DVec2::new(0.3, -0.2));
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        // center of a square weighs all corners equally
        let eq = p.interpolate(DVec2::ZERO);
        for w in eq {
            assert!((w - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn interpolate_at_vertex_is_one_hot() {
        let p = square(4.0);
        let w = p.interpolate(p.0[2]);
        assert_eq!(w[2], 1.0);
        assert_eq!(w.iter().sum::<f64>(), 1.0);
    }

    #[test]
    fn buffer_handles_concave_input() {
        // L-shaped block, counter-clockwise
        let l = Polygon(vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(4.0, 0.0),
            DVec2::new(4.0, 2.0),
            DVec2::new(2.0, 2.0),
            DVec2::new(2.0, 4.0),
            DVec2::new(0.0, 4.0),
        ]);
        assert!(!l.is_convex());
        let inset = l.buffer(&[0.2; 6]);
        assert_eq!(inset.len(), 6);
        assert!(inset.area() > 0.0);
        assert!(inset.area() < l.area());
    }

    #[test]
    fn point_containment() {
        let p = square(4.0);
        assert!(p.contains_point(DVec2::new(1.0, 1.0)));
        assert!(!p.contains_point(DVec2::new(3.0, 0.0)));
    }
}
