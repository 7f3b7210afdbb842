// Shared-vertex mesh. Patches, walls and streets all hold `VertexId`
// handles into one `VertexPool`, so moving a vertex moves it for every
// incident shape and "the same corner" is an id comparison, immune to
// coordinate drift from smoothing.

use glam::DVec2;

use crate::poly::Polygon;

/// Handle to a vertex in the [`VertexPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub u32);

/// Arena of mesh vertices.
#[derive(Debug, Clone, Default)]
pub struct VertexPool {
    points: Vec<DVec2>,
}

impl VertexPool {
    pub fn new() -> Self {
        VertexPool::default()
    }

    pub fn add(&mut self, p: DVec2) -> VertexId {
        self.points.push(p);
        VertexId(self.points.len() as u32 - 1)
    }

    pub fn get(&self, id: VertexId) -> DVec2 {
        self.points[id.0 as usize]
    }

    /// Moves a vertex; every shape holding the id observes the move.
    pub fn set(&mut self, id: VertexId, p: DVec2) {
        self.points[id.0 as usize] = p;
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Closed polygon over pooled vertices, counter-clockwise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell(pub Vec<VertexId>);

impl Cell {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, v: VertexId) -> bool {
        self.0.contains(&v)
    }

    pub fn index_of(&self, v: VertexId) -> Option<usize> {
        self.0.iter().position(|&x| x == v)
    }

    /// Vertex following `v` along the boundary.
    pub fn next(&self, v: VertexId) -> Option<VertexId> {
        self.index_of(v).map(|i| self.0[(i + 1) % self.0.len()])
    }

    /// Vertex preceding `v` along the boundary.
    pub fn prev(&self, v: VertexId) -> Option<VertexId> {
        self.index_of(v)
            .map(|i| self.0[(i + self.0.len() - 1) % self.0.len()])
    }

    /// Index of the directed edge `a -> b`, if present.
    pub fn find_edge(&self, a: VertexId, b: VertexId) -> Option<usize> {
        let n = self.0.len();
        (0..n).find(|&i| self.0[i] == a && self.0[(i + 1) % n] == b)
    }

    /// True when the two cells share an edge (in either direction).
    pub fn borders(&self, other: &Cell) -> bool {
        let n = self.0.len();
        (0..n).any(|i| {
            let a = self.0[i];
            let b = self.0[(i + 1) % n];
            other.find_edge(b, a).is_some() || other.find_edge(a, b).is_some()
        })
    }

    /// Splits along the chord between two existing vertices. Both halves
    /// keep the chord vertices, so the halves share them by identity.
    pub fn split(&self, a: VertexId, b: VertexId) -> Option<[Cell; 2]> {
        let i = self.index_of(a)?;
        let j = self.index_of(b)?;
        if i == j {
            return None;
        }
        let n = self.0.len();
        let mut first = Vec::new();
        let mut k = i;
        loop {
            first.push(self.0[k]);
            if k == j {
                break;
            }
            k = (k + 1) % n;
        }
        let mut second = Vec::new();
        let mut k = j;
        loop {
            second.push(self.0[k]);
            if k == i {
                break;
            }
            k = (k + 1) % n;
        }
        if first.len() < 3 || second.len() < 3 {
            return None;
        }
        Some([Cell(first), Cell(second)])
    }

    /// Resolves the ids into a coordinate polygon.
    pub fn to_polygon(&self, pool: &VertexPool) -> Polygon {
        Polygon(self.0.iter().map(|&v| pool.get(v)).collect())
    }

    pub fn area(&self, pool: &VertexPool) -> f64 {
        self.to_polygon(pool).area()
    }

    pub fn center(&self, pool: &VertexPool) -> DVec2 {
        self.to_polygon(pool).center()
    }

    pub fn centroid(&self, pool: &VertexPool) -> DVec2 {
        self.to_polygon(pool).centroid()
    }

    pub fn compactness(&self, pool: &VertexPool) -> f64 {
        self.to_polygon(pool).compactness()
    }

    /// Minimum vertex distance to `p`.
    pub fn distance(&self, pool: &VertexPool, p: DVec2) -> f64 {
        self.to_polygon(pool).distance(p)
    }

    /// Smoothed position of vertex `v` (the cell is unchanged).
    pub fn smooth_vertex(&self, pool: &VertexPool, v: VertexId, f: f64) -> Option<DVec2> {
        let i = self.index_of(v)?;
        Some(self.to_polygon(pool).smooth_vertex(i, f))
    }

    /// Reverses the winding if the resolved polygon is clockwise.
    pub fn make_ccw(&mut self, pool: &VertexPool) {
        if self.area(pool) < 0.0 {
            self.0.reverse();
        }
    }

    /// Number of distinct vertex ids.
    pub fn distinct_len(&self) -> usize {
        let mut seen: Vec<VertexId> = Vec::with_capacity(self.0.len());
        for &v in &self.0 {
            if !seen.contains(&v) {
                seen.push(v);
            }
        }
        seen.len()
    }
}
