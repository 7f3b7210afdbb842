// Routing graph over the patch mesh: one node per unique mesh vertex,
// edges along patch boundaries, wall and citadel vertices blocked except
// at gates.

use std::collections::HashMap;

use glam::DVec2;

use crate::graph::{Graph, NodeId};
use crate::mesh::{Cell, VertexId, VertexPool};
use crate::patch::Patch;

#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub graph: Graph,
    node_of: HashMap<VertexId, NodeId>,
    /// Vertex behind each node, indexed by `NodeId`.
    pub node2pt: Vec<VertexId>,
    /// Nodes on city patches (border vertices excluded).
    pub inner: Vec<NodeId>,
    /// Nodes on countryside patches (border vertices excluded).
    pub outer: Vec<NodeId>,
}

impl Topology {
    pub fn build(
        pool: &VertexPool,
        patches: &[Patch],
        border: &Cell,
        wall_shape: Option<&Cell>,
        citadel_shape: Option<&Cell>,
        gates: &[VertexId],
    ) -> Topology {
        // wall and citadel vertices carry masonry: impassable unless they
        // are gates
        let mut blocked: Vec<VertexId> = Vec::new();
        if let Some(c) = citadel_shape {
            blocked.extend(&c.0);
        }
        if let Some(w) = wall_shape {
            blocked.extend(&w.0);
        }
        blocked.retain(|v| !gates.contains(v));

        let mut topo = Topology::default();

        for patch in patches {
            let n = patch.shape.len();
            if n < 2 {
                continue;
            }
            for i in 0..n {
                let v0 = patch.shape.0[i];
                let v1 = patch.shape.0[(i + 1) % n];
                let n0 = topo.process(v0, &blocked);
                let n1 = topo.process(v1, &blocked);

                if let Some(n0) = n0
                    && !border.contains(v0)
                {
                    let class = if patch.within_city {
                        &mut topo.inner
                    } else {
                        &mut topo.outer
                    };
                    if !class.contains(&n0) {
                        class.push(n0);
                    }
                }

                if let (Some(n0), Some(n1)) = (n0, n1) {
                    topo.graph
                        .link(n0, n1, pool.get(v0).distance(pool.get(v1)));
                }
            }
        }
        topo
    }

    fn process(&mut self, v: VertexId, blocked: &[VertexId]) -> Option<NodeId> {
        if blocked.contains(&v) {
            return None;
        }
        let node = match self.node_of.get(&v) {
            Some(&n) => n,
            None => {
                let n = self.graph.add_node();
                self.node_of.insert(v, n);
                self.node2pt.push(v);
                n
            }
        };
        Some(node)
    }

    pub fn node_at(&self, v: VertexId) -> Option<NodeId> {
        self.node_of.get(&v).copied()
    }

    /// Vertex of the node closest to `p` (first minimum wins).
    pub fn nearest_vertex(&self, pool: &VertexPool, p: DVec2) -> Option<VertexId> {
        let mut best: Option<(VertexId, f64)> = None;
        for &v in &self.node2pt {
            let d = pool.get(v).distance(p);
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((v, d));
            }
        }
        best.map(|(v, _)| v)
    }

    /// Shortest path between two mesh vertices, avoiding `exclude` nodes.
    pub fn path(
        &self,
        from: VertexId,
        to: VertexId,
        exclude: &[NodeId],
    ) -> Option<Vec<VertexId>> {
        let start = self.node_at(from)?;
        let goal = self.node_at(to)?;
        let nodes = self.graph.a_star(start, goal, exclude)?;
        Some(nodes.iter().map(|n| self.node2pt[n.0 as usize]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::VertexPool;

    /// Strip of three unit squares; the middle one is "the city".
    fn strip() -> (VertexPool, Vec<Patch>, Cell) {
        let mut pool = VertexPool::new();
        let mut v = |x: f64, y: f64| pool.add(DVec2::new(x, y));
        let (a0, a1, a2, a3) = (v(0.0, 0.0), v(1.0, 0.0), v(1.0, 1.0), v(0.0, 1.0));
        let (b1, b2) = (v(2.0, 0.0), v(2.0, 1.0));
        let (c1, c2) = (v(3.0, 0.0), v(3.0, 1.0));
        let left = Patch::new(0, Cell(vec![a0, a1, a2, a3]));
        let mut mid = Patch::new(1, Cell(vec![a1, b1, b2, a2]));
        mid.within_city = true;
        let right = Patch::new(2, Cell(vec![b1, c1, c2, b2]));
        let border = mid.shape.clone();
        (pool, vec![left, mid, right], border)
    }

    #[test]
    fn one_node_per_unique_vertex() {
        let (pool, patches, border) = strip();
        let topo = Topology::build(&pool, &patches, &border, None, None, &[]);
        // 8 distinct vertices across the three squares
        assert_eq!(topo.graph.len(), 8);
        assert_eq!(topo.node2pt.len(), 8);
    }

    #[test]
    fn border_vertices_join_neither_class() {
        let (pool, patches, border) = strip();
        let topo = Topology::build(&pool, &patches, &border, None, None, &[]);
        for v in &border.0 {
            let n = topo.node_at(*v).unwrap();
            assert!(!topo.inner.contains(&n));
            assert!(!topo.outer.contains(&n));
        }
        // the outer corners classify as outer
        assert!(!topo.outer.is_empty());
    }

    #[test]
    fn wall_vertices_are_blocked_except_gates() {
        let (pool, patches, border) = strip();
        let gate = border.0[0];
        let topo =
            Topology::build(&pool, &patches, &border, Some(&border), None, &[gate]);
        assert!(topo.node_at(gate).is_some());
        for v in border.0.iter().skip(1) {
            assert!(topo.node_at(*v).is_none(), "walled vertex has no node");
        }
    }

    #[test]
    fn paths_resolve_to_vertices() {
        let (pool, patches, border) = strip();
        let topo = Topology::build(&pool, &patches, &border, None, None, &[]);
        let from = patches[0].shape.0[0];
        let to = patches[2].shape.0[1];
        let path = topo.path(from, to, &[]).unwrap();
        assert_eq!(path.first(), Some(&from));
        assert_eq!(path.last(), Some(&to));
        assert!(path.len() >= 3);
    }

    #[test]
    fn exclusion_forces_the_long_way_or_none() {
        let (pool, patches, border) = strip();
        let topo = Topology::build(&pool, &patches, &border, None, None, &[]);
        let from = patches[0].shape.0[0];
        let to = patches[2].shape.0[1];
        // excluding every inner-square node cuts the strip in half
        let exclude: Vec<NodeId> = border
            .0
            .iter()
            .filter_map(|v| topo.node_at(*v))
            .collect();
        assert!(topo.path(from, to, &exclude).is_none());
    }
}
