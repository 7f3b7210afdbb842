// Curtain wall: the closed boundary around a set of patches, the gates cut
// into it and the towers flanking them. The wall polygon reuses the patch
// vertices, so smoothing it reshapes the bordering patches too.

use glam::DVec2;

use crate::config::SMOOTH_PATCH_BUDGET;
use crate::error::GenError;
use crate::mesh::{Cell, VertexId, VertexPool};
use crate::patch::Patch;
use crate::random::Minstd;

#[derive(Debug, Clone)]
pub struct CurtainWall {
    /// Physical walls (towers, gate spacing, outer road splits); false for
    /// the nominal border of an unwalled city.
    pub real: bool,
    pub shape: Cell,
    /// `segments[i]` is true when the edge starting at `shape[i]` carries
    /// actual wall.
    pub segments: Vec<bool>,
    pub gates: Vec<VertexId>,
    pub towers: Vec<VertexId>,
}

/// Boundary of a patch set: every directed patch edge whose reverse is not
/// held by any patch in the set, walked into a cycle. Vertex identity is
/// preserved.
pub fn find_circumference(cells: &[&Cell]) -> Cell {
    if cells.is_empty() {
        return Cell::default();
    }
    if cells.len() == 1 {
        return cells[0].clone();
    }

    let mut starts: Vec<VertexId> = Vec::new();
    let mut ends: Vec<VertexId> = Vec::new();
    for cell in cells {
        let n = cell.len();
        for i in 0..n {
            let a = cell.0[i];
            let b = cell.0[(i + 1) % n];
            let external = !cells.iter().any(|c| c.find_edge(b, a).is_some());
            if external {
                starts.push(a);
                ends.push(b);
            }
        }
    }
    if starts.is_empty() {
        return Cell::default();
    }

    let mut result = Vec::with_capacity(starts.len());
    let mut index = 0;
    for _ in 0..starts.len() {
        result.push(starts[index]);
        match starts.iter().position(|&s| s == ends[index]) {
            Some(next) if next != 0 => index = next,
            _ => break,
        }
    }
    Cell(result)
}

impl CurtainWall {
    /// Builds the wall around `enclosed` patches (given by id), selecting
    /// gates and, for real walls, splitting outer patches so every gate has
    /// a road corridor. `reserved` vertices are exempt from smoothing and
    /// gate placement.
    pub fn build(
        real: bool,
        pool: &mut VertexPool,
        patches: &mut Vec<Patch>,
        next_patch_id: &mut u32,
        enclosed: &[u32],
        reserved: &[VertexId],
        rng: &mut Minstd,
    ) -> Result<CurtainWall, GenError> {
        let shapes: Vec<&Cell> = patches
            .iter()
            .filter(|p| enclosed.contains(&p.id))
            .map(|p| &p.shape)
            .collect();
        let shape = find_circumference(&shapes);
        if shape.len() < 3 {
            return Err(GenError::BadWalledArea);
        }

        if real && enclosed.len() > 1 {
            // smooth the hull without breaking vertex identity: compute all
            // new positions from the unsmoothed outline, then write them
            // through the pool
            let factor = (SMOOTH_PATCH_BUDGET / enclosed.len() as f64).min(1.0);
            let outline = shape.to_polygon(pool);
            let targets: Vec<(VertexId, DVec2)> = shape
                .0
                .iter()
                .enumerate()
                .filter(|(_, v)| !reserved.contains(v))
                .map(|(i, &v)| (v, outline.smooth_vertex(i, factor)))
                .collect();
            for (v, p) in targets {
                pool.set(v, p);
            }
        }

        let mut wall = CurtainWall {
            real,
            shape,
            segments: Vec::new(),
            gates: Vec::new(),
            towers: Vec::new(),
        };
        wall.build_gates(pool, patches, next_patch_id, enclosed, reserved, rng)?;
        wall.build_segments(reserved);
        Ok(wall)
    }

    fn build_gates(
        &mut self,
        pool: &mut VertexPool,
        patches: &mut Vec<Patch>,
        next_patch_id: &mut u32,
        enclosed: &[u32],
        reserved: &[VertexId],
        rng: &mut Minstd,
    ) -> Result<(), GenError> {
        // gate candidates: multi-patch junctions on the hull (any hull
        // vertex for a single-patch wall), never reserved vertices
        let mut entrances: Vec<VertexId> = if enclosed.len() > 1 {
            self.shape
                .0
                .iter()
                .copied()
                .filter(|v| {
                    !reserved.contains(v)
                        && patches
                            .iter()
                            .filter(|p| enclosed.contains(&p.id) && p.shape.contains(*v))
                            .count()
                            > 1
                })
                .collect()
        } else {
            self.shape
                .0
                .iter()
                .copied()
                .filter(|v| !reserved.contains(v))
                .collect()
        };

        if entrances.is_empty() {
            return Err(GenError::BadWalledArea);
        }

        loop {
            let index = rng.index(entrances.len());
            let gate = entrances[index];
            self.gates.push(gate);

            if self.real {
                self.split_outer_patch(gate, pool, patches, next_patch_id, reserved);
            }

            // drop the pick and its neighbours so gates keep their
            // distance; the endpoint handling is positional on purpose
            if index == 0 {
                let k = entrances.len().min(2);
                entrances.drain(0..k);
                entrances.pop();
            } else if index == entrances.len() - 1 {
                entrances.truncate(index - 1);
                if !entrances.is_empty() {
                    entrances.remove(0);
                }
            } else {
                entrances.drain(index - 1..=index + 1);
            }

            if entrances.len() < 3 {
                break;
            }
        }

        if self.gates.is_empty() {
            return Err(GenError::BadWalledArea);
        }

        if self.real {
            for i in 0..self.gates.len() {
                let gate = self.gates[i];
                if let Some(p) = self.shape.smooth_vertex(pool, gate, 1.0) {
                    pool.set(gate, p);
                }
            }
        }
        Ok(())
    }

    /// When a gate faces a single outer patch, that patch is split along
    /// the chord from the gate to its outermost vertex so a road can pass.
    fn split_outer_patch(
        &self,
        gate: VertexId,
        pool: &VertexPool,
        patches: &mut Vec<Patch>,
        next_patch_id: &mut u32,
        reserved: &[VertexId],
    ) {
        let outer_ids: Vec<u32> = patches
            .iter()
            .filter(|p| !p.within_city && p.shape.contains(gate))
            .map(|p| p.id)
            .collect();
        if outer_ids.len() != 1 {
            return;
        }
        let outer_pos = patches.iter().position(|p| p.id == outer_ids[0]).unwrap();
        if patches[outer_pos].shape.len() <= 3 {
            return;
        }

        let (Some(next), Some(prev)) = (self.shape.next(gate), self.shape.prev(gate)) else {
            return;
        };
        let along = pool.get(next) - pool.get(prev);
        let outward = DVec2::new(along.y, -along.x);
        let gate_pos = pool.get(gate);

        let mut farthest: Option<(VertexId, f64)> = None;
        for &v in &patches[outer_pos].shape.0 {
            let score = if self.shape.contains(v) || reserved.contains(&v) {
                f64::NEG_INFINITY
            } else {
                let dir = pool.get(v) - gate_pos;
                let len = dir.length();
                if len < 1e-9 {
                    f64::NEG_INFINITY
                } else {
                    dir.dot(outward) / len
                }
            };
            if farthest.is_none_or(|(_, s)| score > s) {
                farthest = Some((v, score));
            }
        }
        let Some((far, score)) = farthest else { return };
        if score == f64::NEG_INFINITY {
            return;
        }

        if let Some(halves) = patches[outer_pos].shape.split(gate, far) {
            patches.remove(outer_pos);
            for half in halves {
                let patch = Patch::new(*next_patch_id, half);
                *next_patch_id += 1;
                patches.push(patch);
            }
        }
    }

    fn build_segments(&mut self, reserved: &[VertexId]) {
        let n = self.shape.len();
        self.segments = (0..n)
            .map(|i| {
                let a = self.shape.0[i];
                let b = self.shape.0[(i + 1) % n];
                let between_gates = self.gates.contains(&a) && self.gates.contains(&b);
                let citadel_interface = reserved.contains(&a) && reserved.contains(&b);
                !between_gates && !citadel_interface
            })
            .collect();
    }

    /// Towers stand on every non-gate corner that carries wall on at least
    /// one side. Only real walls get towers.
    pub fn build_towers(&mut self) {
        self.towers.clear();
        if !self.real {
            return;
        }
        let n = self.shape.len();
        for i in 0..n {
            let v = self.shape.0[i];
            if !self.gates.contains(&v) && (self.segments[(i + n - 1) % n] || self.segments[i]) {
                self.towers.push(v);
            }
        }
    }

    /// Largest distance from `center` to the wall.
    pub fn radius(&self, pool: &VertexPool, center: DVec2) -> f64 {
        self.shape
            .0
            .iter()
            .map(|&v| pool.get(v).distance(center))
            .fold(0.0, f64::max)
    }

    /// True when the cell shares an edge with the wall polygon.
    pub fn borders(&self, cell: &Cell) -> bool {
        self.shape.borders(cell)
    }

    /// True when the wall runs along the given edge (either direction).
    pub fn has_edge(&self, a: VertexId, b: VertexId) -> bool {
        self.shape.find_edge(a, b).is_some() || self.shape.find_edge(b, a).is_some()
    }
}
