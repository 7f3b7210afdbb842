// The six-stage pipeline: seed points -> Voronoi patches -> junction
// optimization -> walls and gates -> street topology -> wards -> building
// geometry. Any geometric dead end aborts the attempt; the model reseeds
// and rebuilds from scratch.

use glam::DVec2;
use rand::Rng as _;
use tracing::{debug, debug_span, warn};

use crate::building::{self, BuildingCtx};
use crate::config::{
    CITADEL_MIN_COMPACTNESS, JUNCTION_THRESHOLD, POINTS_PER_PATCH, PRUNE_RADIUS_FACTOR,
    RELAX_ROUNDS, SPIRAL_RADIUS_STEP, TRY_COUNT,
};
use crate::error::GenError;
use crate::mesh::{Cell, VertexId, VertexPool};
use crate::patch::Patch;
use crate::random::Minstd;
use crate::topology::Topology;
use crate::voronoi::{self, Voronoi};
use crate::wall::CurtainWall;
use crate::wards::{self, RatingCtx, Ward, WardKind, TEMPLATE};

/// Advisory size taxonomy over the patch count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitySize {
    SmallTown,
    LargeTown,
    SmallCity,
    LargeCity,
    Metropolis,
}

impl CitySize {
    pub fn from_patches(n: u32) -> CitySize {
        match n {
            0..=9 => CitySize::SmallTown,
            10..=14 => CitySize::LargeTown,
            15..=23 => CitySize::SmallCity,
            24..=39 => CitySize::LargeCity,
            _ => CitySize::Metropolis,
        }
    }
}

/// A generated city. Read-only after construction.
#[derive(Debug, Clone)]
pub struct Model {
    n_patches: u32,
    seed: i64,
    pool: VertexPool,
    patches: Vec<Patch>,
    inner: Vec<u32>,
    plaza: Option<u32>,
    citadel: Option<u32>,
    center: VertexId,
    border: CurtainWall,
    walls_real: bool,
    citadel_wall: Option<CurtainWall>,
    gates: Vec<VertexId>,
    topology: Topology,
    streets: Vec<Vec<VertexId>>,
    roads: Vec<Vec<VertexId>>,
    arteries: Vec<Vec<VertexId>>,
    city_radius: f64,
}

impl Model {
    pub(crate) fn generate(size: u32, seed: i64) -> Result<Model, GenError> {
        let seed = if seed <= 0 {
            rand::rng().random_range(1..=i32::MAX as i64)
        } else {
            seed
        };
        Model::generate_seeded(size, seed, None)
    }

    /// Builds with the plaza/citadel/walls feature flags pinned instead of
    /// drawn from the stream.
    pub fn generate_with_features(
        size: u32,
        seed: i64,
        plaza: bool,
        citadel: bool,
        walls: bool,
    ) -> Result<Model, GenError> {
        let seed = if seed <= 0 { 1 } else { seed };
        Model::generate_seeded(size, seed, Some((plaza, citadel, walls)))
    }

    fn generate_seeded(
        size: u32,
        seed: i64,
        features: Option<(bool, bool, bool)>,
    ) -> Result<Model, GenError> {
        let n_patches = size.max(1) as usize;
        let mut rng = Minstd::new(seed);
        let (plaza_needed, citadel_needed, walls_needed) = match features {
            Some(flags) => flags,
            None => (rng.chance(0.5), rng.chance(0.5), rng.chance(0.5)),
        };

        for attempt in 1..=TRY_COUNT {
            let span = debug_span!("build", attempt, n_patches, seed).entered();
            let builder = Builder::new(
                n_patches,
                plaza_needed,
                citadel_needed,
                walls_needed,
                rng.clone(),
            );
            match builder.build(seed) {
                Ok(model) => {
                    debug!(
                        patches = model.patches.len(),
                        gates = model.gates.len(),
                        "city built"
                    );
                    return Ok(model);
                }
                Err((err, mut spent)) => {
                    drop(span);
                    warn!(%err, attempt, "build attempt failed, reseeding");
                    // derive the next attempt's seed from the stream itself
                    let reseed = spent.int(1, 0x7FFF_FFFE);
                    spent.reset(reseed);
                    rng = spent;
                }
            }
        }
        Err(GenError::RetriesExhausted(TRY_COUNT))
    }

    // -- accessors ---------------------------------------------------------

    pub fn n_patches(&self) -> u32 {
        self.n_patches
    }

    pub fn seed(&self) -> i64 {
        self.seed
    }

    pub fn city_size(&self) -> CitySize {
        CitySize::from_patches(self.n_patches)
    }

    pub fn pool(&self) -> &VertexPool {
        &self.pool
    }

    pub fn vertex(&self, id: VertexId) -> DVec2 {
        self.pool.get(id)
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    fn patch_by_id(&self, id: u32) -> Option<&Patch> {
        self.patches.iter().find(|p| p.id == id)
    }

    /// The originally-inner patches, in creation order.
    pub fn inner(&self) -> Vec<&Patch> {
        self.inner
            .iter()
            .filter_map(|&id| self.patch_by_id(id))
            .collect()
    }

    pub fn plaza(&self) -> Option<&Patch> {
        self.plaza.and_then(|id| self.patch_by_id(id))
    }

    pub fn citadel(&self) -> Option<&Patch> {
        self.citadel.and_then(|id| self.patch_by_id(id))
    }

    pub fn center(&self) -> DVec2 {
        self.pool.get(self.center)
    }

    pub fn border(&self) -> &CurtainWall {
        &self.border
    }

    /// The curtain wall, when the city has a real one.
    pub fn wall(&self) -> Option<&CurtainWall> {
        self.walls_real.then_some(&self.border)
    }

    pub fn citadel_wall(&self) -> Option<&CurtainWall> {
        self.citadel_wall.as_ref()
    }

    pub fn gates(&self) -> &[VertexId] {
        &self.gates
    }

    pub fn gate_positions(&self) -> Vec<DVec2> {
        self.gates.iter().map(|&g| self.pool.get(g)).collect()
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn streets(&self) -> &[Vec<VertexId>] {
        &self.streets
    }

    pub fn roads(&self) -> &[Vec<VertexId>] {
        &self.roads
    }

    pub fn arteries(&self) -> &[Vec<VertexId>] {
        &self.arteries
    }

    fn resolve(&self, lines: &[Vec<VertexId>]) -> Vec<Vec<DVec2>> {
        lines
            .iter()
            .map(|line| line.iter().map(|&v| self.pool.get(v)).collect())
            .collect()
    }

    pub fn street_points(&self) -> Vec<Vec<DVec2>> {
        self.resolve(&self.streets)
    }

    pub fn road_points(&self) -> Vec<Vec<DVec2>> {
        self.resolve(&self.roads)
    }

    pub fn artery_points(&self) -> Vec<Vec<DVec2>> {
        self.resolve(&self.arteries)
    }

    pub fn city_radius(&self) -> f64 {
        self.city_radius
    }
}

// -- pipeline ---------------------------------------------------------------

struct Builder {
    n_patches: usize,
    plaza_needed: bool,
    citadel_needed: bool,
    walls_needed: bool,
    rng: Minstd,
    next_patch_id: u32,
    pool: VertexPool,
    patches: Vec<Patch>,
    inner: Vec<u32>,
    plaza: Option<u32>,
    citadel: Option<u32>,
    center: Option<VertexId>,
    border: Option<CurtainWall>,
    citadel_wall: Option<CurtainWall>,
    gates: Vec<VertexId>,
    topology: Topology,
    streets: Vec<Vec<VertexId>>,
    roads: Vec<Vec<VertexId>>,
    arteries: Vec<Vec<VertexId>>,
    city_radius: f64,
}

impl Builder {
    fn new(
        n_patches: usize,
        plaza_needed: bool,
        citadel_needed: bool,
        walls_needed: bool,
        rng: Minstd,
    ) -> Builder {
        Builder {
            n_patches,
            plaza_needed,
            citadel_needed,
            walls_needed,
            rng,
            next_patch_id: 0,
            pool: VertexPool::new(),
            patches: Vec::new(),
            inner: Vec::new(),
            plaza: None,
            citadel: None,
            center: None,
            border: None,
            citadel_wall: None,
            gates: Vec::new(),
            topology: Topology::default(),
            streets: Vec::new(),
            roads: Vec::new(),
            arteries: Vec::new(),
            city_radius: 0.0,
        }
    }

    /// Runs stages 1-6. On failure the consumed rng is handed back so the
    /// retry loop can reseed from it.
    fn build(mut self, seed: i64) -> Result<Model, (GenError, Minstd)> {
        let result = (|| -> Result<(), GenError> {
            self.build_patches()?;
            debug!(patches = self.patches.len(), "patches built");
            self.optimize_junctions()?;
            self.build_walls()?;
            debug!(gates = self.gates.len(), "walls built");
            self.build_streets()?;
            debug!(
                streets = self.streets.len(),
                roads = self.roads.len(),
                arteries = self.arteries.len(),
                "streets built"
            );
            self.create_wards();
            self.build_geometry();
            Ok(())
        })();

        match result {
            Ok(()) => Ok(Model {
                n_patches: self.n_patches as u32,
                seed,
                pool: self.pool,
                patches: self.patches,
                inner: self.inner,
                plaza: self.plaza,
                citadel: self.citadel,
                center: self.center.expect("set by build_patches"),
                border: self.border.expect("set by build_walls"),
                walls_real: self.walls_needed,
                citadel_wall: self.citadel_wall,
                gates: self.gates,
                topology: self.topology,
                streets: self.streets,
                roads: self.roads,
                arteries: self.arteries,
                city_radius: self.city_radius,
            }),
            Err(err) => Err((err, self.rng)),
        }
    }

    fn pos_of(&self, id: u32) -> Option<usize> {
        self.patches.iter().position(|p| p.id == id)
    }

    // Stage 1: spiral seed cloud, Lloyd-relaxed core, Voronoi partition.
    fn build_patches(&mut self) -> Result<(), GenError> {
        let count = self.n_patches * POINTS_PER_PATCH;
        let mut seeds = Vec::with_capacity(count);
        for i in 0..count {
            // only the radius draws randomness; the spiral phase is fixed
            let a = 5.0 * (i as f64).sqrt();
            let r = if i == 0 {
                0.0
            } else {
                SPIRAL_RADIUS_STEP + i as f64 * (2.0 + self.rng.float())
            };
            seeds.push(DVec2::new(a.cos() * r, a.sin() * r));
        }

        // settle the future plaza and citadel lots into rounder shapes
        let targets = [0, 1, 2, self.n_patches];
        for _ in 0..RELAX_ROUNDS {
            voronoi::relax(&mut seeds, &targets);
        }

        seeds.sort_by(|a, b| a.length().total_cmp(&b.length()));
        let voronoi = Voronoi::build(&seeds);

        for (seed_idx, cell) in voronoi.partition(&mut self.pool) {
            let id = self.next_patch_id;
            self.next_patch_id += 1;
            let mut patch = Patch::new(id, cell);

            if seed_idx == 0 {
                let central = patch
                    .shape
                    .0
                    .iter()
                    .copied()
                    .min_by(|a, b| {
                        self.pool
                            .get(*a)
                            .length()
                            .total_cmp(&self.pool.get(*b).length())
                    })
                    .unwrap();
                self.center = Some(central);
                if self.plaza_needed {
                    self.plaza = Some(id);
                }
            } else if seed_idx == self.n_patches && self.citadel_needed {
                self.citadel = Some(id);
                patch.within_city = true;
            }

            if seed_idx < self.n_patches {
                patch.within_city = true;
                patch.within_walls = self.walls_needed;
                self.inner.push(id);
            }
            self.patches.push(patch);
        }

        // an unbounded core region means the point cloud degenerated
        if self.center.is_none()
            || self.inner.len() < self.n_patches
            || (self.citadel_needed && self.citadel.is_none())
        {
            return Err(GenError::DegeneratePatch);
        }
        Ok(())
    }

    // Stage 2: collapse city-patch edges shorter than the junction
    // threshold, merging the endpoints for every patch that shares them.
    fn optimize_junctions(&mut self) -> Result<(), GenError> {
        let mut targets: Vec<u32> = self.inner.clone();
        if let Some(c) = self.citadel
            && !targets.contains(&c)
        {
            targets.push(c);
        }

        let mut to_clean: Vec<u32> = Vec::new();
        for &pid in &targets {
            let Some(pos) = self.pos_of(pid) else { continue };
            let mut index = 0;
            while index < self.patches[pos].shape.len() {
                let len = self.patches[pos].shape.len();
                if len < 3 {
                    break;
                }
                let v0 = self.patches[pos].shape.0[index];
                let v1 = self.patches[pos].shape.0[(index + 1) % len];

                if v0 != v1
                    && self.pool.get(v0).distance(self.pool.get(v1)) < JUNCTION_THRESHOLD
                {
                    // every other patch holding v1 now holds v0
                    for p in &mut self.patches {
                        if p.id == pid {
                            continue;
                        }
                        let mut changed = false;
                        for slot in &mut p.shape.0 {
                            if *slot == v1 {
                                *slot = v0;
                                changed = true;
                            }
                        }
                        if changed && !to_clean.contains(&p.id) {
                            to_clean.push(p.id);
                        }
                    }

                    // the merged vertex moves to the midpoint, in place
                    let mid = (self.pool.get(v0) + self.pool.get(v1)) * 0.5;
                    self.pool.set(v0, mid);

                    let shape = &mut self.patches[pos].shape.0;
                    if let Some(at) = shape.iter().position(|&v| v == v1) {
                        shape.remove(at);
                    }
                }
                index += 1;
            }
        }

        // merging can leave repeated ids in neighbouring patches
        for pid in to_clean {
            if let Some(pos) = self.pos_of(pid) {
                let shape = &mut self.patches[pos].shape.0;
                let mut i = 0;
                while i < shape.len() {
                    let v = shape[i];
                    while let Some(dup) =
                        shape[i + 1..].iter().position(|&x| x == v)
                    {
                        shape.remove(i + 1 + dup);
                    }
                    i += 1;
                }
            }
        }

        for &pid in &targets {
            if let Some(pos) = self.pos_of(pid)
                && self.patches[pos].shape.distinct_len() < 3
            {
                return Err(GenError::DegeneratePatch);
            }
        }
        Ok(())
    }

    // Stage 3: curtain wall around the inner patches, gates, towers, the
    // citadel's own wall, and pruning of far-flung countryside.
    fn build_walls(&mut self) -> Result<(), GenError> {
        let reserved: Vec<VertexId> = match self.citadel.and_then(|id| self.pos_of(id)) {
            Some(pos) => self.patches[pos].shape.0.clone(),
            None => Vec::new(),
        };

        let mut border = CurtainWall::build(
            self.walls_needed,
            &mut self.pool,
            &mut self.patches,
            &mut self.next_patch_id,
            &self.inner,
            &reserved,
            &mut self.rng,
        )?;
        if self.walls_needed {
            border.build_towers();
        }

        let center = self.pool.get(self.center.expect("stage 1 ran"));
        let radius = border.radius(&self.pool, center);
        let pool = &self.pool;
        self.patches
            .retain(|p| p.shape.distance(pool, center) < radius * PRUNE_RADIUS_FACTOR);

        self.gates = border.gates.clone();

        if let Some(cid) = self.citadel {
            let pos = self.pos_of(cid).ok_or(GenError::DegeneratePatch)?;
            let citadel_reserved: Vec<VertexId> = self.patches[pos]
                .shape
                .0
                .iter()
                .copied()
                .filter(|v| border.shape.contains(*v))
                .collect();

            let mut castle_wall = CurtainWall::build(
                true,
                &mut self.pool,
                &mut self.patches,
                &mut self.next_patch_id,
                &[cid],
                &citadel_reserved,
                &mut self.rng,
            )?;
            castle_wall.build_towers();

            let pos = self.pos_of(cid).ok_or(GenError::DegeneratePatch)?;
            let compactness = self.patches[pos].shape.compactness(&self.pool);
            if compactness < CITADEL_MIN_COMPACTNESS {
                return Err(GenError::BadCitadelShape(compactness));
            }

            self.gates.extend(castle_wall.gates.iter().copied());
            self.patches[pos].ward = Some(Ward::new(WardKind::Castle));
            self.citadel_wall = Some(castle_wall);
        }

        self.border = Some(border);
        Ok(())
    }

    // Stage 4: routing graph, one street per gate toward the plaza, outer
    // roads, then dedupe and merge into smoothed arteries.
    fn build_streets(&mut self) -> Result<(), GenError> {
        let border = self.border.as_ref().expect("stage 3 ran");
        let wall_shape = if self.walls_needed {
            Some(&border.shape)
        } else {
            None
        };
        let citadel_shape: Option<&Cell> = self
            .citadel
            .and_then(|id| self.patches.iter().find(|p| p.id == id))
            .map(|p| &p.shape);

        self.topology = Topology::build(
            &self.pool,
            &self.patches,
            &border.shape,
            wall_shape,
            citadel_shape,
            &self.gates,
        );

        let plaza_shape = self
            .plaza
            .and_then(|id| self.patches.iter().find(|p| p.id == id))
            .map(|p| p.shape.clone());
        let center = self.center.expect("stage 1 ran");

        let mut streets = Vec::new();
        let mut roads = Vec::new();
        for &gate in &self.gates {
            let gate_pos = self.pool.get(gate);
            // streets run to the plaza edge nearest the gate, or the center
            let end = match &plaza_shape {
                Some(shape) => shape
                    .0
                    .iter()
                    .copied()
                    .min_by(|a, b| {
                        self.pool
                            .get(*a)
                            .distance(gate_pos)
                            .total_cmp(&self.pool.get(*b).distance(gate_pos))
                    })
                    .unwrap_or(center),
                None => center,
            };

            let street = self
                .topology
                .path(gate, end, &self.topology.outer)
                .ok_or(GenError::UnableToBuildStreet)?;
            streets.push(street);

            // wall gates also grow a road out into the countryside
            if border.gates.contains(&gate) {
                let len = gate_pos.length();
                if len > 1e-9 {
                    let far = gate_pos * (1000.0 / len);
                    if let Some(start) = self.topology.nearest_vertex(&self.pool, far)
                        && let Some(road) =
                            self.topology.path(start, gate, &self.topology.inner)
                    {
                        roads.push(road);
                    }
                }
            }
        }
        self.streets = streets;
        self.roads = roads;

        self.tidy_up_roads();

        let arteries = self.arteries.clone();
        for artery in &arteries {
            self.smooth_street(artery);
        }
        Ok(())
    }

    fn tidy_up_roads(&mut self) {
        let plaza_shape = self
            .plaza
            .and_then(|id| self.patches.iter().find(|p| p.id == id))
            .map(|p| p.shape.clone());

        let mut segments: Vec<(VertexId, VertexId)> = Vec::new();
        let cut = |line: &Vec<VertexId>, segments: &mut Vec<(VertexId, VertexId)>| {
            for w in line.windows(2) {
                let (v0, v1) = (w[0], w[1]);
                // segments hugging the plaza are not streets, just the edge
                if let Some(shape) = &plaza_shape
                    && shape.contains(v0)
                    && shape.contains(v1)
                {
                    continue;
                }
                if !segments.contains(&(v0, v1)) {
                    segments.push((v0, v1));
                }
            }
        };
        for line in &self.streets {
            cut(line, &mut segments);
        }
        for line in &self.roads {
            cut(line, &mut segments);
        }

        let mut arteries: Vec<Vec<VertexId>> = Vec::new();
        while let Some((start, end)) = segments.pop() {
            let mut attached = false;
            for artery in &mut arteries {
                if artery[0] == end {
                    artery.insert(0, start);
                    attached = true;
                    break;
                } else if *artery.last().unwrap() == start {
                    artery.push(end);
                    attached = true;
                    break;
                }
            }
            if !attached {
                arteries.push(vec![start, end]);
            }
        }
        self.arteries = arteries;
    }

    /// Relaxes an artery's interior vertices in place; endpoints stay.
    fn smooth_street(&mut self, artery: &[VertexId]) {
        if artery.len() < 3 {
            return;
        }
        let poly = crate::poly::Polygon(
            artery.iter().map(|&v| self.pool.get(v)).collect(),
        );
        let smoothed = poly.smooth_vertex_eq(3.0);
        for i in 1..artery.len() - 1 {
            self.pool.set(artery[i], smoothed.0[i]);
        }
    }

    // Stage 5: ward assignment.
    fn create_wards(&mut self) {
        let mut unassigned: Vec<u32> = self.inner.clone();

        if let Some(pid) = self.plaza {
            if let Some(pos) = self.pos_of(pid) {
                self.patches[pos].ward = Some(Ward::new(WardKind::Market));
            }
            unassigned.retain(|&id| id != pid);
        }

        // a gate may seed its own ward just inside the walls
        let border_gates = self.border.as_ref().expect("stage 3 ran").gates.clone();
        let gate_ward_prob = if self.walls_needed { 0.5 } else { 0.2 };
        for gate in border_gates.iter() {
            for pos in 0..self.patches.len() {
                let p = &self.patches[pos];
                if p.shape.contains(*gate)
                    && p.within_city
                    && p.ward.is_none()
                    && self.rng.chance(gate_ward_prob)
                {
                    let id = p.id;
                    self.patches[pos].ward = Some(Ward::new(WardKind::Gate));
                    unassigned.retain(|&x| x != id);
                }
            }
        }

        // mildly shuffled template: a handful of neighbour swaps
        let mut template: Vec<WardKind> = TEMPLATE.to_vec();
        for _ in 0..template.len() / 10 {
            let index = self.rng.index(template.len() - 1);
            template.swap(index, index + 1);
        }
        let mut template = std::collections::VecDeque::from(template);

        while !unassigned.is_empty() {
            let kind = template.pop_front().unwrap_or(WardKind::Slum);

            let best = if wards::has_rating(kind) {
                let ctx = self.rating_ctx();
                let mut best: Option<(u32, f64)> = None;
                for &id in &unassigned {
                    let Some(pos) = self.patches.iter().position(|p| p.id == id) else {
                        continue;
                    };
                    let rate = wards::rate_location(kind, &ctx, pos)
                        .expect("rated kinds produce a rating");
                    if best.is_none_or(|(_, r)| rate < r) {
                        best = Some((id, rate));
                    }
                }
                match best {
                    Some((id, _)) => id,
                    None => break,
                }
            } else {
                unassigned[self.rng.index(unassigned.len())]
            };

            if let Some(pos) = self.pos_of(best) {
                self.patches[pos].ward = Some(Ward::new(kind));
            }
            unassigned.retain(|&id| id != best);
        }

        // outskirts: most wall gates annex their outer neighbourhood
        if self.walls_needed {
            let threshold = 1.0 / (self.n_patches as f64 - 5.0);
            for gate in border_gates {
                if !self.rng.chance(threshold) {
                    for pos in 0..self.patches.len() {
                        if self.patches[pos].shape.contains(gate)
                            && self.patches[pos].ward.is_none()
                        {
                            self.patches[pos].within_city = true;
                            self.patches[pos].ward = Some(Ward::new(WardKind::Gate));
                        }
                    }
                }
            }
        }

        // countryside: compact lots may become farms, the rest stays empty
        for pos in 0..self.patches.len() {
            if self.patches[pos].ward.is_none() {
                let roll = self.rng.chance(0.2);
                let kind = if roll
                    && self.patches[pos].shape.compactness(&self.pool) >= 0.7
                {
                    WardKind::Farm
                } else {
                    WardKind::Common
                };
                self.patches[pos].ward = Some(Ward::new(kind));
            }
        }

        let center = self.pool.get(self.center.expect("stage 1 ran"));
        let mut radius = 0.0f64;
        for p in &self.patches {
            if p.within_city {
                for &v in &p.shape.0 {
                    radius = radius.max(self.pool.get(v).distance(center));
                }
            }
        }
        self.city_radius = radius;
    }

    fn rating_ctx(&self) -> RatingCtx<'_> {
        RatingCtx {
            pool: &self.pool,
            patches: &self.patches,
            plaza: self.plaza.and_then(|id| self.pos_of(id)),
            citadel: self.citadel.and_then(|id| self.pos_of(id)),
            wall_shape: if self.walls_needed {
                self.border.as_ref().map(|b| &b.shape)
            } else {
                None
            },
            center: self.pool.get(self.center.expect("stage 1 ran")),
        }
    }

    // Stage 6: per-ward building footprints, patch by patch.
    fn build_geometry(&mut self) {
        for pos in 0..self.patches.len() {
            let Some(kind) = self.patches[pos].ward.as_ref().map(|w| w.kind) else {
                continue;
            };
            let geometry = {
                let ctx = BuildingCtx {
                    pool: &self.pool,
                    patches: &self.patches,
                    plaza: self.plaza.and_then(|id| {
                        self.patches.iter().position(|p| p.id == id)
                    }),
                    wall: if self.walls_needed {
                        self.border.as_ref()
                    } else {
                        None
                    },
                    border: self.border.as_ref().expect("stage 3 ran"),
                    arteries: &self.arteries,
                    gates: &self.gates,
                };
                building::create_geometry(kind, &ctx, pos, &mut self.rng)
            };
            if let Some(ward) = self.patches[pos].ward.as_mut() {
                ward.geometry = geometry;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn junction_optimization_collapses_short_shared_edges() {
        let mut b = Builder::new(2, false, false, false, Minstd::new(1));

        // two lots sharing a 6-unit edge, everything else longer than the
        // junction threshold
        let a = b.pool.add(DVec2::new(0.0, 0.0));
        let shared0 = b.pool.add(DVec2::new(20.0, 0.0));
        let shared1 = b.pool.add(DVec2::new(20.0, 6.0));
        let d = b.pool.add(DVec2::new(0.0, 10.0));
        let e = b.pool.add(DVec2::new(30.0, 0.0));
        let f = b.pool.add(DVec2::new(30.0, 10.0));

        let left = Patch::new(0, Cell(vec![a, shared0, shared1, d]));
        let right = Patch::new(1, Cell(vec![shared0, e, f, shared1]));
        b.patches = vec![left, right];
        b.inner = vec![0, 1];
        b.next_patch_id = 2;

        b.optimize_junctions().unwrap();

        // the short edge collapsed into its midpoint, shared by identity
        assert_eq!(b.pool.get(shared0), DVec2::new(20.0, 3.0));
        let left = &b.patches[0].shape;
        let right = &b.patches[1].shape;
        assert_eq!(left.len(), 3);
        assert_eq!(right.len(), 3);
        assert!(left.contains(shared0) && right.contains(shared0));
        assert!(!left.contains(shared1) && !right.contains(shared1));

        // and no remaining edge is shorter than the threshold
        for patch in &b.patches {
            let n = patch.shape.len();
            for i in 0..n {
                let p0 = b.pool.get(patch.shape.0[i]);
                let p1 = b.pool.get(patch.shape.0[(i + 1) % n]);
                assert!(p0.distance(p1) >= JUNCTION_THRESHOLD);
            }
        }
    }

    #[test]
    fn degenerate_patch_is_reported() {
        let mut b = Builder::new(1, false, false, false, Minstd::new(1));
        // a triangle with two sub-threshold edges collapses below 3 vertices
        let a = b.pool.add(DVec2::new(0.0, 0.0));
        let c = b.pool.add(DVec2::new(5.0, 0.0));
        let d = b.pool.add(DVec2::new(2.0, 4.0));
        b.patches = vec![Patch::new(0, Cell(vec![a, c, d]))];
        b.inner = vec![0];
        b.next_patch_id = 1;
        assert_eq!(b.optimize_junctions(), Err(GenError::DegeneratePatch));
    }

    #[test]
    fn size_taxonomy_boundaries() {
        assert_eq!(CitySize::from_patches(6), CitySize::SmallTown);
        assert_eq!(CitySize::from_patches(10), CitySize::LargeTown);
        assert_eq!(CitySize::from_patches(15), CitySize::SmallCity);
        assert_eq!(CitySize::from_patches(24), CitySize::LargeCity);
        assert_eq!(CitySize::from_patches(40), CitySize::Metropolis);
    }
}
