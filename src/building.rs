// Per-ward building footprint generation: inset the patch into a city
// block, then carve the block with the cutter primitives.

use glam::DVec2;

use crate::config::{ALLEY, MAIN_STREET, REGULAR_STREET};
use crate::geom;
use crate::mesh::{VertexId, VertexPool};
use crate::patch::Patch;
use crate::poly::Polygon;
use crate::random::Minstd;
use crate::wall::CurtainWall;
use crate::wards::WardKind;

/// Hard cap on subdivision depth; the chance-driven recursions terminate
/// long before this in practice.
const MAX_DEPTH: usize = 14;

/// Read-only view of the finished mesh, enough to generate any ward.
pub struct BuildingCtx<'a> {
    pub pool: &'a VertexPool,
    pub patches: &'a [Patch],
    /// Index of the plaza patch.
    pub plaza: Option<usize>,
    /// The real wall, if the city has one.
    pub wall: Option<&'a CurtainWall>,
    pub border: &'a CurtainWall,
    pub arteries: &'a [Vec<VertexId>],
    pub gates: &'a [VertexId],
}

impl<'a> BuildingCtx<'a> {
    fn neighbour_by_edge(&self, patch: &Patch, v0: VertexId, v1: VertexId) -> Option<&Patch> {
        self.patches
            .iter()
            .find(|p| p.id != patch.id && p.shape.find_edge(v1, v0).is_some())
    }

    /// Enclosed patches skip outskirts filtering: they are inside the wall,
    /// or deep enough that no edge touches the city border.
    pub fn is_enclosed(&self, patch: &Patch) -> bool {
        patch.within_city
            && (patch.within_walls
                || patch.shape.0.iter().all(|v| !self.border.shape.contains(*v)))
    }
}

/// Generates the footprints for one ward kind on one patch.
pub fn create_geometry(
    kind: WardKind,
    ctx: &BuildingCtx,
    idx: usize,
    rng: &mut Minstd,
) -> Vec<Polygon> {
    match kind {
        WardKind::Craftsmen => common_ward(ctx, idx, rng, |rng, _| {
            let r = rng.float();
            let min_sq = 10.0 + 80.0 * r * r;
            let grid_chaos = 0.5 + rng.float() * 0.2;
            (min_sq, grid_chaos, 0.6, 0.04)
        }),
        WardKind::Slum => common_ward(ctx, idx, rng, |rng, _| {
            let r = rng.float();
            let min_sq = 10.0 + 30.0 * r * r;
            let grid_chaos = 0.6 + rng.float() * 0.4;
            (min_sq, grid_chaos, 0.8, 0.03)
        }),
        WardKind::Merchant => common_ward(ctx, idx, rng, |rng, _| {
            let r = rng.float();
            let min_sq = 50.0 + 60.0 * r * r;
            let grid_chaos = 0.5 + rng.float() * 0.3;
            (min_sq, grid_chaos, 0.7, 0.15)
        }),
        WardKind::Gate => common_ward(ctx, idx, rng, |rng, _| {
            let r = rng.float();
            let min_sq = 10.0 + 50.0 * r * r;
            let grid_chaos = 0.5 + rng.float() * 0.3;
            (min_sq, grid_chaos, 0.7, 0.04)
        }),
        WardKind::Administration => common_ward(ctx, idx, rng, |rng, _| {
            let r = rng.float();
            let min_sq = 80.0 + 30.0 * r * r;
            let grid_chaos = 0.1 + rng.float() * 0.3;
            (min_sq, grid_chaos, 0.3, 0.04)
        }),
        WardKind::Patriciate => common_ward(ctx, idx, rng, |rng, _| {
            let r = rng.float();
            let min_sq = 80.0 + 30.0 * r * r;
            let grid_chaos = 0.5 + rng.float() * 0.3;
            (min_sq, grid_chaos, 0.8, 0.2)
        }),
        WardKind::Military => common_ward(ctx, idx, rng, |rng, block| {
            // the garrison scales with its grounds rather than a fixed base
            let min_sq = block.area().max(0.0).sqrt() * (1.0 + rng.float());
            let grid_chaos = 0.1 + rng.float() * 0.3;
            (min_sq, grid_chaos, 0.3, 0.25)
        }),
        WardKind::Market => market(ctx, idx, rng),
        WardKind::Cathedral => {
            let block = city_block(ctx, idx);
            if block.len() < 3 {
                return Vec::new();
            }
            if rng.chance(0.4) {
                ring(&block, 2.0 + rng.float() * 4.0)
            } else {
                create_ortho_building(&block, 50.0, 0.8, rng)
            }
        }
        WardKind::Park => {
            let block = city_block(ctx, idx);
            if block.len() < 3 {
                return Vec::new();
            }
            if block.compactness() >= 0.7 {
                radial(&block, block.centroid(), ALLEY)
            } else {
                semi_radial(&block, ALLEY)
            }
        }
        WardKind::Farm => farm(ctx, idx, rng),
        WardKind::Castle => castle(ctx, idx, rng),
        WardKind::Common => Vec::new(),
    }
}

/// Insets the patch shape by per-edge street widths: main streets along the
/// wall, arteries and the plaza; regular streets inside the city; alleys in
/// the countryside. Convex blocks shrink, concave blocks buffer.
pub fn city_block(ctx: &BuildingCtx, idx: usize) -> Polygon {
    let patch = &ctx.patches[idx];
    let shape = &patch.shape;
    let n = shape.len();
    let inner_patch = ctx.wall.is_none() || patch.within_walls;

    let mut insets = Vec::with_capacity(n);
    for i in 0..n {
        let v0 = shape.0[i];
        let v1 = shape.0[(i + 1) % n];
        let width = if ctx.wall.is_some_and(|w| w.has_edge(v0, v1)) {
            MAIN_STREET
        } else {
            let mut on_street = inner_patch
                && ctx.plaza.is_some_and(|p| {
                    ctx.patches[p].shape.find_edge(v1, v0).is_some()
                });
            if !on_street {
                on_street = ctx
                    .arteries
                    .iter()
                    .any(|a| a.contains(&v0) && a.contains(&v1));
            }
            if on_street {
                MAIN_STREET
            } else if inner_patch {
                REGULAR_STREET
            } else {
                ALLEY
            }
        };
        insets.push(width / 2.0);
    }

    let poly = shape.to_polygon(ctx.pool);
    if poly.is_convex() {
        poly.shrink(&insets)
    } else {
        poly.buffer(&insets)
    }
}

fn common_ward(
    ctx: &BuildingCtx,
    idx: usize,
    rng: &mut Minstd,
    params: impl FnOnce(&mut Minstd, &Polygon) -> (f64, f64, f64, f64),
) -> Vec<Polygon> {
    let block = city_block(ctx, idx);
    if block.len() < 3 {
        return Vec::new();
    }
    let (min_sq, grid_chaos, size_chaos, empty_prob) = params(rng, &block);
    let mut geometry = Vec::new();
    create_alleys(
        &block, min_sq, grid_chaos, size_chaos, empty_prob, true, 0, rng, &mut geometry,
    );
    let patch = &ctx.patches[idx];
    if !ctx.is_enclosed(patch) {
        filter_outskirts(ctx, idx, &mut geometry, rng);
    }
    geometry
}

/// Recursive block subdivision: cut across the longest edge at a chaotic
/// ratio and angle, leave an alley when splitting is allowed, and emit
/// leaves once they fall under a randomized size threshold.
#[allow(clippy::too_many_arguments)]
pub fn create_alleys(
    p: &Polygon,
    min_sq: f64,
    grid_chaos: f64,
    size_chaos: f64,
    empty_prob: f64,
    split_allowed: bool,
    depth: usize,
    rng: &mut Minstd,
    out: &mut Vec<Polygon>,
) {
    let v = p.longest_edge();

    let spread = 0.8 * grid_chaos;
    let ratio = (1.0 - spread) / 2.0 + rng.float() * spread;

    // keep small blocks rectangular even in chaotic wards
    let angle_spread = if p.area() < min_sq * 4.0 {
        0.0
    } else {
        std::f64::consts::PI / 6.0 * grid_chaos
    };
    let angle = (rng.float() - 0.5) * angle_spread;

    let gap = if split_allowed { ALLEY } else { 0.0 };
    let halves = bisect(p, v, ratio, angle, gap);
    let split_failed = halves.len() == 1;

    for half in halves {
        let threshold = min_sq * 2.0f64.powf(4.0 * size_chaos * (rng.float() - 0.5));
        if half.area() < threshold || (split_failed && depth >= MAX_DEPTH) {
            if !rng.chance(empty_prob) {
                out.push(half);
            }
        } else if depth < MAX_DEPTH {
            let next_split = half.area() > min_sq / (rng.float() * rng.float());
            create_alleys(
                &half, min_sq, grid_chaos, size_chaos, empty_prob, next_split,
                depth + 1, rng, out,
            );
        } else {
            out.push(half);
        }
    }
}

/// Cuts the polygon across the edge starting at `vertex`, at `ratio` along
/// it, perpendicular up to `angle`, leaving a `gap`-wide corridor.
pub fn bisect(p: &Polygon, vertex: usize, ratio: f64, angle: f64, gap: f64) -> Vec<Polygon> {
    let n = p.len();
    let v0 = p.0[vertex];
    let v1 = p.0[(vertex + 1) % n];
    let base = geom::lerp(v0, v1, ratio);
    let dir = DVec2::from_angle(angle).rotate(v1 - v0);
    p.cut(base, base + dir.perp(), gap)
}

/// Fans the polygon into triangles around `center`, insetting the two
/// spokes of each slice by half the gap.
pub fn radial(p: &Polygon, center: DVec2, gap: f64) -> Vec<Polygon> {
    let n = p.len();
    let mut sectors = Vec::with_capacity(n);
    for i in 0..n {
        let sector = Polygon(vec![center, p.0[i], p.0[(i + 1) % n]]);
        if sector.area() < 1e-9 {
            continue;
        }
        if gap > 0.0 {
            let cut = sector.shrink(&[gap / 2.0, 0.0, gap / 2.0]);
            if cut.len() >= 3 {
                sectors.push(cut);
            }
        } else {
            sectors.push(sector);
        }
    }
    sectors
}

/// Like [`radial`], but fanning from the vertex nearest the centroid and
/// insetting only spokes that are not original polygon edges.
pub fn semi_radial(p: &Polygon, gap: f64) -> Vec<Polygon> {
    let centroid = p.centroid();
    let center = p
        .0
        .iter()
        .copied()
        .min_by(|a, b| a.distance(centroid).total_cmp(&b.distance(centroid)))
        .unwrap_or(centroid);

    let n = p.len();
    let has_edge = |a: DVec2, b: DVec2| {
        (0..n).any(|i| p.0[i] == a && p.0[(i + 1) % n] == b)
    };

    let mut sectors = Vec::new();
    for i in 0..n {
        let v0 = p.0[i];
        let v1 = p.0[(i + 1) % n];
        if v0 == center || v1 == center {
            continue;
        }
        let sector = Polygon(vec![center, v0, v1]);
        if sector.area() < 1e-9 {
            continue;
        }
        if gap > 0.0 {
            let d0 = if has_edge(center, v0) { 0.0 } else { gap / 2.0 };
            let d2 = if has_edge(v1, center) { 0.0 } else { gap / 2.0 };
            let cut = sector.shrink(&[d0, 0.0, d2]);
            if cut.len() >= 3 {
                sectors.push(cut);
            }
        } else {
            sectors.push(sector);
        }
    }
    sectors
}

/// Onion-skin peeling: offsets every edge inward by `thickness` and slices
/// the polygon along those lines, shortest edges first, collecting the
/// outer shells. The inner remainder is left open.
pub fn ring(p: &Polygon, thickness: f64) -> Vec<Polygon> {
    let n = p.len();
    let mut slices: Vec<(DVec2, DVec2, f64)> = (0..n)
        .map(|i| {
            let v0 = p.0[i];
            let v1 = p.0[(i + 1) % n];
            let dir = v1 - v0;
            let offset = dir.perp().normalize_or_zero() * thickness;
            (v0 + offset, dir, dir.length())
        })
        .collect();
    // short sides are sliced first
    slices.sort_by(|a, b| a.2.total_cmp(&b.2));

    let mut shells = Vec::new();
    let mut q = p.clone();
    for (origin, dir, _) in slices {
        if q.len() < 3 {
            break;
        }
        let halves = q.cut(origin, origin + dir, 0.0);
        if halves.len() == 2 {
            let mut it = halves.into_iter();
            q = it.next().unwrap();
            shells.push(it.next().unwrap());
        } else {
            let h = halves.into_iter().next().unwrap();
            if geom::side(origin, dir, h.center()) >= 0.0 {
                q = h;
            } else {
                // the whole remainder lies within this shell
                shells.push(h);
                q = Polygon::default();
            }
        }
    }
    shells
}

/// Grid-aligned subdivision: every cut runs along one of two orthogonal
/// axes derived from the longest edge, whichever crosses the current
/// longest edge more squarely. Leaves are kept with probability `fill`;
/// an unlucky run that keeps nothing is retried.
pub fn create_ortho_building(
    p: &Polygon,
    min_block_sq: f64,
    fill: f64,
    rng: &mut Minstd,
) -> Vec<Polygon> {
    if p.len() < 3 || p.area() < min_block_sq {
        return vec![p.clone()];
    }
    let i = p.longest_edge();
    let c1 = (p.0[(i + 1) % p.len()] - p.0[i]).normalize_or_zero();
    let c2 = c1.perp();

    for _ in 0..100 {
        let mut out = Vec::new();
        ortho_slice(p, c1, c2, min_block_sq, fill, 0, rng, &mut out);
        if !out.is_empty() {
            return out;
        }
    }
    vec![p.clone()]
}

#[allow(clippy::too_many_arguments)]
fn ortho_slice(
    p: &Polygon,
    c1: DVec2,
    c2: DVec2,
    min_block_sq: f64,
    fill: f64,
    depth: usize,
    rng: &mut Minstd,
    out: &mut Vec<Polygon>,
) {
    let i = p.longest_edge();
    let v0 = p.0[i];
    let v1 = p.0[(i + 1) % p.len()];
    let v = v1 - v0;

    let ratio = 0.4 + rng.float() * 0.2;
    let base = geom::lerp(v0, v1, ratio);
    // cut along whichever axis is more perpendicular to the edge
    let c = if v.perp_dot(c1).abs() > v.perp_dot(c2).abs() {
        c1
    } else {
        c2
    };

    let halves = p.cut(base, base + c, 0.0);
    let split_failed = halves.len() == 1;
    for half in halves {
        let threshold = min_block_sq * 2.0f64.powf(rng.normal() * 2.0 - 1.0);
        if half.area() < threshold || (split_failed && depth >= MAX_DEPTH) {
            if rng.chance(fill) {
                out.push(half);
            }
        } else if depth < MAX_DEPTH {
            ortho_slice(&half, c1, c2, min_block_sq, fill, depth + 1, rng, out);
        } else {
            out.push(half);
        }
    }
}

fn market(ctx: &BuildingCtx, idx: usize, rng: &mut Minstd) -> Vec<Polygon> {
    let shape = ctx.patches[idx].shape.to_polygon(ctx.pool);
    if shape.len() < 3 {
        return Vec::new();
    }

    // a statue is always offset toward an edge, a fountain only sometimes
    let statue = rng.chance(0.6);
    let offset = statue || rng.chance(0.3);

    let (mut v0, mut v1) = (DVec2::ZERO, DVec2::ZERO);
    if statue || offset {
        let i = shape.longest_edge();
        v0 = shape.0[i];
        v1 = shape.0[(i + 1) % shape.len()];
    }

    let mut object = if statue {
        let mut r = Polygon::rect(1.0 + rng.float(), 1.0 + rng.float());
        r.rotate((v1.y - v0.y).atan2(v1.x - v0.x));
        r
    } else {
        Polygon::circle(1.0 + rng.float())
    };

    let target = if offset {
        let gravity = geom::lerp(v0, v1, 0.5);
        geom::lerp(shape.centroid(), gravity, 0.2 + rng.float() * 0.4)
    } else {
        shape.centroid()
    };
    object.translate(target);
    vec![object]
}

fn farm(ctx: &BuildingCtx, idx: usize, rng: &mut Minstd) -> Vec<Polygon> {
    let shape = ctx.patches[idx].shape.to_polygon(ctx.pool);
    if shape.len() < 3 {
        return Vec::new();
    }
    let mut housing = Polygon::rect(4.0, 4.0);
    let vertex = shape.0[rng.index(shape.len())];
    let pos = geom::lerp(vertex, shape.centroid(), 0.3 + rng.float() * 0.4);
    housing.rotate(rng.float() * std::f64::consts::PI);
    housing.translate(pos);
    create_ortho_building(&housing, 8.0, 0.5, rng)
}

fn castle(ctx: &BuildingCtx, idx: usize, rng: &mut Minstd) -> Vec<Polygon> {
    let shape = ctx.patches[idx].shape.to_polygon(ctx.pool);
    let block = shape.shrink_eq(MAIN_STREET * 2.0);
    if block.len() < 3 {
        return Vec::new();
    }
    create_ortho_building(&block, block.area().sqrt() * 4.0, 0.6, rng)
}

/// Thins out buildings on patches that face open country: the farther a
/// building sits from a populated edge (artery or inhabited neighbour),
/// scaled down by local density, the likelier it is dropped.
fn filter_outskirts(ctx: &BuildingCtx, idx: usize, geometry: &mut Vec<Polygon>, rng: &mut Minstd) {
    let patch = &ctx.patches[idx];
    let shape = &patch.shape;
    let n = shape.len();

    let mut populated: Vec<(DVec2, DVec2, f64)> = Vec::new();
    for i in 0..n {
        let v0 = shape.0[i];
        let v1 = shape.0[(i + 1) % n];
        let on_road = ctx
            .arteries
            .iter()
            .any(|a| a.contains(&v0) && a.contains(&v1));
        let weight = if on_road {
            1.0
        } else {
            match ctx.neighbour_by_edge(patch, v0, v1) {
                Some(nb) if nb.within_city => 1.0,
                Some(_) => 0.4,
                None => 0.0,
            }
        };
        if weight > 0.0 {
            let p0 = ctx.pool.get(v0);
            populated.push((p0, ctx.pool.get(v1) - p0, weight));
        }
    }

    // per-vertex density: gates pull growth, purely urban junctions carry
    // a random crowd, everything else is empty
    let density: Vec<f64> = shape
        .0
        .iter()
        .map(|&v| {
            if ctx.gates.contains(&v) {
                1.0
            } else if ctx
                .patches
                .iter()
                .filter(|p| p.shape.contains(v))
                .all(|p| p.within_city)
            {
                2.0 * rng.float()
            } else {
                0.0
            }
        })
        .collect();

    let patch_poly = shape.to_polygon(ctx.pool);
    geometry.retain(|building| {
        let mut min_dist = 1.0f64;
        for (origin, dir, weight) in &populated {
            for v in &building.0 {
                let d = geom::distance_to_line(*origin, *dir, *v) / weight;
                if d < min_dist {
                    min_dist = d;
                }
            }
        }
        let weights = patch_poly.interpolate(building.center());
        let local: f64 = weights.iter().zip(&density).map(|(w, d)| w * d).sum();
        min_dist /= local;
        rng.fuzzy(1.0) > min_dist
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side: f64) -> Polygon {
        Polygon::rect(side, side)
    }

    #[test]
    fn bisect_without_gap_preserves_area() {
        let p = square(10.0);
        let halves = bisect(&p, 0, 0.5, 0.2, 0.0);
        assert_eq!(halves.len(), 2);
        let total: f64 = halves.iter().map(|h| h.area()).sum();
        assert!((total - p.area()).abs() < 1e-9);
    }

    #[test]
    fn bisect_with_gap_loses_the_corridor() {
        let p = square(10.0);
        let halves = bisect(&p, 0, 0.5, 0.0, ALLEY);
        assert_eq!(halves.len(), 2);
        let total: f64 = halves.iter().map(|h| h.area()).sum();
        assert!(total < p.area() - ALLEY * 5.0);
    }

    #[test]
    fn alleys_fill_a_large_block() {
        let p = square(30.0);
        let mut rng = Minstd::new(17);
        let mut out = Vec::new();
        create_alleys(&p, 20.0, 0.3, 0.5, 0.0, true, 0, &mut rng, &mut out);
        assert!(out.len() > 4);
        let covered: f64 = out.iter().map(|b| b.area()).sum();
        assert!(covered > 0.0 && covered < p.area());
        for b in &out {
            assert!(b.area() > 0.0, "plots stay counter-clockwise");
        }
    }

    #[test]
    fn alleys_are_deterministic_per_seed() {
        let p = square(30.0);
        let run = |seed| {
            let mut rng = Minstd::new(seed);
            let mut out = Vec::new();
            create_alleys(&p, 15.0, 0.4, 0.6, 0.04, true, 0, &mut rng, &mut out);
            out
        };
        assert_eq!(run(9), run(9));
    }

    #[test]
    fn radial_fans_every_edge() {
        let p = square(6.0);
        let fans = radial(&p, p.centroid(), 0.0);
        assert_eq!(fans.len(), 4);
        let total: f64 = fans.iter().map(|f| f.area()).sum();
        assert!((total - p.area()).abs() < 1e-9);
        let gapped = radial(&p, p.centroid(), ALLEY);
        let gapped_total: f64 = gapped.iter().map(|f| f.area()).sum();
        assert!(gapped_total < total);
    }

    #[test]
    fn semi_radial_skips_the_hub_vertex() {
        let p = square(6.0);
        let fans = semi_radial(&p, 0.0);
        // two edges touch the chosen hub vertex and are skipped
        assert_eq!(fans.len(), 2);
    }

    #[test]
    fn ring_peels_shells() {
        let p = square(10.0);
        let shells = ring(&p, 2.0);
        assert_eq!(shells.len(), 4);
        let peeled: f64 = shells.iter().map(|s| s.area()).sum();
        // a 2-thick band off a 10-square leaves a 6-square courtyard
        assert!((peeled - (100.0 - 36.0)).abs() < 1e-6);
    }

    #[test]
    fn overthick_ring_consumes_everything() {
        let p = square(10.0);
        let shells = ring(&p, 6.0);
        let peeled: f64 = shells.iter().map(|s| s.area()).sum();
        assert!((peeled - p.area()).abs() < 1e-6, "no courtyard remains");
    }

    #[test]
    fn ortho_building_fills_when_asked() {
        let p = square(20.0);
        let mut rng = Minstd::new(23);
        let blocks = create_ortho_building(&p, 30.0, 1.0, &mut rng);
        assert!(!blocks.is_empty());
        let total: f64 = blocks.iter().map(|b| b.area()).sum();
        assert!((total - p.area()).abs() < 1e-6, "fill=1 keeps every leaf");
    }

    #[test]
    fn small_ortho_input_is_returned_whole() {
        let p = square(2.0);
        let mut rng = Minstd::new(1);
        let blocks = create_ortho_building(&p, 100.0, 0.5, &mut rng);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0], p);
    }
}
