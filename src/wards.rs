// Ward kinds, the placement template and the location rating functions.
// Geometry generation for each kind lives in `building`.

use glam::DVec2;

use crate::mesh::{Cell, VertexPool};
use crate::patch::Patch;
use crate::poly::Polygon;

/// Functional role of a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WardKind {
    Craftsmen,
    Merchant,
    Slum,
    Market,
    Cathedral,
    Administration,
    Military,
    Patriciate,
    Park,
    Farm,
    Gate,
    Castle,
    /// Unremarkable countryside; carries no geometry.
    Common,
}

impl WardKind {
    pub fn label(self) -> &'static str {
        match self {
            WardKind::Craftsmen => "craftsmen",
            WardKind::Merchant => "merchant",
            WardKind::Slum => "slum",
            WardKind::Market => "market",
            WardKind::Cathedral => "cathedral",
            WardKind::Administration => "administration",
            WardKind::Military => "military",
            WardKind::Patriciate => "patriciate",
            WardKind::Park => "park",
            WardKind::Farm => "farm",
            WardKind::Gate => "gate",
            WardKind::Castle => "castle",
            WardKind::Common => "common",
        }
    }
}

/// A ward assignment: the kind plus its generated building footprints.
#[derive(Debug, Clone)]
pub struct Ward {
    pub kind: WardKind,
    pub geometry: Vec<Polygon>,
}

impl Ward {
    pub fn new(kind: WardKind) -> Self {
        Ward {
            kind,
            geometry: Vec::new(),
        }
    }
}

/// Target ward mix for a full-size (40 patch) city; smaller cities consume
/// a prefix, larger ones are topped up with slums.
pub const TEMPLATE: [WardKind; 36] = [
    WardKind::Craftsmen,
    WardKind::Craftsmen,
    WardKind::Merchant,
    WardKind::Craftsmen,
    WardKind::Craftsmen,
    WardKind::Cathedral,
    WardKind::Craftsmen,
    WardKind::Craftsmen,
    WardKind::Craftsmen,
    WardKind::Craftsmen,
    WardKind::Craftsmen,
    WardKind::Craftsmen,
    WardKind::Craftsmen,
    WardKind::Craftsmen,
    WardKind::Administration,
    WardKind::Craftsmen,
    WardKind::Slum,
    WardKind::Craftsmen,
    WardKind::Slum,
    WardKind::Patriciate,
    WardKind::Market,
    WardKind::Slum,
    WardKind::Craftsmen,
    WardKind::Craftsmen,
    WardKind::Craftsmen,
    WardKind::Slum,
    WardKind::Craftsmen,
    WardKind::Craftsmen,
    WardKind::Craftsmen,
    WardKind::Military,
    WardKind::Slum,
    WardKind::Craftsmen,
    WardKind::Park,
    WardKind::Patriciate,
    WardKind::Market,
    WardKind::Merchant,
];

/// Read-only view of the model under construction, enough to rate a patch.
pub struct RatingCtx<'a> {
    pub pool: &'a VertexPool,
    pub patches: &'a [Patch],
    /// Indices into `patches`.
    pub plaza: Option<usize>,
    pub citadel: Option<usize>,
    /// The wall polygon, when real walls exist.
    pub wall_shape: Option<&'a Cell>,
    pub center: DVec2,
}

impl<'a> RatingCtx<'a> {
    fn plaza_center(&self) -> DVec2 {
        match self.plaza {
            Some(i) => self.patches[i].shape.center(self.pool),
            None => self.center,
        }
    }

    fn borders_plaza(&self, patch: &Patch) -> bool {
        self.plaza
            .map(|i| self.patches[i].shape.borders(&patch.shape))
            .unwrap_or(false)
    }
}

/// Kinds that pick their patch by rating; everything else lands at random.
pub fn has_rating(kind: WardKind) -> bool {
    matches!(
        kind,
        WardKind::Slum
            | WardKind::Market
            | WardKind::Cathedral
            | WardKind::Administration
            | WardKind::Merchant
            | WardKind::Patriciate
            | WardKind::Military
    )
}

/// Rates how well `kind` suits the patch; lower is better and infinity is
/// forbidden. Kinds placed at random return `None`.
pub fn rate_location(kind: WardKind, ctx: &RatingCtx, patch_idx: usize) -> Option<f64> {
    let patch = &ctx.patches[patch_idx];
    let shape = &patch.shape;
    match kind {
        // slums belong to the fringe: the farther out, the better
        WardKind::Slum => Some(-shape.distance(ctx.pool, ctx.plaza_center())),

        // markets repel each other, and otherwise prefer small central lots
        WardKind::Market => {
            for other in ctx.patches {
                if other.id != patch.id
                    && other
                        .ward
                        .as_ref()
                        .is_some_and(|w| w.kind == WardKind::Market)
                    && other.shape.borders(shape)
                {
                    return Some(f64::INFINITY);
                }
            }
            Some(match ctx.plaza {
                Some(i) => shape.area(ctx.pool) / ctx.patches[i].shape.area(ctx.pool),
                None => shape.distance(ctx.pool, ctx.center),
            })
        }

        // the cathedral wants to overlook the plaza, the bigger the lot
        // the better; otherwise close and small
        WardKind::Cathedral => Some(if ctx.borders_plaza(patch) {
            -1.0 / shape.area(ctx.pool)
        } else {
            shape.distance(ctx.pool, ctx.plaza_center()) * shape.area(ctx.pool)
        }),

        WardKind::Administration => Some(if ctx.borders_plaza(patch) {
            0.0
        } else {
            shape.distance(ctx.pool, ctx.plaza_center())
        }),

        WardKind::Merchant => Some(shape.distance(ctx.pool, ctx.plaza_center())),

        // patricians shun slums and prize parks
        WardKind::Patriciate => {
            let mut rate = 0.0;
            for other in ctx.patches {
                if other.id == patch.id || !other.shape.borders(shape) {
                    continue;
                }
                match other.ward.as_ref().map(|w| w.kind) {
                    Some(WardKind::Slum) => rate += 1.0,
                    Some(WardKind::Park) => rate -= 1.0,
                    _ => {}
                }
            }
            Some(rate)
        }

        // the garrison sits against the citadel or the wall
        WardKind::Military => {
            let by_citadel = ctx
                .citadel
                .is_some_and(|i| ctx.patches[i].shape.borders(shape));
            if by_citadel {
                Some(0.0)
            } else if ctx.wall_shape.is_some_and(|w| w.borders(shape)) {
                Some(1.0)
            } else if ctx.citadel.is_some() || ctx.wall_shape.is_some() {
                Some(f64::INFINITY)
            } else {
                Some(0.0)
            }
        }

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::VertexPool;
    use glam::DVec2;

    fn quad(pool: &mut VertexPool, pts: [(f64, f64); 4]) -> Cell {
        Cell(pts.iter().map(|&(x, y)| pool.add(DVec2::new(x, y))).collect())
    }

    /// Two side-by-side unit squares sharing an edge.
    fn two_patches() -> (VertexPool, Vec<Patch>) {
        let mut pool = VertexPool::new();
        let a = pool.add(DVec2::new(0.0, 0.0));
        let b = pool.add(DVec2::new(1.0, 0.0));
        let c = pool.add(DVec2::new(1.0, 1.0));
        let d = pool.add(DVec2::new(0.0, 1.0));
        let e = pool.add(DVec2::new(2.0, 0.0));
        let f = pool.add(DVec2::new(2.0, 1.0));
        let left = Cell(vec![a, b, c, d]);
        let right = Cell(vec![b, e, f, c]);
        (pool, vec![Patch::new(0, left), Patch::new(1, right)])
    }

    #[test]
    fn template_mix() {
        let craftsmen = TEMPLATE
            .iter()
            .filter(|k| **k == WardKind::Craftsmen)
            .count();
        let slums = TEMPLATE.iter().filter(|k| **k == WardKind::Slum).count();
        assert_eq!(TEMPLATE.len(), 36);
        assert_eq!(craftsmen, 21);
        assert_eq!(slums, 5);
        assert_eq!(
            TEMPLATE.iter().filter(|k| **k == WardKind::Market).count(),
            2
        );
        assert_eq!(
            TEMPLATE
                .iter()
                .filter(|k| **k == WardKind::Cathedral)
                .count(),
            1
        );
    }

    #[test]
    fn slum_prefers_the_fringe() {
        let (pool, patches) = two_patches();
        let ctx = RatingCtx {
            pool: &pool,
            patches: &patches,
            plaza: None,
            citadel: None,
            wall_shape: None,
            center: DVec2::new(0.0, 0.0),
        };
        let near = rate_location(WardKind::Slum, &ctx, 0).unwrap();
        let far = rate_location(WardKind::Slum, &ctx, 1).unwrap();
        assert!(far < near);
    }

    #[test]
    fn market_avoids_another_market_next_door() {
        let (pool, mut patches) = two_patches();
        patches[0].ward = Some(Ward::new(WardKind::Market));
        let ctx = RatingCtx {
            pool: &pool,
            patches: &patches,
            plaza: None,
            citadel: None,
            wall_shape: None,
            center: DVec2::new(0.0, 0.0),
        };
        assert_eq!(
            rate_location(WardKind::Market, &ctx, 1),
            Some(f64::INFINITY)
        );
    }

    #[test]
    fn patriciate_counts_neighbours() {
        let (pool, mut patches) = two_patches();
        patches[0].ward = Some(Ward::new(WardKind::Slum));
        let ctx = RatingCtx {
            pool: &pool,
            patches: &patches,
            plaza: None,
            citadel: None,
            wall_shape: None,
            center: DVec2::ZERO,
        };
        assert_eq!(rate_location(WardKind::Patriciate, &ctx, 1), Some(1.0));
    }

    #[test]
    fn military_forbidden_away_from_defences() {
        let mut pool = VertexPool::new();
        let far = quad(&mut pool, [(10.0, 10.0), (11.0, 10.0), (11.0, 11.0), (10.0, 11.0)]);
        let wall = quad(&mut pool, [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        let patches = vec![Patch::new(0, far)];
        let ctx = RatingCtx {
            pool: &pool,
            patches: &patches,
            plaza: None,
            citadel: None,
            wall_shape: Some(&wall),
            center: DVec2::ZERO,
        };
        assert_eq!(
            rate_location(WardKind::Military, &ctx, 0),
            Some(f64::INFINITY)
        );
    }

    #[test]
    fn craftsmen_have_no_rating() {
        let (pool, patches) = two_patches();
        let ctx = RatingCtx {
            pool: &pool,
            patches: &patches,
            plaza: None,
            citadel: None,
            wall_shape: None,
            center: DVec2::ZERO,
        };
        assert_eq!(rate_location(WardKind::Craftsmen, &ctx, 0), None);
        assert_eq!(rate_location(WardKind::Park, &ctx, 0), None);
        assert_eq!(rate_location(WardKind::Gate, &ctx, 0), None);
    }
}
