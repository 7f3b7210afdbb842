//! Procedural generator for medieval-style city layouts.
//!
//! Given a size parameter and a seed, [`generate`] produces a purely
//! geometric description of a city: Voronoi patches, an optional curtain
//! wall with gates and towers, a street network routed over the patch mesh,
//! ward assignments and per-building footprints. No I/O, no rendering;
//! callers draw or export the [`Model`] themselves.

pub mod config;
pub mod error;
pub mod random;

pub mod geom;
pub mod poly;

pub mod mesh;

pub mod graph;
pub mod voronoi;

pub mod patch;
pub mod wall;
pub mod topology;

pub mod building;
pub mod wards;

pub mod model;

pub use error::GenError;
pub use mesh::{VertexId, VertexPool};
pub use model::{CitySize, Model};
pub use patch::Patch;
pub use poly::Polygon;
pub use wall::CurtainWall;
pub use wards::WardKind;

/// Builds a city model. `size` is the number of inner patches (6..=40 is
/// the intended range); `seed <= 0` picks an arbitrary seed instead.
///
/// Generation is retried internally on geometric dead ends; an error is
/// returned only once the retry budget is exhausted.
pub fn generate(size: u32, seed: i64) -> Result<Model, GenError> {
    Model::generate(size, seed)
}
