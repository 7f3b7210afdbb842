// Generation constants. All distances in abstract map units, roughly one
// meter each at the intended scale.

/// Number of seed points generated per requested patch.
pub const POINTS_PER_PATCH: usize = 8;

/// Base radius step of the seed spiral.
pub const SPIRAL_RADIUS_STEP: f64 = 10.0;

/// Lloyd relaxation rounds applied to the central seeds.
pub const RELAX_ROUNDS: usize = 3;

/// Patch edges shorter than this are collapsed during junction optimization.
pub const JUNCTION_THRESHOLD: f64 = 8.0;

/// Full street widths; half of each is the building inset from the edge.
pub const MAIN_STREET: f64 = 2.0;
pub const REGULAR_STREET: f64 = 1.0;
pub const ALLEY: f64 = 0.6;

/// A citadel flatter than this is rejected and the build is retried.
pub const CITADEL_MIN_COMPACTNESS: f64 = 0.75;

/// Patches farther than this many border radii from the center are dropped.
pub const PRUNE_RADIUS_FACTOR: f64 = 3.0;

/// Wall smoothing factor is `min(1, SMOOTH_PATCH_BUDGET / patch_count)`.
pub const SMOOTH_PATCH_BUDGET: f64 = 40.0;

/// Build attempts before giving up on a seed lineage.
pub const TRY_COUNT: u32 = 10;

/// Segments used to approximate a circle (market fountains).
pub const CIRCLE_SEGMENTS: usize = 16;
