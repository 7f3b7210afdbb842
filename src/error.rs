use thiserror::Error;

/// Failures of a single build attempt. All of them are retryable: the model
/// reseeds its stream and rebuilds from scratch, up to the retry budget.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenError {
    /// The walled area offered no usable gate candidate.
    #[error("bad walled area: no gate candidate available")]
    BadWalledArea,

    /// A* found no path from a gate to the city center.
    #[error("unable to build a street from a gate")]
    UnableToBuildStreet,

    /// The citadel patch came out too elongated to hold a castle.
    #[error("bad citadel shape: compactness {0:.3}")]
    BadCitadelShape(f64),

    /// Junction optimization left a patch with fewer than 3 vertices.
    #[error("degenerate patch after junction optimization")]
    DegeneratePatch,

    /// Every attempt failed; carries the number of attempts made.
    #[error("city generation failed after {0} attempts")]
    RetriesExhausted(u32),
}
