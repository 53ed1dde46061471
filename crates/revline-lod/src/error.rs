//! Level-of-detail configuration errors.

/// Errors raised while building a subject's LOD configuration.
#[derive(Debug, thiserror::Error)]
pub enum LodError {
    /// A ladder needs at least one level.
    #[error("detail ladder must contain at least one level")]
    EmptyLadder,

    /// Two levels share the same id.
    #[error("duplicate detail level id '{0}'")]
    DuplicateLevel(String),

    /// A threshold is negative or NaN.
    #[error("level '{level_id}' has invalid distance threshold {threshold}")]
    InvalidThreshold { level_id: String, threshold: f32 },

    /// Geometry complexity or texture resolution is outside `[0, 1]`.
    #[error("level '{level_id}' has quality factor {value} outside [0, 1]")]
    FactorOutOfRange { level_id: String, value: f32 },

    /// A farther level has higher quality than a nearer one.
    #[error("level '{farther}' has higher quality than nearer level '{nearer}'")]
    QualityIncreasesWithDistance { nearer: String, farther: String },

    /// Hysteresis must be finite and non-negative.
    #[error("hysteresis must be finite and non-negative, got {0}")]
    InvalidHysteresis(f32),
}
