//! Detail levels and validated, distance-ordered ladders.

use std::time::Duration;

use crate::error::LodError;

/// Shadow map quality used by a detail level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShadowQuality {
    None,
    Low,
    Medium,
    High,
}

/// One rung of a quality ladder.
#[derive(Clone, Debug, PartialEq)]
pub struct DetailLevel {
    /// Unique short name within a ladder (e.g. `"ultra"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Minimum distance at which this level becomes eligible. May be `f32::INFINITY`.
    pub distance_threshold: f32,
    /// Fraction of full geometry detail, in `[0.0, 1.0]`.
    pub geometry_complexity: f32,
    /// Fraction of full texture resolution, in `[0.0, 1.0]`.
    pub texture_resolution: f32,
    pub shadow_quality: ShadowQuality,
    pub reflections_enabled: bool,
    /// Particle count for dust and exhaust effects.
    pub particle_budget: u32,
    /// Optional model override for this level. `None` means the subject's base asset.
    pub asset_path: Option<String>,
}

impl DetailLevel {
    /// Create a level with the given thresholds and quality factors.
    ///
    /// Shadows, reflections and particles start disabled; use the builder-style
    /// setters to enable them.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        distance_threshold: f32,
        geometry_complexity: f32,
        texture_resolution: f32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            distance_threshold,
            geometry_complexity,
            texture_resolution,
            shadow_quality: ShadowQuality::None,
            reflections_enabled: false,
            particle_budget: 0,
            asset_path: None,
        }
    }

    #[must_use]
    pub fn with_shadows(mut self, quality: ShadowQuality) -> Self {
        self.shadow_quality = quality;
        self
    }

    #[must_use]
    pub fn with_reflections(mut self, enabled: bool) -> Self {
        self.reflections_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_particles(mut self, budget: u32) -> Self {
        self.particle_budget = budget;
        self
    }

    #[must_use]
    pub fn with_asset_path(mut self, path: impl Into<String>) -> Self {
        self.asset_path = Some(path.into());
        self
    }
}

/// An ordered set of detail levels, sorted ascending by distance threshold.
///
/// Quality (geometry complexity and texture resolution) never increases as the
/// threshold grows. Construct through [`Ladder::new`], which sorts and validates.
#[derive(Clone, Debug, PartialEq)]
pub struct Ladder {
    levels: Vec<DetailLevel>,
}

impl Ladder {
    /// Sort `levels` by threshold and validate the ladder invariants.
    pub fn new(mut levels: Vec<DetailLevel>) -> Result<Self, LodError> {
        if levels.is_empty() {
            return Err(LodError::EmptyLadder);
        }
        for level in &levels {
            if level.distance_threshold.is_nan() || level.distance_threshold < 0.0 {
                return Err(LodError::InvalidThreshold {
                    level_id: level.id.clone(),
                    threshold: level.distance_threshold,
                });
            }
            for factor in [level.geometry_complexity, level.texture_resolution] {
                if !(0.0..=1.0).contains(&factor) {
                    return Err(LodError::FactorOutOfRange {
                        level_id: level.id.clone(),
                        value: factor,
                    });
                }
            }
        }

        // Stable: levels sharing a threshold keep their declaration order.
        levels.sort_by(|a, b| a.distance_threshold.total_cmp(&b.distance_threshold));

        for (i, level) in levels.iter().enumerate() {
            if levels[..i].iter().any(|other| other.id == level.id) {
                return Err(LodError::DuplicateLevel(level.id.clone()));
            }
            if i > 0 {
                let prev = &levels[i - 1];
                if level.geometry_complexity > prev.geometry_complexity
                    || level.texture_resolution > prev.texture_resolution
                {
                    return Err(LodError::QualityIncreasesWithDistance {
                        nearer: prev.id.clone(),
                        farther: level.id.clone(),
                    });
                }
            }
        }

        Ok(Self { levels })
    }

    /// The default five-level vehicle ladder: ultra, high, medium, low, minimal.
    pub fn vehicle_default() -> Self {
        Self {
            levels: vec![
                DetailLevel::new("ultra", "Ultra Detail", 0.0, 1.0, 1.0)
                    .with_shadows(ShadowQuality::High)
                    .with_reflections(true)
                    .with_particles(100),
                DetailLevel::new("high", "High Detail", 5.0, 0.8, 0.8)
                    .with_shadows(ShadowQuality::Medium)
                    .with_reflections(true)
                    .with_particles(50),
                DetailLevel::new("medium", "Medium Detail", 10.0, 0.6, 0.6)
                    .with_shadows(ShadowQuality::Low)
                    .with_particles(25),
                DetailLevel::new("low", "Low Detail", 15.0, 0.4, 0.4),
                DetailLevel::new("minimal", "Minimal Detail", f32::INFINITY, 0.2, 0.2),
            ],
        }
    }

    /// Levels in ascending threshold order.
    pub fn levels(&self) -> &[DetailLevel] {
        &self.levels
    }

    /// The nearest (highest quality) level.
    pub fn first(&self) -> &DetailLevel {
        &self.levels[0]
    }

    /// Look up a level by id.
    pub fn get(&self, level_id: &str) -> Option<&DetailLevel> {
        self.levels.iter().find(|l| l.id == level_id)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Select the level for an already hysteresis-adjusted distance.
    ///
    /// Returns the last level whose threshold is `<= effective_distance`
    /// (closed lower bound), falling back to the first level when none qualifies.
    pub fn level_for_distance(&self, effective_distance: f32) -> &DetailLevel {
        self.levels
            .iter()
            .rev()
            .find(|level| level.distance_threshold <= effective_distance)
            .unwrap_or_else(|| self.first())
    }
}

impl Default for Ladder {
    fn default() -> Self {
        Self::vehicle_default()
    }
}

/// Per-subject overrides merged onto the default configuration at registration.
#[derive(Clone, Debug, Default)]
pub struct LodOverride {
    /// Replacement ladder (sorted and validated at registration).
    pub levels: Option<Vec<DetailLevel>>,
    /// Debounce before a level change is committed.
    pub transition_delay: Option<Duration>,
    /// Distance buffer applied in the direction of travel.
    pub hysteresis: Option<f32>,
}

/// Default debounce before a level change is committed.
pub const DEFAULT_TRANSITION_DELAY: Duration = Duration::from_millis(300);

/// Default hysteresis buffer, in scene units.
pub const DEFAULT_HYSTERESIS: f32 = 1.0;

/// Level-of-detail configuration owned by one tracked subject.
#[derive(Clone, Debug)]
pub struct LodConfiguration {
    pub subject_id: String,
    /// Opaque asset path passed through to the asset-swapping layer.
    pub base_asset_path: String,
    pub ladder: Ladder,
    pub transition_delay: Duration,
    pub hysteresis: f32,
}

impl LodConfiguration {
    /// Merge `overrides` onto the default vehicle configuration.
    pub fn build(
        subject_id: &str,
        base_asset_path: &str,
        overrides: LodOverride,
    ) -> Result<Self, LodError> {
        let ladder = match overrides.levels {
            Some(levels) => Ladder::new(levels)?,
            None => Ladder::vehicle_default(),
        };
        let hysteresis = overrides.hysteresis.unwrap_or(DEFAULT_HYSTERESIS);
        if !hysteresis.is_finite() || hysteresis < 0.0 {
            return Err(LodError::InvalidHysteresis(hysteresis));
        }
        Ok(Self {
            subject_id: subject_id.to_string(),
            base_asset_path: base_asset_path.to_string(),
            ladder,
            transition_delay: overrides
                .transition_delay
                .unwrap_or(DEFAULT_TRANSITION_DELAY),
            hysteresis,
        })
    }

    /// Asset path to load for `level`: its own override or the subject's base path.
    pub fn asset_path_for<'a>(&'a self, level: &'a DetailLevel) -> &'a str {
        level
            .asset_path
            .as_deref()
            .unwrap_or(self.base_asset_path.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ladder_has_five_sorted_levels() {
        let ladder = Ladder::vehicle_default();
        assert_eq!(ladder.len(), 5);
        let ids: Vec<_> = ladder.levels().iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, ["ultra", "high", "medium", "low", "minimal"]);
        for pair in ladder.levels().windows(2) {
            assert!(pair[1].distance_threshold >= pair[0].distance_threshold);
        }
    }

    #[test]
    fn test_default_ladder_quality_decays_with_distance() {
        let ladder = Ladder::vehicle_default();
        for pair in ladder.levels().windows(2) {
            assert!(pair[1].geometry_complexity <= pair[0].geometry_complexity);
            assert!(pair[1].texture_resolution <= pair[0].texture_resolution);
        }
        // The default ladder must pass its own validation.
        assert!(Ladder::new(ladder.levels().to_vec()).is_ok());
    }

    #[test]
    fn test_default_ladder_shadow_quality() {
        let ladder = Ladder::vehicle_default();
        assert_eq!(ladder.get("ultra").unwrap().shadow_quality, ShadowQuality::High);
        assert_eq!(ladder.get("minimal").unwrap().shadow_quality, ShadowQuality::None);
        let medium = ladder.get("medium").unwrap();
        let reduction = 1.0 - medium.geometry_complexity;
        assert!(reduction > 0.0 && reduction < 1.0);
    }

    #[test]
    fn test_new_sorts_levels_by_threshold() {
        let ladder = Ladder::new(vec![
            DetailLevel::new("far", "Far", 50.0, 0.3, 0.3),
            DetailLevel::new("near", "Near", 0.0, 1.0, 1.0),
            DetailLevel::new("mid", "Mid", 20.0, 0.6, 0.5),
        ])
        .unwrap();
        let ids: Vec<_> = ladder.levels().iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, ["near", "mid", "far"]);
    }

    #[test]
    fn test_empty_ladder_rejected() {
        assert!(matches!(Ladder::new(Vec::new()), Err(LodError::EmptyLadder)));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = Ladder::new(vec![
            DetailLevel::new("a", "A", 0.0, 1.0, 1.0),
            DetailLevel::new("a", "A again", 10.0, 0.5, 0.5),
        ]);
        assert!(matches!(result, Err(LodError::DuplicateLevel(id)) if id == "a"));
    }

    #[test]
    fn test_quality_increase_rejected() {
        let result = Ladder::new(vec![
            DetailLevel::new("near", "Near", 0.0, 0.5, 1.0),
            DetailLevel::new("far", "Far", 10.0, 0.9, 0.5),
        ]);
        assert!(matches!(
            result,
            Err(LodError::QualityIncreasesWithDistance { .. })
        ));
    }

    #[test]
    fn test_negative_or_nan_threshold_rejected() {
        let negative = Ladder::new(vec![DetailLevel::new("x", "X", -1.0, 1.0, 1.0)]);
        assert!(matches!(negative, Err(LodError::InvalidThreshold { .. })));
        let nan = Ladder::new(vec![DetailLevel::new("x", "X", f32::NAN, 1.0, 1.0)]);
        assert!(matches!(nan, Err(LodError::InvalidThreshold { .. })));
    }

    #[test]
    fn test_factor_out_of_range_rejected() {
        let result = Ladder::new(vec![DetailLevel::new("x", "X", 0.0, 1.5, 1.0)]);
        assert!(matches!(result, Err(LodError::FactorOutOfRange { .. })));
    }

    #[test]
    fn test_level_for_distance_closed_lower_bound() {
        let ladder = Ladder::vehicle_default();
        assert_eq!(ladder.level_for_distance(0.0).id, "ultra");
        assert_eq!(ladder.level_for_distance(4.999).id, "ultra");
        assert_eq!(ladder.level_for_distance(5.0).id, "high");
        assert_eq!(ladder.level_for_distance(10.0).id, "medium");
        assert_eq!(ladder.level_for_distance(15.0).id, "low");
        assert_eq!(ladder.level_for_distance(1.0e6).id, "low");
        assert_eq!(ladder.level_for_distance(f32::INFINITY).id, "minimal");
    }

    #[test]
    fn test_level_for_distance_below_first_threshold_uses_first() {
        let ladder = Ladder::new(vec![
            DetailLevel::new("near", "Near", 3.0, 1.0, 1.0),
            DetailLevel::new("far", "Far", 8.0, 0.5, 0.5),
        ])
        .unwrap();
        assert_eq!(ladder.level_for_distance(1.0).id, "near");
    }

    #[test]
    fn test_configuration_merges_overrides() {
        let config = LodConfiguration::build(
            "car-1",
            "/models/car.glb",
            LodOverride {
                hysteresis: Some(2.5),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(config.hysteresis, 2.5);
        assert_eq!(config.transition_delay, DEFAULT_TRANSITION_DELAY);
        assert_eq!(config.ladder, Ladder::vehicle_default());
    }

    #[test]
    fn test_configuration_rejects_negative_hysteresis() {
        let result = LodConfiguration::build(
            "car-1",
            "/models/car.glb",
            LodOverride {
                hysteresis: Some(-1.0),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(LodError::InvalidHysteresis(_))));
    }

    #[test]
    fn test_asset_path_falls_back_to_base() {
        let mut levels = Ladder::vehicle_default().levels().to_vec();
        levels[4] = levels[4].clone().with_asset_path("/models/car_impostor.glb");
        let config = LodConfiguration::build(
            "car-1",
            "/models/car.glb",
            LodOverride {
                levels: Some(levels),
                ..Default::default()
            },
        )
        .unwrap();
        let ultra = config.ladder.get("ultra").unwrap();
        let minimal = config.ladder.get("minimal").unwrap();
        assert_eq!(config.asset_path_for(ultra), "/models/car.glb");
        assert_eq!(config.asset_path_for(minimal), "/models/car_impostor.glb");
    }
}
