//! Conversions from the persisted config into the runtime types of each crate.

use std::time::Duration;

use revline_config::{LodConfig, MemoryConfig, TextureConfig};
use revline_lod::{DetailLevel, LodOverride};
use revline_memory::{MemoryThresholds, QualityPreset, RenderCapabilities, TextureCache};

pub fn lod_override(config: &LodConfig) -> LodOverride {
    LodOverride {
        levels: None,
        transition_delay: Some(Duration::from_millis(config.transition_delay_ms)),
        hysteresis: Some(config.hysteresis),
    }
}

pub fn memory_thresholds(config: &MemoryConfig) -> MemoryThresholds {
    MemoryThresholds {
        warning_percentage: config.warning_percentage,
        critical_percentage: config.critical_percentage,
        emergency_percentage: config.emergency_percentage,
    }
}

/// Monitor interval, or `None` when monitoring is disabled or the interval is zero.
pub fn monitor_interval(config: &MemoryConfig) -> Option<Duration> {
    (config.monitoring_enabled && config.monitor_interval_ms > 0)
        .then(|| Duration::from_millis(config.monitor_interval_ms))
}

/// The configured default preset, falling back to `High` for unknown names.
pub fn default_preset(config: &TextureConfig) -> QualityPreset {
    config.default_preset.parse().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Falling back to the high texture preset");
        QualityPreset::High
    })
}

pub fn texture_cache(config: &TextureConfig) -> TextureCache {
    let mut cache = TextureCache::new(config.budget_mb);
    if let Some(max_anisotropy) = config.max_anisotropy {
        cache.set_capabilities(RenderCapabilities { max_anisotropy });
    }
    cache.set_variant_ttl(config.variant_ttl_secs.map(Duration::from_secs));
    cache
}

/// Preset matching a level's texture resolution, never better than `ceiling`.
pub fn preset_for_level(level: &DetailLevel, ceiling: QualityPreset) -> QualityPreset {
    let preset = match level.texture_resolution {
        r if r >= 1.0 => QualityPreset::Ultra,
        r if r >= 0.75 => QualityPreset::High,
        r if r >= 0.5 => QualityPreset::Medium,
        r if r >= 0.3 => QualityPreset::Low,
        _ => QualityPreset::Minimal,
    };
    // Presets order from best to worst, so the larger one is the lower quality.
    preset.max(ceiling)
}

#[cfg(test)]
mod tests {
    use revline_config::Config;
    use revline_lod::Ladder;

    use super::*;

    #[test]
    fn test_lod_override_from_config() {
        let config = LodConfig {
            transition_delay_ms: 0,
            hysteresis: 2.0,
            update_every_n_frames: 1,
        };
        let overrides = lod_override(&config);
        assert_eq!(overrides.transition_delay, Some(Duration::ZERO));
        assert_eq!(overrides.hysteresis, Some(2.0));
        assert!(overrides.levels.is_none());
    }

    #[test]
    fn test_default_thresholds_match_memory_defaults() {
        let config = Config::default();
        assert_eq!(memory_thresholds(&config.memory), MemoryThresholds::default());
    }

    #[test]
    fn test_monitor_interval() {
        let mut config = MemoryConfig::default();
        assert_eq!(monitor_interval(&config), Some(Duration::from_secs(5)));
        config.monitor_interval_ms = 0;
        assert_eq!(monitor_interval(&config), None);
        config.monitor_interval_ms = 100;
        config.monitoring_enabled = false;
        assert_eq!(monitor_interval(&config), None);
    }

    #[test]
    fn test_unknown_preset_falls_back_to_high() {
        let mut config = TextureConfig::default();
        config.default_preset = "Medium".to_string();
        assert_eq!(default_preset(&config), QualityPreset::Medium);
        config.default_preset = "cinematic".to_string();
        assert_eq!(default_preset(&config), QualityPreset::High);
    }

    #[test]
    fn test_texture_cache_from_config() {
        let mut config = TextureConfig::default();
        config.budget_mb = 64.0;
        let cache = texture_cache(&config);
        assert!((cache.budget_mb() - 64.0).abs() < 1e-9);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_preset_follows_default_ladder() {
        let ladder = Ladder::vehicle_default();
        let presets: Vec<_> = ladder
            .levels()
            .iter()
            .map(|level| preset_for_level(level, QualityPreset::Ultra))
            .collect();
        assert_eq!(
            presets,
            [
                QualityPreset::Ultra,
                QualityPreset::High,
                QualityPreset::Medium,
                QualityPreset::Low,
                QualityPreset::Minimal,
            ]
        );
    }

    #[test]
    fn test_preset_capped_by_ceiling() {
        let ladder = Ladder::vehicle_default();
        let ultra = ladder.first();
        assert_eq!(preset_for_level(ultra, QualityPreset::Medium), QualityPreset::Medium);
        let minimal = ladder.get("minimal").unwrap();
        assert_eq!(preset_for_level(minimal, QualityPreset::High), QualityPreset::Minimal);
    }
}
