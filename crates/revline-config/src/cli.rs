//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Revline command-line arguments.
///
/// CLI values override settings loaded from `revline.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "revline", about = "Revline configurator runtime")]
pub struct CliArgs {
    /// Default texture quality preset (ultra, high, medium, low, minimal).
    #[arg(long)]
    pub preset: Option<String>,

    /// Texture variant budget in MB.
    #[arg(long)]
    pub texture_budget_mb: Option<f64>,

    /// LOD transition delay in milliseconds.
    #[arg(long)]
    pub transition_delay_ms: Option<u64>,

    /// LOD hysteresis band in scene units.
    #[arg(long)]
    pub hysteresis: Option<f32>,

    /// Memory monitor sampling interval in milliseconds.
    #[arg(long)]
    pub monitor_interval_ms: Option<u64>,

    /// Disable the background memory monitor.
    #[arg(long)]
    pub no_monitor: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Number of frames to simulate.
    #[arg(long, default_value_t = 600)]
    pub frames: u32,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref preset) = args.preset {
            self.texture.default_preset = preset.clone();
        }
        if let Some(budget) = args.texture_budget_mb {
            self.texture.budget_mb = budget;
        }
        if let Some(delay) = args.transition_delay_ms {
            self.lod.transition_delay_ms = delay;
        }
        if let Some(h) = args.hysteresis {
            self.lod.hysteresis = h;
        }
        if let Some(interval) = args.monitor_interval_ms {
            self.memory.monitor_interval_ms = interval;
        }
        if args.no_monitor {
            self.memory.monitoring_enabled = false;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
