//! Headless showroom demo for the Revline resource-lifecycle core.
//!
//! Configuration is loaded from `revline.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p revline-demo`.
//! Run with `cargo run -p revline-demo -- --preset medium --transition-delay-ms 0` to override.

mod scene;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use glam::Vec3;
use revline_config::{CliArgs, Config, default_config_dir};
use revline_lod::LodManager;
use revline_memory::{
    CleanupTier, ManagedResource, MemoryCallbacks, MemoryManager, MemorySample, OptimizeRequest,
    QualityPreset, ResourceKind, bytes_to_mb,
};
use tracing::{info, warn};

use crate::scene::{OrbitCamera, Showroom, SimulatedHeap, Vehicle};

/// Simulated frame time (60 Hz).
const FRAME_TIME: Duration = Duration::from_micros(16_667);

const MB: u64 = 1024 * 1024;

/// Simulated heap: a small limit so paint variants push it across the thresholds.
const HEAP_LIMIT: u64 = 12 * MB;
const HEAP_BASELINE: u64 = 5 * MB;

/// Walks one vehicle through the selector scenarios at fixed distances.
fn demonstrate_level_selection(config: &Config) {
    info!("Starting detail-level selection demonstration");

    let mut lod = LodManager::new();
    if let Err(err) =
        lod.register_subject("car-1", "/models/car-1.glb", settings::lod_override(&config.lod))
    {
        warn!(error = %err, "Could not register demonstration vehicle");
        return;
    }

    for distance in [2.0, 7.0, 20.0] {
        if let Some(level) = lod.select_level("car-1", distance) {
            info!("  {distance:>5.1} m -> {} ({})", level.id, level.name);
        }
    }

    lod.force_level("car-1", "low");
    if let Some((level, subject)) = lod.current_level("car-1") {
        info!(
            "  Forced: {} from {}",
            level.name,
            subject.asset_path_for(level)
        );
    }

    lod.cleanup_all();
    info!("Detail-level selection demonstration completed");
}

/// Registers and unregisters resources directly, then runs each cleanup tier.
fn demonstrate_memory_tiers() {
    info!("Starting memory tier demonstration");

    let memory = MemoryManager::new();
    memory.register(ManagedResource::new(
        "texture-1",
        ResourceKind::Texture,
        10 * MB,
        || Ok(()),
    ));
    memory.register(ManagedResource::new(
        "geometry-1",
        ResourceKind::Geometry,
        5 * MB,
        || Ok(()),
    ));
    info!(
        "  Managed: {:.1} MB",
        memory.memory_metrics().total_managed_mb
    );
    memory.unregister("texture-1");
    info!(
        "  After unregister: {:.1} MB",
        memory.memory_metrics().total_managed_mb
    );

    for i in 0..10 {
        memory.register(ManagedResource::new(
            format!("scratch-{i}"),
            ResourceKind::RenderTarget,
            MB,
            || Ok(()),
        ));
    }
    for tier in [
        CleanupTier::Gentle,
        CleanupTier::Aggressive,
        CleanupTier::Emergency,
    ] {
        if let Some(report) = memory.force_cleanup(tier) {
            info!(
                "  {tier}: removed {} resources, freed {:.1} MB, {} remain",
                report.evicted.len(),
                report.freed_mb(),
                memory.resource_count()
            );
        }
    }

    memory.dispose();
    info!("Memory tier demonstration completed");
}

/// Optimizes one texture at every preset in a single batch.
fn demonstrate_texture_presets(config: &Config) {
    info!("Starting texture preset demonstration");

    let mut cache = settings::texture_cache(&config.texture);
    let badge = Vehicle::new("badge", Vec3::ZERO, 600, [180, 140, 20]).paint;
    let requests: Vec<_> = QualityPreset::ALL
        .into_iter()
        .map(|preset| OptimizeRequest {
            source: Arc::clone(&badge),
            preset,
            texture_id: "badge".to_string(),
        })
        .collect();

    for (request, variant) in requests.iter().zip(cache.optimize_batch(&requests)) {
        info!(
            "  {:<8} {}x{} mips={} aniso={} {:.2} MB",
            request.preset.as_str(),
            variant.width(),
            variant.height(),
            variant.mip_level_count(),
            variant.anisotropy(),
            bytes_to_mb(variant.size_bytes())
        );
    }

    let again = cache.optimize(&badge, QualityPreset::Low, "badge");
    let cached = cache
        .variant("badge", QualityPreset::Low)
        .is_some_and(|v| Arc::ptr_eq(v.texture(), &again));
    info!("  Repeated request served from cache: {cached}");
    info!("Texture preset demonstration completed");
}

/// Orbits the camera around two vehicles with every service live.
fn run_showroom(config: &Config, frames: u32) {
    info!("Starting showroom simulation ({frames} frames)");

    let heap = SimulatedHeap::new(HEAP_BASELINE, HEAP_LIMIT);
    let memory = MemoryManager::builder()
        .heap_probe(heap.probe())
        .thresholds(settings::memory_thresholds(&config.memory))
        .history_capacity(config.memory.history_capacity)
        .build();
    memory.set_callbacks(MemoryCallbacks {
        on_warning: Some(Arc::new(|sample: &MemorySample| {
            warn!(
                "Memory warning at {:.1}% heap usage",
                sample.usage_percentage()
            );
        })),
        on_emergency: Some(Arc::new(|sample: &MemorySample| {
            warn!(
                "Memory emergency: {:.2} MB managed",
                sample.total_managed_mb
            );
        })),
        ..MemoryCallbacks::default()
    });

    let ceiling = settings::default_preset(&config.texture);
    let mut showroom = Showroom::new(
        memory,
        settings::texture_cache(&config.texture),
        heap,
        ceiling,
    );

    let vehicles = [
        Vehicle::new("car-1", Vec3::ZERO, 512, [160, 20, 20]),
        Vehicle::new("car-2", Vec3::new(8.0, 0.0, 0.0), 512, [20, 40, 160]),
    ];
    for vehicle in vehicles {
        if let Err(err) = showroom.add_vehicle(vehicle, settings::lod_override(&config.lod)) {
            warn!(error = %err, "Could not register vehicle");
        }
    }

    if let Some(interval) = settings::monitor_interval(&config.memory)
        && let Err(err) = showroom.memory().start_monitoring(interval)
    {
        warn!(error = %err, "Memory monitoring unavailable");
    }

    let camera = OrbitCamera {
        center: Vec3::new(4.0, 0.0, 0.0),
        height: 1.5,
        min_radius: 3.0,
        max_radius: 30.0,
        angular_speed: 0.4,
        zoom_period: 8.0,
    };
    let update_every = config.lod.update_every_n_frames.max(1);
    let stats_every = config.debug.stats_every_n_frames;
    let start = Instant::now();
    let mut transitions = 0;

    for frame in 0..frames {
        let elapsed = FRAME_TIME * frame;
        let now = start + elapsed;

        if frame % update_every == 0 {
            let position = camera.position_at(elapsed.as_secs_f32());
            transitions += showroom.step(position, now).len();
        }
        // Once a simulated second; the background monitor runs on wall-clock time.
        if frame % 60 == 59 {
            showroom.memory().sample_and_evaluate();
            showroom.textures_mut().purge_expired();
        }
        if stats_every > 0 && frame % stats_every == 0 {
            showroom.log_statistics();
        }
    }

    info!(
        "Showroom: {} vehicles, {transitions} level changes, {} cached variants, heap {:.2} MB of {:.0} MB",
        showroom.lod().subject_count(),
        showroom.textures().len(),
        bytes_to_mb(showroom.heap().used()),
        bytes_to_mb(HEAP_LIMIT)
    );
    showroom.log_statistics();
    showroom.shutdown();
    info!("Showroom simulation completed");
}

fn main() {
    let args = CliArgs::parse();

    let config_dir = args
        .config
        .clone()
        .or_else(default_config_dir)
        .unwrap_or_else(|| PathBuf::from(".revline"));

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    if let Err(err) =
        revline_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config))
    {
        eprintln!("Logging already initialized: {err}");
    }

    demonstrate_level_selection(&config);
    demonstrate_memory_tiers();
    demonstrate_texture_presets(&config);
    run_showroom(&config, args.frames);
}
