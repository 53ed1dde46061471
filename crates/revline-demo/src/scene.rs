//! A headless showroom: vehicles on a turntable, an orbiting camera, and the
//! three lifecycle services wired together.

use std::f32::consts::TAU;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use glam::Vec3;
use image::{Rgba, RgbaImage};
use revline_lod::{LevelChange, LodError, LodManager, LodOverride};
use revline_memory::{
    HeapUsage, ManagedResource, MemoryManager, QualityPreset, ResourceKind, Texture, TextureCache,
    bytes_to_mb,
};
use tracing::info;

use crate::settings::preset_for_level;

/// Camera circling the scene centre while drifting in and out.
#[derive(Clone, Copy, Debug)]
pub struct OrbitCamera {
    pub center: Vec3,
    pub height: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    /// Radians per second around the centre.
    pub angular_speed: f32,
    /// Seconds for one full in-and-out radius cycle.
    pub zoom_period: f32,
}

impl OrbitCamera {
    pub fn radius_at(&self, seconds: f32) -> f32 {
        let mid = (self.min_radius + self.max_radius) * 0.5;
        let amplitude = (self.max_radius - self.min_radius) * 0.5;
        mid - amplitude * (TAU * seconds / self.zoom_period).cos()
    }

    pub fn position_at(&self, seconds: f32) -> Vec3 {
        let radius = self.radius_at(seconds);
        let angle = self.angular_speed * seconds;
        self.center + Vec3::new(radius * angle.cos(), self.height, radius * angle.sin())
    }
}

/// Fake heap whose usage is a baseline plus whatever the showroom allocates.
#[derive(Clone, Debug)]
pub struct SimulatedHeap {
    used: Arc<AtomicU64>,
    limit: u64,
}

impl SimulatedHeap {
    pub fn new(baseline: u64, limit: u64) -> Self {
        Self {
            used: Arc::new(AtomicU64::new(baseline)),
            limit,
        }
    }

    pub fn allocate(&self, bytes: u64) {
        self.used.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn release(&self, bytes: u64) {
        // Saturate instead of wrapping if a release is double counted.
        let _ = self
            .used
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |used| {
                Some(used.saturating_sub(bytes))
            });
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::Relaxed)
    }

    pub fn usage(&self) -> HeapUsage {
        HeapUsage {
            limit: self.limit,
            total: self.limit,
            used: self.used(),
        }
    }

    /// A probe for [`MemoryManager::builder`].
    pub fn probe(&self) -> impl Fn() -> Option<HeapUsage> + Send + Sync + 'static {
        let heap = self.clone();
        move || Some(heap.usage())
    }
}

/// A vehicle placed in the showroom.
#[derive(Clone, Debug)]
pub struct Vehicle {
    pub id: String,
    pub position: Vec3,
    pub paint: Arc<Texture>,
    pub geometry_bytes: u64,
}

impl Vehicle {
    /// A vehicle with a procedural `size x size` paint texture.
    pub fn new(id: &str, position: Vec3, paint_size: u32, tint: [u8; 3]) -> Self {
        let paint = RgbaImage::from_fn(paint_size, paint_size, |x, y| {
            let shade = ((x ^ y) & 0x1f) as u8;
            Rgba([
                tint[0].saturating_add(shade),
                tint[1].saturating_add(shade),
                tint[2].saturating_add(shade),
                255,
            ])
        });
        Self {
            id: id.to_string(),
            position,
            paint: Arc::new(Texture::new(paint)),
            geometry_bytes: 512 * 1024,
        }
    }

    fn paint_id(&self) -> String {
        format!("{}/paint", self.id)
    }
}

/// Owns the lifecycle services and routes committed level changes into
/// texture variants tracked by the memory manager.
pub struct Showroom {
    lod: LodManager,
    memory: MemoryManager,
    textures: TextureCache,
    heap: SimulatedHeap,
    vehicles: Vec<Vehicle>,
    preset_ceiling: QualityPreset,
}

impl Showroom {
    pub fn new(
        memory: MemoryManager,
        textures: TextureCache,
        heap: SimulatedHeap,
        preset_ceiling: QualityPreset,
    ) -> Self {
        Self {
            lod: LodManager::new(),
            memory,
            textures,
            heap,
            vehicles: Vec::new(),
            preset_ceiling,
        }
    }

    /// Register `vehicle` for LOD, track its geometry as essential, and load
    /// the paint variant of its starting level.
    pub fn add_vehicle(&mut self, vehicle: Vehicle, overrides: LodOverride) -> Result<(), LodError> {
        let asset_path = format!("/models/{}.glb", vehicle.id);
        self.lod.register_subject(&vehicle.id, &asset_path, overrides)?;

        let heap = self.heap.clone();
        let bytes = vehicle.geometry_bytes;
        heap.allocate(bytes);
        self.memory.register(
            ManagedResource::new(
                format!("{}/geometry", vehicle.id),
                ResourceKind::Geometry,
                bytes,
                move || {
                    heap.release(bytes);
                    Ok(())
                },
            )
            .essential(),
        );

        let start_level = self
            .lod
            .current_level(&vehicle.id)
            .map(|(level, _)| level.clone());
        self.vehicles.push(vehicle);
        if let (Some(level), Some(index)) = (start_level, self.vehicles.len().checked_sub(1)) {
            self.load_paint(index, &level);
        }
        Ok(())
    }

    /// Feed the camera position to every vehicle and apply every change
    /// committed this frame, immediate or debounced.
    pub fn step(&mut self, camera: Vec3, now: Instant) -> Vec<LevelChange> {
        let mut changes = Vec::new();
        for vehicle in &self.vehicles {
            let before = self.current_level_id(&vehicle.id);
            self.lod
                .update_subject(&vehicle.id, camera - vehicle.position, now, None);
            if let (Some(old_level_id), Some((level, _))) =
                (before, self.lod.current_level(&vehicle.id))
                && level.id != old_level_id
            {
                changes.push(LevelChange {
                    subject_id: vehicle.id.clone(),
                    new_level: level.clone(),
                    old_level_id,
                });
            }
        }
        changes.extend(self.lod.poll_transitions(now));

        for change in &changes {
            info!(
                vehicle = %change.subject_id,
                from = %change.old_level_id,
                to = %change.new_level.id,
                "Vehicle detail changed"
            );
            if let Some(index) = self.vehicles.iter().position(|v| v.id == change.subject_id) {
                self.load_paint(index, &change.new_level);
            }
        }
        changes
    }

    fn current_level_id(&self, vehicle_id: &str) -> Option<String> {
        self.lod
            .current_level(vehicle_id)
            .map(|(level, _)| level.id.clone())
    }

    fn load_paint(&mut self, index: usize, level: &revline_lod::DetailLevel) {
        let vehicle = &self.vehicles[index];
        let preset = preset_for_level(level, self.preset_ceiling);
        let texture = self
            .textures
            .optimize(&vehicle.paint, preset, &vehicle.paint_id());

        let resource_id = format!("{}/{preset}", vehicle.paint_id());
        if self.memory.access(&resource_id) {
            return;
        }

        let heap = self.heap.clone();
        let bytes = texture.size_bytes();
        heap.allocate(bytes);
        self.memory.register(ManagedResource::new(
            resource_id,
            ResourceKind::Texture,
            bytes,
            move || {
                heap.release(bytes);
                Ok(())
            },
        ));
    }

    pub fn lod(&self) -> &LodManager {
        &self.lod
    }

    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    pub fn textures_mut(&mut self) -> &mut TextureCache {
        &mut self.textures
    }

    pub fn heap(&self) -> &SimulatedHeap {
        &self.heap
    }

    pub fn log_statistics(&self) {
        for (vehicle, stats) in self.lod.statistics() {
            info!(
                vehicle = %vehicle,
                level = %stats.current_level_id,
                distance = %format!("{:.1}", stats.last_distance.unwrap_or(0.0)),
                pending = ?stats.pending_level_id,
                "LOD state"
            );
        }

        let memory = self.memory.memory_stats();
        info!(
            heap_used_mb = %format!("{:.2}", bytes_to_mb(memory.current.heap_used)),
            peak_mb = %format!("{:.2}", bytes_to_mb(memory.peak.heap_used)),
            average_mb = %format!("{:.2}", bytes_to_mb(memory.average.heap_used)),
            managed_mb = %format!("{:.2}", memory.current.total_managed_mb),
            resources = self.memory.resource_count(),
            "Memory statistics"
        );
        for (kind, breakdown) in &memory.resource_breakdown {
            info!(
                kind = %kind,
                count = breakdown.count,
                memory_mb = %format!("{:.2}", breakdown.memory_mb),
                "Managed resources"
            );
        }

        let textures = self.textures.memory_info();
        info!(
            variants = textures.total_textures,
            total_mb = %format!("{:.2}", textures.total_memory_mb),
            largest_mb = %format!("{:.2}", textures.largest_texture_mb),
            oldest_age_ms = textures.oldest_texture_age.as_millis() as u64,
            "Texture cache"
        );
    }

    /// Drop every subject, release every tracked resource, and empty the cache.
    pub fn shutdown(&mut self) {
        self.lod.cleanup_all();
        self.memory.dispose();
        self.textures.clear_cache();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use revline_memory::CleanupTier;

    use super::*;

    const MB: u64 = 1024 * 1024;

    fn showroom(heap: &SimulatedHeap, ceiling: QualityPreset) -> Showroom {
        let memory = MemoryManager::builder().heap_probe(heap.probe()).build();
        Showroom::new(memory, TextureCache::default(), heap.clone(), ceiling)
    }

    fn immediate() -> LodOverride {
        LodOverride {
            transition_delay: Some(Duration::ZERO),
            ..LodOverride::default()
        }
    }

    #[test]
    fn test_orbit_radius_stays_in_bounds() {
        let camera = OrbitCamera {
            center: Vec3::ZERO,
            height: 1.5,
            min_radius: 2.0,
            max_radius: 30.0,
            angular_speed: 0.4,
            zoom_period: 20.0,
        };
        assert!((camera.radius_at(0.0) - 2.0).abs() < 1e-4);
        assert!((camera.radius_at(10.0) - 30.0).abs() < 1e-3);
        for i in 0..200 {
            let r = camera.radius_at(i as f32 * 0.37);
            assert!((2.0 - 1e-3..=30.0 + 1e-3).contains(&r));
        }
        let p = camera.position_at(0.0);
        assert!((p - Vec3::new(2.0, 1.5, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_simulated_heap_accounting() {
        let heap = SimulatedHeap::new(10 * MB, 100 * MB);
        heap.allocate(5 * MB);
        assert_eq!(heap.used(), 15 * MB);
        heap.release(20 * MB);
        assert_eq!(heap.used(), 0);
        let probe = heap.probe();
        assert_eq!(probe().unwrap().limit, 100 * MB);
    }

    #[test]
    fn test_vehicle_registration_tracks_geometry_and_paint() {
        let heap = SimulatedHeap::new(0, 100 * MB);
        let mut room = showroom(&heap, QualityPreset::Ultra);
        room.add_vehicle(Vehicle::new("car-1", Vec3::ZERO, 64, [200, 10, 10]), immediate())
            .unwrap();

        assert!(room.memory().contains("car-1/geometry"));
        assert!(room.memory().contains("car-1/paint/ultra"));
        assert!(room.textures().variant("car-1/paint", QualityPreset::Ultra).is_some());
        assert!(heap.used() > 512 * 1024);
    }

    #[test]
    fn test_step_switches_paint_variant() {
        let heap = SimulatedHeap::new(0, 100 * MB);
        let mut room = showroom(&heap, QualityPreset::Ultra);
        room.add_vehicle(Vehicle::new("car-1", Vec3::ZERO, 64, [10, 10, 200]), immediate())
            .unwrap();

        let changes = room.step(Vec3::new(20.0, 0.0, 0.0), Instant::now());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old_level_id, "ultra");
        assert_eq!(changes[0].new_level.id, "low");
        assert!(room.memory().contains("car-1/paint/low"));

        // Approaching from 20 to 7 lands in "high" after the hysteresis buffer.
        let changes = room.step(Vec3::new(7.0, 0.0, 0.0), Instant::now());
        assert_eq!(changes[0].new_level.id, "high");
        assert!(room.memory().contains("car-1/paint/high"));

        assert!(room.step(Vec3::new(7.0, 0.0, 0.0), Instant::now()).is_empty());
    }

    #[test]
    fn test_debounced_change_loads_variant() {
        let heap = SimulatedHeap::new(0, 100 * MB);
        let mut room = showroom(&heap, QualityPreset::Ultra);
        let delayed = LodOverride {
            transition_delay: Some(Duration::from_millis(300)),
            ..LodOverride::default()
        };
        room.add_vehicle(Vehicle::new("car-1", Vec3::ZERO, 64, [10, 200, 10]), delayed)
            .unwrap();

        let start = Instant::now();
        assert!(room.step(Vec3::new(12.0, 0.0, 0.0), start).is_empty());
        let changes = room.step(Vec3::new(12.0, 0.0, 0.0), start + Duration::from_millis(300));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].new_level.id, "medium");
        assert!(room.memory().contains("car-1/paint/medium"));
    }

    #[test]
    fn test_cleanup_releases_heap_but_keeps_geometry() {
        let heap = SimulatedHeap::new(0, 100 * MB);
        let mut room = showroom(&heap, QualityPreset::Ultra);
        room.add_vehicle(Vehicle::new("car-1", Vec3::ZERO, 64, [90, 90, 90]), immediate())
            .unwrap();
        let before = heap.used();

        let report = room.memory().force_cleanup(CleanupTier::Emergency).unwrap();
        assert_eq!(report.evicted, ["car-1/paint/ultra"]);
        assert_eq!(heap.used(), before - report.freed_bytes);
        assert!(room.memory().contains("car-1/geometry"));

        room.shutdown();
        assert_eq!(heap.used(), 0);
        assert_eq!(room.lod().subject_count(), 0);
        assert!(room.textures().is_empty());
    }
}
