//! Resource lifecycle for the configurator: a tracked-resource registry with
//! pressure-driven cleanup, and a budgeted cache of quality-reduced textures.

mod clock;
mod error;
mod eviction;
mod heap;
mod manager;
mod metrics;
mod monitor;
mod resource;
mod texture;
mod texture_cache;
mod texture_quality;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DisposeError, MonitorError, TextureError, UnknownPresetError};
pub use eviction::{CleanupReport, CleanupTier, EvictionCandidate, eviction_order};
pub use heap::{HeapProbe, HeapUsage, NoHeapProbe};
pub use manager::{
    DEFAULT_MONITOR_INTERVAL, MemoryCallbacks, MemoryManager, MemoryManagerBuilder,
    PressureCallback,
};
pub use metrics::{
    DEFAULT_HISTORY_CAPACITY, KindBreakdown, MemorySample, MemoryStats, MemoryThresholds,
    PressureLevel, SampleHistory, ThresholdUpdate, bytes_to_mb,
};
pub use resource::{DisposeFn, ManagedResource, ResourceInfo, ResourceKind};
pub use texture::{Texture, mip_level_count};
pub use texture_cache::{
    CachedTextureVariant, DEFAULT_TEXTURE_BUDGET_MB, OptimizeRequest, RenderCapabilities,
    TextureCache, TextureMemoryInfo, fit_within,
};
pub use texture_quality::{QualityPreset, QualitySettings, TextureEncoding};
