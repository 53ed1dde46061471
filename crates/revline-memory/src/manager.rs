//! Registry of disposable resources with heap-pressure driven eviction.
//!
//! [`MemoryManager`] is a cheap, clonable handle. The render thread registers
//! and touches resources while the monitor thread samples heap usage and runs
//! cleanup passes; both see the same registry.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::error::MonitorError;
use crate::eviction::{CleanupReport, CleanupTier, EvictionCandidate, eviction_order};
use crate::heap::{HeapProbe, NoHeapProbe};
use crate::metrics::{
    DEFAULT_HISTORY_CAPACITY, KindBreakdown, MemorySample, MemoryStats, MemoryThresholds,
    PressureLevel, SampleHistory, ThresholdUpdate, bytes_to_mb,
};
use crate::monitor::MonitorHandle;
use crate::resource::{ManagedResource, ResourceInfo, ResourceKind};

/// Default sampling interval for [`MemoryManager::start_monitoring`].
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(5);

/// Listener invoked with the sample that crossed a pressure threshold.
pub type PressureCallback = Arc<dyn Fn(&MemorySample) + Send + Sync>;

/// Per-tier pressure listeners.
///
/// [`MemoryManager::set_callbacks`] replaces only the slots that are `Some`.
#[derive(Clone, Default)]
pub struct MemoryCallbacks {
    pub on_warning: Option<PressureCallback>,
    pub on_critical: Option<PressureCallback>,
    pub on_emergency: Option<PressureCallback>,
}

impl MemoryCallbacks {
    fn merge(&mut self, update: MemoryCallbacks) {
        if update.on_warning.is_some() {
            self.on_warning = update.on_warning;
        }
        if update.on_critical.is_some() {
            self.on_critical = update.on_critical;
        }
        if update.on_emergency.is_some() {
            self.on_emergency = update.on_emergency;
        }
    }

    fn for_level(&self, level: PressureLevel) -> Option<PressureCallback> {
        match level {
            PressureLevel::Normal => None,
            PressureLevel::Warning => self.on_warning.clone(),
            PressureLevel::Critical => self.on_critical.clone(),
            PressureLevel::Emergency => self.on_emergency.clone(),
        }
    }
}

impl fmt::Debug for MemoryCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCallbacks")
            .field("on_warning", &self.on_warning.is_some())
            .field("on_critical", &self.on_critical.is_some())
            .field("on_emergency", &self.on_emergency.is_some())
            .finish()
    }
}

fn tier_for(level: PressureLevel) -> Option<CleanupTier> {
    match level {
        PressureLevel::Normal => None,
        PressureLevel::Warning => Some(CleanupTier::Gentle),
        PressureLevel::Critical => Some(CleanupTier::Aggressive),
        PressureLevel::Emergency => Some(CleanupTier::Emergency),
    }
}

struct Entry {
    resource: ManagedResource,
    sequence: u64,
}

struct State {
    resources: HashMap<String, Entry>,
    history: SampleHistory,
    thresholds: MemoryThresholds,
    callbacks: MemoryCallbacks,
    next_sequence: u64,
}

struct Shared {
    state: Mutex<State>,
    cleanup_in_progress: AtomicBool,
    monitor: Mutex<Option<MonitorHandle>>,
    probe: Box<dyn HeapProbe>,
    clock: Arc<dyn Clock>,
}

/// Clears the in-flight flag when a cleanup pass ends, however it ends.
struct CleanupGuard<'a>(&'a AtomicBool);

impl<'a> CleanupGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Builder for a [`MemoryManager`] with non-default sources or limits.
pub struct MemoryManagerBuilder {
    probe: Box<dyn HeapProbe>,
    clock: Arc<dyn Clock>,
    thresholds: MemoryThresholds,
    history_capacity: usize,
}

impl MemoryManagerBuilder {
    #[must_use]
    pub fn heap_probe(mut self, probe: impl HeapProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn thresholds(mut self, thresholds: MemoryThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    #[must_use]
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn build(self) -> MemoryManager {
        MemoryManager {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    resources: HashMap::new(),
                    history: SampleHistory::new(self.history_capacity),
                    thresholds: self.thresholds,
                    callbacks: MemoryCallbacks::default(),
                    next_sequence: 0,
                }),
                cleanup_in_progress: AtomicBool::new(false),
                monitor: Mutex::new(None),
                probe: self.probe,
                clock: self.clock,
            }),
        }
    }
}

impl Default for MemoryManagerBuilder {
    fn default() -> Self {
        Self {
            probe: Box::new(NoHeapProbe),
            clock: Arc::new(SystemClock::new()),
            thresholds: MemoryThresholds::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// Tracks disposable resources and evicts them under heap pressure.
#[derive(Clone)]
pub struct MemoryManager {
    shared: Arc<Shared>,
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryManager")
            .field("resources", &self.resource_count())
            .field("monitoring", &self.is_monitoring())
            .finish_non_exhaustive()
    }
}

impl MemoryManager {
    /// A manager with no heap probe, the system clock and default thresholds.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> MemoryManagerBuilder {
        MemoryManagerBuilder::default()
    }

    /// Track `resource`, replacing any entry with the same id.
    ///
    /// The replaced entry is dropped without being disposed.
    pub fn register(&self, mut resource: ManagedResource) {
        resource.stamp_registered(self.shared.clock.now());
        let id = resource.id().to_string();
        let kind = resource.kind();
        let size_mb = bytes_to_mb(resource.size_bytes());

        let replaced = {
            let mut state = self.shared.state.lock();
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state
                .resources
                .insert(id.clone(), Entry { resource, sequence })
        };

        if replaced.is_some() {
            tracing::debug!(id = %id, "Replaced registered resource without disposing it");
        }
        tracing::debug!(id = %id, kind = %kind, size_mb = %format!("{size_mb:.2}"), "Registered resource");
    }

    /// Refresh recency and bump the access count. Returns `false` for an unknown id.
    pub fn access(&self, id: &str) -> bool {
        let now = self.shared.clock.now();
        let mut state = self.shared.state.lock();
        match state.resources.get_mut(id) {
            Some(entry) => {
                entry.resource.touch(now);
                true
            }
            None => false,
        }
    }

    /// Stop tracking `id` and hand the resource back without disposing it.
    pub fn unregister(&self, id: &str) -> Option<ManagedResource> {
        let entry = self.shared.state.lock().resources.remove(id)?;
        tracing::debug!(id, kind = %entry.resource.kind(), "Unregistered resource");
        Some(entry.resource)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.shared.state.lock().resources.contains_key(id)
    }

    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.shared.state.lock().resources.len()
    }

    /// Snapshot of a registered resource's bookkeeping.
    #[must_use]
    pub fn resource_info(&self, id: &str) -> Option<ResourceInfo> {
        self.shared
            .state
            .lock()
            .resources
            .get(id)
            .map(|entry| entry.resource.info())
    }

    #[must_use]
    pub fn thresholds(&self) -> MemoryThresholds {
        self.shared.state.lock().thresholds
    }

    /// Number of samples in the rolling history.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.shared.state.lock().history.len()
    }

    /// Whether a cleanup pass is running right now.
    #[must_use]
    pub fn is_cleanup_in_progress(&self) -> bool {
        self.shared.cleanup_in_progress.load(Ordering::Acquire)
    }

    /// Merge `update` into the thresholds. Applies from the next sample.
    pub fn set_thresholds(&self, update: ThresholdUpdate) {
        let thresholds = {
            let mut state = self.shared.state.lock();
            state.thresholds.merge(update);
            state.thresholds
        };
        tracing::info!(
            warning = thresholds.warning_percentage,
            critical = thresholds.critical_percentage,
            emergency = thresholds.emergency_percentage,
            "Memory thresholds updated"
        );
    }

    /// Replace the listener slots that are set in `callbacks`.
    pub fn set_callbacks(&self, callbacks: MemoryCallbacks) {
        self.shared.state.lock().callbacks.merge(callbacks);
    }

    /// Remove every pressure listener.
    pub fn clear_callbacks(&self) {
        self.shared.state.lock().callbacks = MemoryCallbacks::default();
    }

    /// Current heap and per-kind managed memory. Has no side effects.
    pub fn memory_metrics(&self) -> MemorySample {
        let heap = self.shared.probe.heap().unwrap_or_default();
        let timestamp = self.shared.clock.now();

        let mut by_kind: BTreeMap<ResourceKind, u64> = BTreeMap::new();
        let mut total = 0u64;
        {
            let state = self.shared.state.lock();
            for entry in state.resources.values() {
                let size = entry.resource.size_bytes();
                *by_kind.entry(entry.resource.kind()).or_default() += size;
                total += size;
            }
        }
        let mb = |kind| bytes_to_mb(by_kind.get(&kind).copied().unwrap_or(0));

        MemorySample {
            heap_limit: heap.limit,
            heap_total: heap.total,
            heap_used: heap.used,
            texture_mb: mb(ResourceKind::Texture),
            geometry_mb: mb(ResourceKind::Geometry),
            material_mb: mb(ResourceKind::Material),
            render_target_mb: mb(ResourceKind::RenderTarget),
            total_managed_mb: bytes_to_mb(total),
            timestamp,
        }
    }

    /// Current sample plus peak, average and per-kind breakdown.
    ///
    /// With an empty history, peak and average equal the current sample.
    pub fn memory_stats(&self) -> MemoryStats {
        let current = self.memory_metrics();
        let now = self.shared.clock.now();
        let state = self.shared.state.lock();

        let peak = state
            .history
            .peak()
            .cloned()
            .unwrap_or_else(|| current.clone());
        let average = state
            .history
            .average(now)
            .unwrap_or_else(|| current.clone());

        let mut resource_breakdown: BTreeMap<ResourceKind, KindBreakdown> = BTreeMap::new();
        for entry in state.resources.values() {
            let slot = resource_breakdown.entry(entry.resource.kind()).or_default();
            slot.count += 1;
            slot.memory_mb += bytes_to_mb(entry.resource.size_bytes());
        }

        MemoryStats {
            current,
            peak,
            average,
            resource_breakdown,
        }
    }

    /// Take a sample, record it, and react to the most severe threshold crossed.
    ///
    /// Fires at most one tier: its listener, then its cleanup pass. Called by
    /// the monitor thread on every tick and usable for manual ticking.
    pub fn sample_and_evaluate(&self) -> PressureLevel {
        let sample = self.memory_metrics();
        let usage = sample.usage_percentage();

        let (level, callback) = {
            let mut state = self.shared.state.lock();
            state.history.push(sample.clone());
            let level = state.thresholds.classify(usage);
            (level, state.callbacks.for_level(level))
        };

        match level {
            PressureLevel::Emergency => {
                tracing::error!(usage = %format!("{usage:.1}%"), "EMERGENCY: memory usage")
            }
            PressureLevel::Critical => {
                tracing::warn!(usage = %format!("{usage:.1}%"), "CRITICAL: memory usage")
            }
            PressureLevel::Warning => {
                tracing::warn!(usage = %format!("{usage:.1}%"), "WARNING: memory usage")
            }
            PressureLevel::Normal => {
                tracing::trace!(usage = %format!("{usage:.1}%"), "Memory sample")
            }
        }

        if let Some(callback) = callback {
            callback(&sample);
        }
        if let Some(tier) = tier_for(level) {
            self.force_cleanup(tier);
        }
        level
    }

    /// Run a cleanup pass at `tier`.
    ///
    /// Returns `None` without doing anything if another pass is in flight.
    /// Essential resources are never considered. A resource whose dispose
    /// fails stays registered and the pass moves on to the next candidate.
    pub fn force_cleanup(&self, tier: CleanupTier) -> Option<CleanupReport> {
        let Some(_guard) = CleanupGuard::try_acquire(&self.shared.cleanup_in_progress) else {
            tracing::debug!(%tier, "Cleanup already in progress, skipping");
            return None;
        };

        if tier == CleanupTier::Emergency {
            tracing::error!("Performing emergency memory cleanup");
        } else {
            tracing::info!(%tier, "Performing memory cleanup");
        }

        let candidates: Vec<EvictionCandidate> = {
            let state = self.shared.state.lock();
            state
                .resources
                .values()
                .map(|entry| EvictionCandidate {
                    id: entry.resource.id().to_string(),
                    last_accessed_at: entry.resource.last_accessed_at(),
                    access_count: entry.resource.access_count(),
                    is_essential: entry.resource.is_essential(),
                    sequence: entry.sequence,
                })
                .collect()
        };
        let order = eviction_order(candidates, tier);
        let target = tier.target(order.len());

        let mut report = CleanupReport::new(tier);
        for id in order {
            if report.evicted.len() >= target {
                break;
            }

            // Re-check under the lock: the entry may have been unregistered or
            // replaced by an essential one since the snapshot.
            let entry = {
                let mut state = self.shared.state.lock();
                match state.resources.get(&id) {
                    Some(entry) if !entry.resource.is_essential() => state.resources.remove(&id),
                    _ => None,
                }
            };
            let Some(mut entry) = entry else {
                continue;
            };

            match entry.resource.dispose() {
                Ok(()) => {
                    tracing::debug!(%tier, id = %id, kind = %entry.resource.kind(), "Evicted resource");
                    report.freed_bytes += entry.resource.size_bytes();
                    report.evicted.push(id);
                }
                Err(err) => {
                    tracing::warn!(id = %id, error = %err, "Failed to dispose resource");
                    self.shared
                        .state
                        .lock()
                        .resources
                        .entry(id.clone())
                        .or_insert(entry);
                    report.failed.push(id);
                }
            }
        }

        let freed_mb = format!("{:.2}", report.freed_mb());
        if tier == CleanupTier::Emergency {
            tracing::error!(removed = report.evicted.len(), freed_mb = %freed_mb, "Emergency cleanup complete");
        } else {
            tracing::info!(%tier, removed = report.evicted.len(), freed_mb = %freed_mb, "Cleanup complete");
        }
        Some(report)
    }

    /// Start the background sampler, replacing any running one.
    ///
    /// One sample is taken immediately on the calling thread.
    pub fn start_monitoring(&self, interval: Duration) -> Result<(), MonitorError> {
        if interval.is_zero() {
            return Err(MonitorError::ZeroInterval);
        }
        self.stop_monitoring();

        let weak = Arc::downgrade(&self.shared);
        let handle = MonitorHandle::spawn(interval, move || match weak.upgrade() {
            Some(shared) => {
                MemoryManager { shared }.sample_and_evaluate();
                true
            }
            None => false,
        })?;

        let previous = self.shared.monitor.lock().replace(handle);
        if let Some(previous) = previous {
            previous.stop();
        }
        tracing::info!(interval_ms = interval.as_millis() as u64, "Memory monitoring started");

        self.sample_and_evaluate();
        Ok(())
    }

    /// Stop the background sampler, waiting for a running tick to finish.
    pub fn stop_monitoring(&self) {
        let handle = self.shared.monitor.lock().take();
        if let Some(handle) = handle {
            handle.stop();
            tracing::info!("Memory monitoring stopped");
        }
    }

    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        self.shared.monitor.lock().is_some()
    }

    /// Interval of the running sampler, if any.
    #[must_use]
    pub fn monitoring_interval(&self) -> Option<Duration> {
        self.shared.monitor.lock().as_ref().map(MonitorHandle::interval)
    }

    /// Shut down: stop monitoring, dispose every resource (essential ones
    /// included) and clear the registry and history. Safe to call repeatedly.
    pub fn dispose(&self) {
        self.stop_monitoring();

        let mut entries: Vec<Entry> = {
            let mut state = self.shared.state.lock();
            state.history.clear();
            state.resources.drain().map(|(_, entry)| entry).collect()
        };
        entries.sort_by_key(|entry| entry.sequence);

        for entry in &mut entries {
            if let Err(err) = entry.resource.dispose() {
                tracing::warn!(id = entry.resource.id(), error = %err, "Failed to dispose resource");
            }
        }
        tracing::info!(disposed = entries.len(), "Memory manager disposed");
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
