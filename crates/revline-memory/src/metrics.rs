//! Memory samples, pressure thresholds and the rolling sample history.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use crate::resource::ResourceKind;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Convert a byte count to mebibytes.
#[must_use]
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// One observation of heap and managed-resource memory.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemorySample {
    /// Heap limit in bytes, `0` when unknown.
    pub heap_limit: u64,
    /// Heap reserved in bytes, `0` when unknown.
    pub heap_total: u64,
    /// Heap in use in bytes, `0` when unknown.
    pub heap_used: u64,
    pub texture_mb: f64,
    pub geometry_mb: f64,
    pub material_mb: f64,
    pub render_target_mb: f64,
    pub total_managed_mb: f64,
    /// Clock time the sample was taken.
    pub timestamp: Duration,
}

impl MemorySample {
    /// Heap usage as a percentage of the limit, `0.0` when the limit is unknown.
    #[must_use]
    pub fn usage_percentage(&self) -> f64 {
        if self.heap_limit == 0 {
            return 0.0;
        }
        self.heap_used as f64 / self.heap_limit as f64 * 100.0
    }
}

/// Heap usage percentages at which each pressure tier fires.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MemoryThresholds {
    pub warning_percentage: f64,
    pub critical_percentage: f64,
    pub emergency_percentage: f64,
}

impl Default for MemoryThresholds {
    fn default() -> Self {
        Self {
            warning_percentage: 70.0,
            critical_percentage: 85.0,
            emergency_percentage: 95.0,
        }
    }
}

impl MemoryThresholds {
    /// Overwrite only the fields set in `update`.
    pub fn merge(&mut self, update: ThresholdUpdate) {
        if let Some(v) = update.warning_percentage {
            self.warning_percentage = v;
        }
        if let Some(v) = update.critical_percentage {
            self.critical_percentage = v;
        }
        if let Some(v) = update.emergency_percentage {
            self.emergency_percentage = v;
        }
    }

    /// The most severe tier whose threshold `usage` reaches.
    #[must_use]
    pub fn classify(&self, usage: f64) -> PressureLevel {
        if usage >= self.emergency_percentage {
            PressureLevel::Emergency
        } else if usage >= self.critical_percentage {
            PressureLevel::Critical
        } else if usage >= self.warning_percentage {
            PressureLevel::Warning
        } else {
            PressureLevel::Normal
        }
    }
}

/// Partial threshold update; `None` fields keep their current value.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ThresholdUpdate {
    pub warning_percentage: Option<f64>,
    pub critical_percentage: Option<f64>,
    pub emergency_percentage: Option<f64>,
}

/// Pressure observed by one evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PressureLevel {
    Normal,
    Warning,
    Critical,
    Emergency,
}

/// Count and size of the registered resources of one kind.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct KindBreakdown {
    pub count: usize,
    pub memory_mb: f64,
}

/// Aggregated view over the sample history.
#[derive(Clone, Debug, PartialEq)]
pub struct MemoryStats {
    pub current: MemorySample,
    /// Sample with the highest heap usage in the history.
    pub peak: MemorySample,
    /// Per-field mean over the history.
    pub average: MemorySample,
    pub resource_breakdown: BTreeMap<ResourceKind, KindBreakdown>,
}

/// Default number of samples kept.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Bounded rolling window of samples, oldest evicted first.
#[derive(Debug)]
pub struct SampleHistory {
    samples: VecDeque<MemorySample>,
    capacity: usize,
}

impl SampleHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: MemorySample) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemorySample> {
        self.samples.iter()
    }

    /// The earliest sample with the highest `heap_used`.
    pub fn peak(&self) -> Option<&MemorySample> {
        let mut samples = self.samples.iter();
        let first = samples.next()?;
        Some(samples.fold(first, |max, s| if s.heap_used > max.heap_used { s } else { max }))
    }

    /// Per-field mean. The timestamp is set to `now`.
    pub fn average(&self, now: Duration) -> Option<MemorySample> {
        if self.samples.is_empty() {
            return None;
        }
        let n = self.samples.len() as f64;
        let mean_u64 = |f: fn(&MemorySample) -> u64| {
            (self.samples.iter().map(|s| f(s) as f64).sum::<f64>() / n).round() as u64
        };
        let mean_f64 =
            |f: fn(&MemorySample) -> f64| self.samples.iter().map(f).sum::<f64>() / n;

        Some(MemorySample {
            heap_limit: mean_u64(|s| s.heap_limit),
            heap_total: mean_u64(|s| s.heap_total),
            heap_used: mean_u64(|s| s.heap_used),
            texture_mb: mean_f64(|s| s.texture_mb),
            geometry_mb: mean_f64(|s| s.geometry_mb),
            material_mb: mean_f64(|s| s.material_mb),
            render_target_mb: mean_f64(|s| s.render_target_mb),
            total_managed_mb: mean_f64(|s| s.total_managed_mb),
            timestamp: now,
        })
    }
}

impl Default for SampleHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
