//! Heap usage probing.

/// Process heap figures, in bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapUsage {
    /// Maximum heap the process may grow to.
    pub limit: u64,
    /// Heap currently reserved.
    pub total: u64,
    /// Heap currently in use.
    pub used: u64,
}

impl HeapUsage {
    /// `used / limit` as a percentage, or `0.0` when the limit is unknown.
    #[must_use]
    pub fn usage_percentage(&self) -> f64 {
        if self.limit == 0 {
            return 0.0;
        }
        self.used as f64 / self.limit as f64 * 100.0
    }
}

/// Source of heap figures for the memory monitor.
///
/// Returning `None` means the platform offers no data; samples then carry
/// zeroed heap fields and pressure evaluation never triggers a cleanup.
pub trait HeapProbe: Send + Sync {
    fn heap(&self) -> Option<HeapUsage>;
}

/// Probe for platforms without heap introspection.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHeapProbe;

impl HeapProbe for NoHeapProbe {
    fn heap(&self) -> Option<HeapUsage> {
        None
    }
}

impl<F> HeapProbe for F
where
    F: Fn() -> Option<HeapUsage> + Send + Sync,
{
    fn heap(&self) -> Option<HeapUsage> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_percentage() {
        let usage = HeapUsage {
            limit: 1000,
            total: 900,
            used: 850,
        };
        assert!((usage.usage_percentage() - 85.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_limit_reads_as_zero_usage() {
        let usage = HeapUsage {
            limit: 0,
            total: 10,
            used: 10,
        };
        assert_eq!(usage.usage_percentage(), 0.0);
        assert_eq!(NoHeapProbe.heap(), None);
    }

    #[test]
    fn test_closure_probe() {
        let probe = || {
            Some(HeapUsage {
                limit: 100,
                total: 50,
                used: 25,
            })
        };
        assert_eq!(probe.heap().map(|h| h.used), Some(25));
    }
}
