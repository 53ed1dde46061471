//! Eviction tiers and candidate ordering.
//!
//! [`eviction_order`] decides which resources a pass should try, in order;
//! [`CleanupTier::target`] decides how many of them it should remove.

use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

use crate::metrics::bytes_to_mb;

/// Severity of a cleanup pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CleanupTier {
    /// Least recently used first, at most 3 resources (20 % of candidates).
    Gentle,
    /// Lowest recency/frequency score first, at most 10 resources (50 % of candidates).
    Aggressive,
    /// Every non-essential resource.
    Emergency,
}

impl CleanupTier {
    /// How many of `candidates` non-essential resources a pass should remove.
    #[must_use]
    pub fn target(self, candidates: usize) -> usize {
        match self {
            CleanupTier::Gentle => candidates.div_ceil(5).min(3),
            CleanupTier::Aggressive => candidates.div_ceil(2).min(10),
            CleanupTier::Emergency => candidates,
        }
    }
}

impl fmt::Display for CleanupTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CleanupTier::Gentle => "gentle",
            CleanupTier::Aggressive => "aggressive",
            CleanupTier::Emergency => "emergency",
        })
    }
}

/// What a resource looks like to the eviction planner.
#[derive(Clone, Debug)]
pub struct EvictionCandidate {
    pub id: String,
    pub last_accessed_at: Duration,
    pub access_count: u64,
    pub is_essential: bool,
    /// Registration order, used to break ties.
    pub sequence: u64,
}

impl EvictionCandidate {
    /// `0.7 * last_accessed_ms + 0.3 * access_count`; lower is evicted first.
    #[must_use]
    pub fn access_score(&self) -> f64 {
        let last_accessed_ms = self.last_accessed_at.as_secs_f64() * 1000.0;
        last_accessed_ms * 0.7 + self.access_count as f64 * 0.3
    }
}

/// Order non-essential candidates for `tier`, first to be evicted first.
///
/// Essential resources are never returned.
pub fn eviction_order(mut candidates: Vec<EvictionCandidate>, tier: CleanupTier) -> Vec<String> {
    candidates.retain(|c| !c.is_essential);
    match tier {
        CleanupTier::Gentle => candidates.sort_by(|a, b| {
            a.last_accessed_at
                .cmp(&b.last_accessed_at)
                .then(a.sequence.cmp(&b.sequence))
        }),
        CleanupTier::Aggressive => candidates.sort_by(|a, b| {
            a.access_score()
                .partial_cmp(&b.access_score())
                .unwrap_or(Ordering::Equal)
                .then(a.sequence.cmp(&b.sequence))
        }),
        CleanupTier::Emergency => candidates.sort_by_key(|c| c.sequence),
    }
    candidates.into_iter().map(|c| c.id).collect()
}

/// Outcome of one cleanup pass.
#[derive(Clone, Debug, PartialEq)]
pub struct CleanupReport {
    pub tier: CleanupTier,
    /// Ids disposed and removed, in eviction order.
    pub evicted: Vec<String>,
    /// Ids whose dispose failed; they remain registered.
    pub failed: Vec<String>,
    pub freed_bytes: u64,
}

impl CleanupReport {
    pub(crate) fn new(tier: CleanupTier) -> Self {
        Self {
            tier,
            evicted: Vec::new(),
            failed: Vec::new(),
            freed_bytes: 0,
        }
    }

    #[must_use]
    pub fn freed_mb(&self) -> f64 {
        bytes_to_mb(self.freed_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, last_ms: u64, count: u64, essential: bool, seq: u64) -> EvictionCandidate {
        EvictionCandidate {
            id: id.to_string(),
            last_accessed_at: Duration::from_millis(last_ms),
            access_count: count,
            is_essential: essential,
            sequence: seq,
        }
    }

    #[test]
    fn test_gentle_target() {
        assert_eq!(CleanupTier::Gentle.target(0), 0);
        assert_eq!(CleanupTier::Gentle.target(1), 1);
        assert_eq!(CleanupTier::Gentle.target(5), 1);
        assert_eq!(CleanupTier::Gentle.target(6), 2);
        assert_eq!(CleanupTier::Gentle.target(15), 3);
        assert_eq!(CleanupTier::Gentle.target(100), 3);
    }

    #[test]
    fn test_aggressive_target() {
        assert_eq!(CleanupTier::Aggressive.target(1), 1);
        assert_eq!(CleanupTier::Aggressive.target(3), 2);
        assert_eq!(CleanupTier::Aggressive.target(20), 10);
        assert_eq!(CleanupTier::Aggressive.target(50), 10);
    }

    #[test]
    fn test_emergency_target_is_everything() {
        assert_eq!(CleanupTier::Emergency.target(37), 37);
    }

    #[test]
    fn test_gentle_orders_by_recency() {
        let order = eviction_order(
            vec![
                candidate("new", 300, 0, false, 0),
                candidate("old", 100, 50, false, 1),
                candidate("mid", 200, 0, false, 2),
            ],
            CleanupTier::Gentle,
        );
        assert_eq!(order, ["old", "mid", "new"]);
    }

    #[test]
    fn test_ties_break_by_registration_order() {
        let order = eviction_order(
            vec![
                candidate("b", 100, 0, false, 1),
                candidate("a", 100, 0, false, 0),
            ],
            CleanupTier::Gentle,
        );
        assert_eq!(order, ["a", "b"]);
    }

    #[test]
    fn test_aggressive_weights_frequency() {
        // Same recency: the less used resource goes first.
        let order = eviction_order(
            vec![
                candidate("busy", 1000, 40, false, 0),
                candidate("idle", 1000, 1, false, 1),
                candidate("stale", 10, 1000, false, 2),
            ],
            CleanupTier::Aggressive,
        );
        assert_eq!(order, ["stale", "idle", "busy"]);
    }

    #[test]
    fn test_essential_never_planned() {
        for tier in [CleanupTier::Gentle, CleanupTier::Aggressive, CleanupTier::Emergency] {
            let order = eviction_order(
                vec![
                    candidate("engine", 0, 0, true, 0),
                    candidate("decal", 500, 3, false, 1),
                ],
                tier,
            );
            assert_eq!(order, ["decal"], "tier {tier}");
        }
    }

    #[test]
    fn test_access_score() {
        let c = candidate("x", 1000, 10, false, 0);
        assert!((c.access_score() - 703.0).abs() < 1e-9);
    }
}
