//! Per-subject LOD registry: level selection, debounced transitions, and diagnostics.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use glam::Vec3;

use crate::error::LodError;
use crate::level::{DetailLevel, LodConfiguration, LodOverride};
use crate::schedule::ScheduledTask;
use crate::selector::{compute_distance, effective_distance};

/// A committed change of a subject's detail level.
#[derive(Clone, Debug, PartialEq)]
pub struct LevelChange {
    pub subject_id: String,
    /// The level now in effect.
    pub new_level: DetailLevel,
    /// The id of the level that was in effect when the change was requested.
    pub old_level_id: String,
}

/// Invoked once when a requested level change is committed.
pub type LevelChangeCallback = Box<dyn FnOnce(&LevelChange)>;

/// A level change waiting for its debounce delay to elapse.
struct PendingCommit {
    level: DetailLevel,
    old_level_id: String,
    callback: Option<LevelChangeCallback>,
}

impl fmt::Debug for PendingCommit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCommit")
            .field("level", &self.level.id)
            .field("old_level_id", &self.old_level_id)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

#[derive(Debug)]
struct SubjectState {
    config: LodConfiguration,
    current_level_id: String,
    last_raw_distance: Option<f32>,
    transition: ScheduledTask<PendingCommit>,
}

/// Snapshot of one subject's LOD state, for diagnostics overlays.
#[derive(Clone, Debug, PartialEq)]
pub struct SubjectStatistics {
    pub current_level_id: String,
    /// Last raw distance fed to the selector, if any.
    pub last_distance: Option<f32>,
    /// Level waiting for its debounce delay, if any.
    pub pending_level_id: Option<String>,
    pub level_count: usize,
}

/// Tracks every registered subject and decides which detail level it renders at.
///
/// Driven by the render loop: call [`LodManager::update_subject`] with the
/// viewer position each frame (or every Nth frame) and
/// [`LodManager::poll_transitions`] to commit debounced changes.
#[derive(Debug, Default)]
pub struct LodManager {
    subjects: BTreeMap<String, SubjectState>,
}

impl LodManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subject_id`, replacing any previous configuration and runtime state.
    ///
    /// The subject starts at the highest-quality (nearest) level of its ladder.
    pub fn register_subject(
        &mut self,
        subject_id: &str,
        base_asset_path: &str,
        overrides: LodOverride,
    ) -> Result<(), LodError> {
        let config = LodConfiguration::build(subject_id, base_asset_path, overrides)?;
        let current_level_id = config.ladder.first().id.clone();

        tracing::info!(
            subject = subject_id,
            levels = ?config
                .ladder
                .levels()
                .iter()
                .map(|l| format!("{}@{}", l.id, l.distance_threshold))
                .collect::<Vec<_>>(),
            "LOD registered"
        );

        self.subjects.insert(
            subject_id.to_string(),
            SubjectState {
                config,
                current_level_id,
                last_raw_distance: None,
                transition: ScheduledTask::new(),
            },
        );
        Ok(())
    }

    /// Pick the level for `raw_distance` after applying hysteresis.
    ///
    /// Records `raw_distance` as the subject's last distance but does not
    /// commit the level. Returns `None` for an unknown subject.
    pub fn select_level(&mut self, subject_id: &str, raw_distance: f32) -> Option<&DetailLevel> {
        let Some(state) = self.subjects.get_mut(subject_id) else {
            tracing::warn!(subject = subject_id, "LOD configuration not found");
            return None;
        };

        let effective =
            effective_distance(raw_distance, state.last_raw_distance, state.config.hysteresis);
        state.last_raw_distance = Some(raw_distance);

        Some(state.config.ladder.level_for_distance(effective))
    }

    /// Feed the viewer position for `subject_id` (positioned at the origin) and
    /// apply the transition policy.
    ///
    /// A candidate that differs from the current level is committed immediately
    /// when the subject's transition delay is zero, otherwise it is scheduled and
    /// committed by a later [`LodManager::poll_transitions`]. A different
    /// candidate supersedes a pending one and restarts the delay. Returns the
    /// candidate level, or `None` for an unknown subject.
    pub fn update_subject(
        &mut self,
        subject_id: &str,
        viewer_position: Vec3,
        now: Instant,
        on_change: Option<LevelChangeCallback>,
    ) -> Option<DetailLevel> {
        let distance = compute_distance(viewer_position, Vec3::ZERO);
        let candidate = self.select_level(subject_id, distance)?.clone();
        let state = self.subjects.get_mut(subject_id)?;

        if candidate.id == state.current_level_id {
            if let Some(cancelled) = state.transition.cancel() {
                tracing::debug!(
                    subject = subject_id,
                    cancelled = %cancelled.level.id,
                    "LOD transition cancelled, back at current level"
                );
            }
            return Some(candidate);
        }

        if state
            .transition
            .peek()
            .is_some_and(|pending| pending.level.id == candidate.id)
        {
            return Some(candidate);
        }

        tracing::debug!(
            subject = subject_id,
            from = %state.current_level_id,
            to = %candidate.id,
            distance,
            "LOD transition requested"
        );

        let commit = PendingCommit {
            level: candidate.clone(),
            old_level_id: state.current_level_id.clone(),
            callback: on_change,
        };

        if state.config.transition_delay.is_zero() {
            state.transition.cancel();
            commit_level(subject_id, state, commit);
        } else {
            let delay = state.config.transition_delay;
            state.transition.schedule(now, delay, commit);
        }

        Some(candidate)
    }

    /// Commit every pending transition whose delay has elapsed by `now`.
    ///
    /// Returns the committed changes ordered by subject id.
    pub fn poll_transitions(&mut self, now: Instant) -> Vec<LevelChange> {
        let mut changes = Vec::new();
        for (subject_id, state) in &mut self.subjects {
            if let Some(commit) = state.transition.take_if_due(now) {
                changes.push(commit_level(subject_id, state, commit));
            }
        }
        changes
    }

    /// The level currently in effect for `subject_id`, with its configuration.
    pub fn current_level(&self, subject_id: &str) -> Option<(&DetailLevel, &LodConfiguration)> {
        let state = self.subjects.get(subject_id)?;
        let level = state.config.ladder.get(&state.current_level_id)?;
        Some((level, &state.config))
    }

    /// Set the current level directly, bypassing distance logic and cancelling
    /// any pending transition.
    ///
    /// Returns `false` without changing anything if the subject or level is unknown.
    pub fn force_level(&mut self, subject_id: &str, level_id: &str) -> bool {
        let Some(state) = self.subjects.get_mut(subject_id) else {
            return false;
        };
        let Some(level) = state.config.ladder.get(level_id) else {
            return false;
        };

        tracing::info!(subject = subject_id, level = %level.name, "LOD forced");
        state.transition.cancel();
        state.current_level_id = level_id.to_string();
        true
    }

    /// Whether `subject_id` has a transition waiting for its delay.
    pub fn has_pending_transition(&self, subject_id: &str) -> bool {
        self.subjects
            .get(subject_id)
            .is_some_and(|state| state.transition.is_pending())
    }

    /// Per-subject diagnostics, keyed by subject id.
    pub fn statistics(&self) -> BTreeMap<String, SubjectStatistics> {
        self.subjects
            .iter()
            .map(|(subject_id, state)| {
                (
                    subject_id.clone(),
                    SubjectStatistics {
                        current_level_id: state.current_level_id.clone(),
                        last_distance: state.last_raw_distance,
                        pending_level_id: state.transition.peek().map(|p| p.level.id.clone()),
                        level_count: state.config.ladder.len(),
                    },
                )
            })
            .collect()
    }

    /// Number of registered subjects.
    pub fn subject_count(&self) -> usize {
        self.subjects.len()
    }

    /// Remove `subject_id` and cancel its pending transition. No-op if unknown.
    pub fn cleanup_subject(&mut self, subject_id: &str) {
        if let Some(mut state) = self.subjects.remove(subject_id) {
            state.transition.cancel();
            tracing::debug!(subject = subject_id, "LOD state removed");
        }
    }

    /// Remove every subject and cancel all pending transitions.
    pub fn cleanup_all(&mut self) {
        for state in self.subjects.values_mut() {
            state.transition.cancel();
        }
        self.subjects.clear();
    }
}

fn commit_level(subject_id: &str, state: &mut SubjectState, commit: PendingCommit) -> LevelChange {
    let PendingCommit {
        level,
        old_level_id,
        callback,
    } = commit;

    tracing::info!(
        subject = subject_id,
        from = %old_level_id,
        to = %level.name,
        "LOD transition committed"
    );

    state.current_level_id = level.id.clone();
    let change = LevelChange {
        subject_id: subject_id.to_string(),
        new_level: level,
        old_level_id,
    };
    if let Some(callback) = callback {
        callback(&change);
    }
    change
}
