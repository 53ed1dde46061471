//! Level-of-detail selection for tracked subjects: distance ladders, hysteresis, and debounced transitions.

mod error;
mod level;
mod manager;
mod schedule;
mod selector;

pub use error::LodError;
pub use level::{
    DEFAULT_HYSTERESIS, DEFAULT_TRANSITION_DELAY, DetailLevel, Ladder, LodConfiguration,
    LodOverride, ShadowQuality,
};
pub use manager::{LevelChange, LevelChangeCallback, LodManager, SubjectStatistics};
pub use schedule::ScheduledTask;
pub use selector::{compute_distance, effective_distance};
