//! Distance measurement and hysteresis for LOD selection.

use glam::Vec3;

/// Euclidean distance from the viewer to the subject.
pub fn compute_distance(viewer: Vec3, subject: Vec3) -> f32 {
    viewer.distance(subject)
}

/// Adjust a raw distance by `hysteresis` in the direction of travel.
///
/// Moving closer subtracts the buffer (clamped at zero), moving away adds it,
/// and a stationary viewer keeps the raw distance. `previous` is the last raw
/// distance seen for the subject; `None` counts as stationary.
pub fn effective_distance(raw: f32, previous: Option<f32>, hysteresis: f32) -> f32 {
    let previous = previous.unwrap_or(raw);
    if raw < previous {
        (raw - hysteresis).max(0.0)
    } else if raw > previous {
        raw + hysteresis
    } else {
        raw
    }
}
