//! Position correction for players that only report position at their last transport event.

use std::time::SystemTime;

use crate::normalize::{clamp_to_duration, whole_seconds};
use crate::types::MediaState;

/// Estimate the current playback position in whole seconds.
///
/// When playing and the sample carries a `last_update` timestamp, the time
/// elapsed since that timestamp is added. Otherwise the sampled position is
/// used as-is, which makes this a pass-through for players reporting a live
/// position. The result never exceeds `state.duration_seconds` when that is
/// known (non-zero).
pub fn extrapolate(
    state: &MediaState,
    sampled_position: f64,
    last_update: Option<SystemTime>,
    now: SystemTime,
    is_playing: bool,
) -> u64 {
    let elapsed = match last_update {
        // A timestamp from the future (clock skew) counts as no time elapsed
        Some(updated) if is_playing => now
            .duration_since(updated)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0),
        _ => 0.0,
    };

    let sampled = if sampled_position.is_finite() {
        sampled_position.max(0.0)
    } else {
        0.0
    };

    clamp_to_duration(whole_seconds(Some(sampled + elapsed)), state.duration_seconds)
}
