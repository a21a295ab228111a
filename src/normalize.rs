//! Turns whatever the platform reported into a [`MediaState`] the device can always display.

use crate::error::BackendError;
use crate::types::{MediaState, PlaybackStatus, RawSnapshot, PLACEHOLDER};

/// Normalize the outcome of one player query.
///
/// `Ok(None)` means the query worked but no player session is active.
/// Never fails: a query error becomes a state with [`PlaybackStatus::Error`].
pub fn normalize(query: &Result<Option<RawSnapshot>, BackendError>) -> MediaState {
    match query {
        Err(_) => MediaState::error(),
        Ok(None) => MediaState::stopped(),
        Ok(Some(raw)) => normalize_snapshot(raw),
    }
}

fn normalize_snapshot(raw: &RawSnapshot) -> MediaState {
    let duration_seconds = whole_seconds(raw.duration);
    let position_seconds = clamp_to_duration(whole_seconds(raw.position), duration_seconds);

    MediaState {
        status: raw.status.unwrap_or(PlaybackStatus::Paused),
        title: text_or_placeholder(raw.title.as_deref()),
        artist: text_or_placeholder(raw.artist.as_deref()),
        position_seconds,
        duration_seconds,
    }
}

/// Floor to whole seconds. Missing, negative and non-finite values become 0.
pub fn whole_seconds(value: Option<f64>) -> u64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v.floor() as u64,
        _ => 0,
    }
}

/// A duration of 0 means the length is unknown, so nothing is clamped.
pub fn clamp_to_duration(position: u64, duration: u64) -> u64 {
    if duration > 0 {
        position.min(duration)
    } else {
        position
    }
}

fn text_or_placeholder(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => PLACEHOLDER.to_string(),
    }
}
