//! Wire format shared with the device.
//!
//! Host to device, one line per cycle:
//!
//! ```text
//! status|title|artist|position|duration\n
//! ```
//!
//! Device to host, one bare token per button press: `PLAYPAUSE`, `NEXT` or `PREV`.

use std::borrow::Cow;

use crate::types::{MediaState, PlaybackStatus, TransportCommand, PLACEHOLDER};

pub const DELIMITER: char = '|';

/// Stands in for a delimiter found inside a title or artist
const DELIMITER_SUBSTITUTE: char = '/';

/// Serialize one state as a newline-terminated line
pub fn encode(state: &MediaState) -> String {
    format!(
        "{}{d}{}{d}{}{d}{}{d}{}\n",
        state.status.as_str(),
        field(&state.title),
        field(&state.artist),
        state.position_seconds,
        state.duration_seconds,
        d = DELIMITER,
    )
}

/// Keep a free-text field on one line and inside its column
fn field(text: &str) -> Cow<'_, str> {
    if text.trim().is_empty() {
        return Cow::Borrowed(PLACEHOLDER);
    }
    if !text.contains([DELIMITER, '\r', '\n']) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .map(|c| match c {
                DELIMITER => DELIMITER_SUBSTITUTE,
                '\r' | '\n' => ' ',
                other => other,
            })
            .collect(),
    )
}

/// Parse one inbound line. Anything that is not an exact command token yields `None`.
pub fn decode(bytes: &[u8]) -> Option<TransportCommand> {
    let line = String::from_utf8_lossy(bytes);
    match line.trim() {
        "PLAYPAUSE" => Some(TransportCommand::PlayPause),
        "NEXT" => Some(TransportCommand::Next),
        "PREV" => Some(TransportCommand::Previous),
        _ => None,
    }
}

/// Inverse of [`encode`], as the device firmware reads it
#[cfg(test)]
pub fn decode_state(line: &str) -> Option<MediaState> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let mut fields = line.split(DELIMITER);

    let status = PlaybackStatus::from_token(fields.next()?)?;
    let title = fields.next()?.to_string();
    let artist = fields.next()?.to_string();
    let position_seconds = fields.next()?.parse().ok()?;
    let duration_seconds = fields.next()?.parse().ok()?;

    if fields.next().is_some() {
        return None;
    }

    Some(MediaState {
        status,
        title,
        artist,
        position_seconds,
        duration_seconds,
    })
}
